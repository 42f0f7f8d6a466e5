//! Grayscale PNG renderings of doubt map stages, for eyeballing results.

use crate::{DoubtStages, Result};
use image::{GrayImage, Luma};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;
use treefind_raster::Grid;

/// `<out_path><suffix>`, e.g. `tile.doubt.tif.png`.
pub fn with_suffix(out_path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(out_path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn to_image<T: Copy>(grid: &Grid<T>, level: impl Fn(T) -> u8) -> GrayImage {
    GrayImage::from_fn(grid.width() as u32, grid.height() as u32, |x, y| {
        Luma([level(grid.get(y as usize, x as usize))])
    })
}

/// Write `.png`, `.binarized.png` and `.binarized_morph.png` next to `out_path`.
pub fn save_previews(out_path: &Path, stages: &DoubtStages) -> Result<Vec<PathBuf>> {
    let score_path = with_suffix(out_path, ".png");
    let binarized_path = with_suffix(out_path, ".binarized.png");
    let cleaned_path = with_suffix(out_path, ".binarized_morph.png");

    to_image(&stages.score, |v| (v * 255.0) as u8).save(&score_path)?;
    to_image(&stages.binarized, |v| v.saturating_mul(255)).save(&binarized_path)?;
    to_image(&stages.cleaned, |v| v.saturating_mul(255)).save(&cleaned_path)?;

    debug!(path = %score_path.display(), "Saved doubt map previews");
    Ok(vec![score_path, binarized_path, cleaned_path])
}

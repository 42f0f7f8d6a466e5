//! The doubt map pipeline: roughness, smoothing, threshold, opening.

use crate::filter::{binarize, box_blur, clip_unit, roughness_score};
use crate::morphology::opening;
use crate::{preview, Result, RoughnessError};
use std::path::Path;
use tracing::debug;
use treefind_raster::{write_f32, write_u8, Grid, RasterTile};

/// Parameters of the doubt map filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoughnessParams {
    /// Half-size `k` of the extrema and smoothing windows (`2k+1` square).
    pub window_half_size: usize,
    /// Smoothed scores at or above this value are flagged.
    pub threshold: f32,
    /// Half-size of the square structuring element.
    pub morph_half_size: usize,
    /// Erosion passes, followed by the same number of dilation passes.
    pub morph_iterations: usize,
    /// Emit the cleaned `{0,1}` mask instead of the continuous score.
    pub binarize: bool,
}

impl Default for RoughnessParams {
    fn default() -> Self {
        Self {
            window_half_size: 1,
            threshold: 1.0,
            morph_half_size: 1,
            morph_iterations: 2,
            binarize: true,
        }
    }
}

/// Every intermediate product of one doubt map computation.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubtStages {
    /// Smoothed roughness clipped to `[0, 1]`.
    pub score: Grid<f32>,
    /// `score >= threshold`.
    pub binarized: Grid<u8>,
    /// `binarized` after morphological opening.
    pub cleaned: Grid<u8>,
}

/// Cell values of a doubt raster.
#[derive(Debug, Clone, PartialEq)]
pub enum DoubtValues {
    /// Cleaned binary mask.
    Mask(Grid<u8>),
    /// Continuous roughness score in `[0, 1]`.
    Score(Grid<f32>),
}

/// Computes doubt maps from elevation grids.
#[derive(Debug, Clone, Default)]
pub struct RoughnessEngine {
    params: RoughnessParams,
}

impl RoughnessEngine {
    /// Create an engine with the given parameters.
    pub fn new(params: RoughnessParams) -> Self {
        Self { params }
    }

    /// Filter parameters.
    pub fn params(&self) -> &RoughnessParams {
        &self.params
    }

    /// Run every stage over `elevation`.
    pub fn compute(&self, elevation: &Grid<f32>, nodata: Option<f64>) -> Result<DoubtStages> {
        if elevation.is_empty() {
            return Err(RoughnessError::EmptyGrid);
        }
        let p = &self.params;

        let raw = roughness_score(elevation, p.window_half_size, nodata);
        let score = clip_unit(&box_blur(&raw, p.window_half_size));
        let binarized = binarize(&score, p.threshold);
        let cleaned = opening(&binarized, p.morph_half_size, p.morph_iterations);

        debug!(
            flagged = count_set(&binarized),
            kept = count_set(&cleaned),
            "Computed doubt map"
        );

        Ok(DoubtStages {
            score,
            binarized,
            cleaned,
        })
    }

    /// Compute the doubt values selected by `params.binarize`.
    pub fn doubt_values(&self, elevation: &Grid<f32>, nodata: Option<f64>) -> Result<DoubtValues> {
        let stages = self.compute(elevation, nodata)?;
        Ok(self.select(stages))
    }

    fn select(&self, stages: DoubtStages) -> DoubtValues {
        if self.params.binarize {
            DoubtValues::Mask(stages.cleaned)
        } else {
            DoubtValues::Score(stages.score)
        }
    }

    /// Read a GeoTIFF tile, compute its doubt map and write it to `out_path`.
    ///
    /// The output keeps the source georeferencing, is single band and deflate
    /// compressed. With `previews`, PNG renderings of the score, the raw mask
    /// and the cleaned mask are written next to it.
    pub fn generate<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        in_path: P,
        out_path: Q,
        previews: bool,
    ) -> Result<DoubtValues> {
        let out_path = out_path.as_ref();
        let tile = RasterTile::from_file(in_path)?;
        let (width, height) = tile.dimensions();
        debug!(width, height, epsg = ?tile.georeference().epsg(), "Loaded source tile");
        let stages = self.compute(tile.samples(), tile.nodata())?;

        if previews {
            preview::save_previews(out_path, &stages)?;
        }

        let values = self.select(stages);
        match &values {
            DoubtValues::Mask(mask) => write_u8(out_path, mask, tile.georeference())?,
            // A u8 mask cannot hold the source no-data marker; the score keeps it.
            DoubtValues::Score(score) => {
                write_f32(out_path, score, tile.georeference(), tile.nodata())?
            }
        }
        Ok(values)
    }
}

fn count_set(mask: &Grid<u8>) -> usize {
    mask.data().iter().filter(|&&v| v != 0).count()
}

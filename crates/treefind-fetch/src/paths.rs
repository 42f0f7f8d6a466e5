//! Deterministic on-disk names for tiles and their derivatives.
//!
//! A tile's files are named after `(tile size, scale factor, xmin, ymin)`, so
//! a later run over an overlapping box finds them again.

use crate::TileDescriptor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to a tile that failed geometry validation.
pub const MALFORMED_SUFFIX: &str = "_MALFORMED";

/// Scratch file the raw service response is written to.
pub const RESPONSE_BUFFER: &str = "buffer.txt";

/// Path scheme rooted at one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePaths {
    out_dir: PathBuf,
}

impl TilePaths {
    /// Paths under `out_dir`.
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    /// Output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn stem(tile: &TileDescriptor) -> String {
        // `{:?}` keeps the fractional part of whole factors: 1.0 -> "1.0".
        format!(
            "tile_{}_{}_{}_{:?}",
            tile.xmin, tile.ymin, tile.size, tile.scale_factor
        )
    }

    /// `<out>/tile_<xmin>_<ymin>_<size>_<scale>.tif`
    pub fn tile_path(&self, tile: &TileDescriptor) -> PathBuf {
        self.out_dir.join(format!("{}.tif", Self::stem(tile)))
    }

    /// `<out>/tile_<xmin>_<ymin>_<size>_<scale>.doubt.tif`
    pub fn doubt_path(&self, tile: &TileDescriptor) -> PathBuf {
        self.out_dir.join(format!("{}.doubt.tif", Self::stem(tile)))
    }

    /// Scratch file for the raw response body.
    pub fn buffer_path(&self) -> PathBuf {
        self.out_dir.join(RESPONSE_BUFFER)
    }

    /// `<path>_MALFORMED`
    pub fn malformed_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(MALFORMED_SUFFIX);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(scale_factor: f64) -> TileDescriptor {
        TileDescriptor {
            xmin: 566_000,
            xmax: 567_000,
            ymin: 244_000,
            ymax: 245_000,
            size: 1000,
            scale_factor,
        }
    }

    #[test]
    fn test_tile_path() {
        let paths = TilePaths::new("tiles/nmpt");
        assert_eq!(
            paths.tile_path(&tile(1.0)),
            PathBuf::from("tiles/nmpt/tile_566000_244000_1000_1.0.tif")
        );
        assert_eq!(
            paths.tile_path(&tile(0.25)),
            PathBuf::from("tiles/nmpt/tile_566000_244000_1000_0.25.tif")
        );
    }

    #[test]
    fn test_doubt_path() {
        let paths = TilePaths::new("tiles/nmpt");
        assert_eq!(
            paths.doubt_path(&tile(1.0)),
            PathBuf::from("tiles/nmpt/tile_566000_244000_1000_1.0.doubt.tif")
        );
    }

    #[test]
    fn test_malformed_path() {
        assert_eq!(
            TilePaths::malformed_path(Path::new("out/tile_1_2_1000_1.0.tif")),
            PathBuf::from("out/tile_1_2_1000_1.0.tif_MALFORMED")
        );
    }
}

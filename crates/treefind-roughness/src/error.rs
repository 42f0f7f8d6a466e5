//! Error types for doubt map generation.

use thiserror::Error;
use treefind_raster::RasterError;

/// Errors that can occur while computing or saving a doubt map.
#[derive(Debug, Error)]
pub enum RoughnessError {
    /// Reading the source tile or writing the output failed.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Writing a PNG preview failed.
    #[error("PNG preview error: {0}")]
    Preview(#[from] image::ImageError),

    /// The input grid has no cells.
    #[error("Cannot compute roughness of an empty grid")]
    EmptyGrid,
}

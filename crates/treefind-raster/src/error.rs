//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when reading or writing raster tiles.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// The file carries no usable georeferencing tags.
    #[error("Missing georeferencing in {path}: {reason}")]
    MissingGeoreference {
        /// File that was being read.
        path: String,
        /// Which tag was absent or malformed.
        reason: String,
    },

    /// Sample buffer length does not match the declared dimensions.
    #[error("Grid of {width}x{height} needs {expected} samples, got {actual}")]
    ShapeMismatch {
        /// Grid width in cells.
        width: usize,
        /// Grid height in cells.
        height: usize,
        /// Number of samples required.
        expected: usize,
        /// Number of samples supplied.
        actual: usize,
    },

    /// Raster dimensions do not fit the TIFF size fields.
    #[error("Raster of {width}x{height} is too large to encode")]
    TooLarge {
        /// Grid width in cells.
        width: usize,
        /// Grid height in cells.
        height: usize,
    },
}

//! Error types for tile planning and fetching.

use std::path::PathBuf;
use thiserror::Error;
use treefind_roughness::RoughnessError;

/// A single failed attempt to fetch a URL. Retryable.
#[derive(Debug, Clone, Error)]
#[error("Failed to fetch {url}: {reason}")]
pub struct TransportError {
    /// Requested URL.
    pub url: String,
    /// Network or HTTP failure description.
    pub reason: String,
}

/// Which corner of a converted tile failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CornerKind {
    /// North-west corner, expected at `(xmin, ymax)`.
    UpperLeft,
    /// South-east corner, expected at `(xmax, ymin)`.
    LowerRight,
}

impl std::fmt::Display for CornerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CornerKind::UpperLeft => f.write_str("Upper Left"),
            CornerKind::LowerRight => f.write_str("Lower Right"),
        }
    }
}

/// Errors that can occur while planning or fetching tiles.
///
/// Apart from [`FetchError::Transport`], which is retried internally, every
/// variant aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// I/O error on the output directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bounding box cannot be tiled.
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    /// Tile size must be a positive number of meters.
    #[error("Invalid tile size {0} (must be positive)")]
    InvalidTileSize(i64),

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The coverage request URL could not be built.
    #[error("Invalid coverage URL {url}: {reason}")]
    InvalidUrl {
        /// Base URL that failed to parse.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A single fetch attempt failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every slot of the retry schedule was used up.
    #[error("Giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Requested URL.
        url: String,
        /// Number of attempts made.
        attempts: usize,
        /// Failure of the final attempt.
        #[source]
        last_error: TransportError,
    },

    /// The multipart body has a different number of parts than expected.
    #[error(
        "Expected {} parts {expected:?}, got {} parts {actual:?}",
        .expected.len(),
        .actual.len()
    )]
    PartCountMismatch {
        /// Expected filenames, in order.
        expected: Vec<String>,
        /// Filenames found, in order.
        actual: Vec<String>,
    },

    /// A multipart part is not the one expected at its position.
    #[error("Part {position} is named {actual:?}, expected {expected:?}")]
    PartNameMismatch {
        /// Zero-based part position.
        position: usize,
        /// Expected filename.
        expected: String,
        /// Filename found.
        actual: String,
    },

    /// The service answered in a format this crate cannot turn into a tile.
    #[error("Unsupported response format: {0}")]
    UnsupportedFormat(String),

    /// A converted tile does not sit where it was requested.
    #[error(
        "{corner} corner of tile x({xmin},{xmax}) y({ymin},{ymax}) is ({}, {}), \
         expected ({}, {}); kept as {}",
        .reported.0,
        .reported.1,
        .expected.0,
        .expected.1,
        .malformed_path.display()
    )]
    GeometryMismatch {
        /// Corner that did not match.
        corner: CornerKind,
        /// Expected corner coordinates.
        expected: (i64, i64),
        /// Reported corner coordinates.
        reported: (f64, f64),
        /// Requested tile bounds.
        xmin: i64,
        /// Requested tile bounds.
        xmax: i64,
        /// Requested tile bounds.
        ymin: i64,
        /// Requested tile bounds.
        ymax: i64,
        /// Where the rejected file was moved.
        malformed_path: PathBuf,
    },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed ({status}): {output}")]
    ToolFailed {
        /// Tool name.
        tool: String,
        /// Exit status description.
        status: String,
        /// Captured output.
        output: String,
    },

    /// The geometry report of a raster could not be parsed.
    #[error("Cannot read corners of {}: {reason}", .path.display())]
    CornerParse {
        /// Raster that was inspected.
        path: PathBuf,
        /// What was missing.
        reason: String,
    },

    /// Doubt map generation failed.
    #[error("Doubt map error: {0}")]
    Roughness(#[from] RoughnessError),
}

//! Error type for the runner.

use thiserror::Error;
use treefind_fetch::FetchError;
use treefind_roughness::RoughnessError;

/// Errors that end a `treefind` invocation.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Invalid command line or environment configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Planning or fetching tiles failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A doubt map could not be computed.
    #[error(transparent)]
    Roughness(#[from] RoughnessError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A database tool exited unsuccessfully.
    #[error("{tool} failed ({status}): {output}")]
    ToolFailed {
        /// Tool name.
        tool: String,
        /// Exit status description.
        status: String,
        /// Captured error output.
        output: String,
    },

    /// The log subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

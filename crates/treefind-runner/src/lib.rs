//! # treefind-runner
//!
//! The `treefind` command: turns a latitude/longitude box into validated
//! elevation tiles and, for the surface model, doubt maps, then hands both
//! to a bulk loader.
//!
//! ```text
//! treefind fetch --lat-min 50.04 --lat-max 50.06 --lon-min 19.82 --lon-max 19.87
//! treefind doubt tile.tif tile.doubt.tif --png
//! treefind extract tiles/nmpt/buffer.txt parts/
//! ```

pub mod cli;
pub mod config;
pub mod crs;
mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;

pub use config::{GeoBbox, LoaderKind, PgConnection, RunConfig};
pub use crs::{CrsTransform, Puwg1992};
pub use error::RunnerError;
pub use loader::{BulkLoader, ManifestLoader, PostgisLoader};
pub use pipeline::{run_pipeline, RunReport};

/// Result type for the runner.
pub type Result<T> = std::result::Result<T, RunnerError>;

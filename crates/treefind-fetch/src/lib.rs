//! # treefind-fetch
//!
//! Tile grid planning and resumable download of elevation tiles from a WCS
//! coverage service.
//!
//! A projected bounding box is snapped to a grid of square tiles. Each tile
//! is requested, decoded when the service answers with a multi-part body,
//! converted to a compressed GeoTIFF and checked to sit exactly where it was
//! requested. Tiles already on disk are never downloaded again.
//!
//! ## Example
//!
//! ```no_run
//! use treefind_fetch::{
//!     ElevationModel, FetchConfig, FetchOrchestrator, GdalTools, HttpTransport, ProjectedBbox,
//! };
//!
//! let config = FetchConfig::for_model(ElevationModel::Nmpt);
//! let orchestrator = FetchOrchestrator::new(config, HttpTransport::new()?, GdalTools::default());
//! let report = orchestrator.run(&ProjectedBbox {
//!     ulx: 566_120.0,
//!     uly: 245_870.0,
//!     lrx: 569_210.0,
//!     lry: 243_290.0,
//! })?;
//! println!("{} tiles", report.tiles.len());
//! # Ok::<(), treefind_fetch::FetchError>(())
//! ```

mod doubt;
mod error;
mod grid;
pub mod metrics;
pub mod multipart;
mod orchestrator;
mod paths;
pub mod retry;
mod service;
pub mod tools;
mod transport;

pub use doubt::{is_fresh, modified_time, DoubtGenerator, DoubtMapStage, DoubtOutcome, DoubtTile};
pub use error::{CornerKind, FetchError, TransportError};
pub use grid::{GridPlanner, ProjectedBbox, SnappedGrid, TileDescriptor, TileKey};
pub use multipart::{MultipartDecoder, Part};
pub use orchestrator::{
    FetchConfig, FetchOrchestrator, FetchReport, FetchState, FetchStats, ProducedTile,
    StateCallback, TileOutcome, DEFAULT_SCALE_FACTOR, DEFAULT_TILE_SIZE,
};
pub use paths::{TilePaths, MALFORMED_SUFFIX};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use service::{CoverageService, ElevationModel, ResponseFormat};
pub use tools::{GdalTools, RasterTools};
pub use transport::{HttpTransport, Transport};

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

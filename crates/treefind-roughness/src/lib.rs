//! # treefind-roughness
//!
//! Doubt maps for digital surface model tiles.
//!
//! A doubt map flags cells whose surroundings are locally irregular: tree
//! crowns, building edges and other above-ground objects that make a surface
//! model disagree with the terrain underneath. The pipeline is fixed:
//!
//! 1. windowed max/min (`3x3` by default, nearest-edge borders)
//! 2. roughness = larger of `max - v` and `v - min`
//! 3. box blur of the same window, clipped to `[0, 1]`
//! 4. threshold at `1.0`, inclusive
//! 5. binary opening: erode twice, dilate twice, `3x3` square element
//!
//! ```no_run
//! use treefind_roughness::{RoughnessEngine, RoughnessParams};
//!
//! let engine = RoughnessEngine::new(RoughnessParams::default());
//! engine.generate("tile.tif", "tile.doubt.tif", false)?;
//! # Ok::<(), treefind_roughness::RoughnessError>(())
//! ```

mod engine;
mod error;
pub mod filter;
pub mod morphology;
pub mod preview;

pub use engine::{DoubtStages, DoubtValues, RoughnessEngine, RoughnessParams};
pub use error::RoughnessError;

/// Result type for doubt map operations.
pub type Result<T> = std::result::Result<T, RoughnessError>;

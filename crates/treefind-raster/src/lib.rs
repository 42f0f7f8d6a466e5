//! # treefind-raster
//!
//! Georeferenced single-band rasters for projected elevation tiles.
//!
//! Tiles are read from and written to GeoTIFF using the `tiff` crate. The
//! georeferencing is taken from the ModelTiepoint/ModelPixelScale tags and the
//! GeoKey directory is carried along verbatim, so a raster derived from a tile
//! (for example a doubt map) lands on exactly the same footprint and CRS.
//!
//! ```no_run
//! use treefind_raster::RasterTile;
//!
//! let tile = RasterTile::from_file("tiles/nmpt/tile_566000_244000_1000_1.0.tif")?;
//! let corners = tile.corners();
//! println!("upper left {:?}, lower right {:?}", corners.upper_left, corners.lower_right);
//! # Ok::<(), treefind_raster::RasterError>(())
//! ```

mod error;
mod grid;
mod tile;

pub use error::RasterError;
pub use grid::Grid;
pub use tile::{is_nodata, write_f32, write_u8, Corners, GeoReference, RasterTile};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;

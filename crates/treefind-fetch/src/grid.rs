//! Regular tile grid over a projected bounding box.
//!
//! ## Grid convention
//!
//! Coordinates are projected meters with `y` growing northward, so the
//! upper-left corner of a box has the smallest `x` and the largest `y`.
//! The box is snapped outward to multiples of the tile size and split into
//! square tiles:
//! - `ix` is the column, 0 at the western edge, increasing eastward
//! - `iy` is the row, 0 at the northern edge, increasing southward
//!
//! Tiles are enumerated column by column (outer `ix`, inner `iy`). Progress
//! numbering in logs follows this order, so it must not change.

use crate::{FetchError, Result};
use tracing::debug;

/// Bounding box in projected meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedBbox {
    /// West edge.
    pub ulx: f64,
    /// North edge.
    pub uly: f64,
    /// East edge.
    pub lrx: f64,
    /// South edge.
    pub lry: f64,
}

/// One square tile of the grid. Immutable once planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileDescriptor {
    /// West edge (meters).
    pub xmin: i64,
    /// East edge (meters).
    pub xmax: i64,
    /// South edge (meters).
    pub ymin: i64,
    /// North edge (meters).
    pub ymax: i64,
    /// Grid step (meters).
    pub size: i64,
    /// Resampling factor requested from the service.
    pub scale_factor: f64,
}

/// Identity of a tile: `(xmin, ymin, size, scale_factor)`.
///
/// The scale factor is kept as its bit pattern so the key is `Eq + Hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// West edge (meters).
    pub xmin: i64,
    /// South edge (meters).
    pub ymin: i64,
    /// Grid step (meters).
    pub size: i64,
    scale_bits: u64,
}

impl TileDescriptor {
    /// Identity of this tile, also the naming key of its files.
    pub fn key(&self) -> TileKey {
        TileKey {
            xmin: self.xmin,
            ymin: self.ymin,
            size: self.size,
            scale_bits: self.scale_factor.to_bits(),
        }
    }

    /// `x(xmin,xmax) y(ymin,ymax)`, as used in requests and messages.
    pub fn bounds_label(&self) -> String {
        format!(
            "x({},{}) y({},{})",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// A bounding box snapped outward to the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnappedGrid {
    /// West edge.
    pub ulx: i64,
    /// North edge.
    pub uly: i64,
    /// East edge.
    pub lrx: i64,
    /// South edge.
    pub lry: i64,
    /// Number of tile columns.
    pub x_tiles: usize,
    /// Number of tile rows.
    pub y_tiles: usize,
}

impl SnappedGrid {
    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.x_tiles * self.y_tiles
    }
}

/// Splits bounding boxes into tiles of a fixed size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPlanner {
    tile_size: i64,
    scale_factor: f64,
}

impl GridPlanner {
    /// Create a planner for `tile_size`-meter tiles requested at `scale_factor`.
    pub fn new(tile_size: i64, scale_factor: f64) -> Result<Self> {
        if tile_size <= 0 {
            return Err(FetchError::InvalidTileSize(tile_size));
        }
        Ok(Self {
            tile_size,
            scale_factor,
        })
    }

    /// Grid step in meters.
    pub fn tile_size(&self) -> i64 {
        self.tile_size
    }

    /// Request scale factor stamped on every tile.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Snap `bbox` outward to the grid.
    ///
    /// Fails if any coordinate is not finite, the box is inverted, or a
    /// snapped coordinate is negative (the target CRS is non-negative over
    /// the supported territory).
    pub fn snap(&self, bbox: &ProjectedBbox) -> Result<SnappedGrid> {
        let ProjectedBbox { ulx, uly, lrx, lry } = *bbox;
        if ![ulx, uly, lrx, lry].iter().all(|v| v.is_finite()) {
            return Err(FetchError::InvalidBbox(format!(
                "non-finite coordinate in {bbox:?}"
            )));
        }
        if lrx < ulx || lry > uly {
            return Err(FetchError::InvalidBbox(format!(
                "lower-right ({lrx}, {lry}) is not south-east of upper-left ({ulx}, {uly})"
            )));
        }

        let size = self.tile_size as f64;
        let snap_down = |v: f64| ((v / size).floor() * size) as i64;
        let snap_up = |v: f64| ((v / size).ceil() * size) as i64;

        let ulx_s = snap_down(ulx);
        let uly_s = snap_up(uly);
        let lrx_s = snap_up(lrx);
        let lry_s = snap_down(lry);

        if ulx_s < 0 || uly_s < 0 || lrx_s < 0 || lry_s < 0 {
            return Err(FetchError::InvalidBbox(format!(
                "negative snapped coordinates ULX={ulx_s} ULY={uly_s} LRX={lrx_s} LRY={lry_s}"
            )));
        }

        let snapped = SnappedGrid {
            ulx: ulx_s,
            uly: uly_s,
            lrx: lrx_s,
            lry: lry_s,
            x_tiles: ((lrx_s - ulx_s) / self.tile_size) as usize,
            y_tiles: ((uly_s - lry_s) / self.tile_size) as usize,
        };

        debug!(
            ulx = snapped.ulx,
            uly = snapped.uly,
            lrx = snapped.lrx,
            lry = snapped.lry,
            x_tiles = snapped.x_tiles,
            y_tiles = snapped.y_tiles,
            tile_size = self.tile_size,
            "Snapped bbox to tile grid"
        );
        Ok(snapped)
    }

    /// Tiles covering `bbox`, column by column, north to south in each column.
    pub fn plan(&self, bbox: &ProjectedBbox) -> Result<Vec<TileDescriptor>> {
        let grid = self.snap(bbox)?;
        let mut tiles = Vec::with_capacity(grid.tile_count());

        for ix in 0..grid.x_tiles as i64 {
            for iy in 0..grid.y_tiles as i64 {
                let xmin = grid.ulx + ix * self.tile_size;
                let ymax = grid.uly - iy * self.tile_size;
                tiles.push(TileDescriptor {
                    xmin,
                    xmax: xmin + self.tile_size,
                    ymin: ymax - self.tile_size,
                    ymax,
                    size: self.tile_size,
                    scale_factor: self.scale_factor,
                });
            }
        }
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(ulx: f64, uly: f64, lrx: f64, lry: f64) -> ProjectedBbox {
        ProjectedBbox { ulx, uly, lrx, lry }
    }

    #[test]
    fn test_snap_covers_input_on_exact_multiples() {
        let planner = GridPlanner::new(1000, 1.0).unwrap();
        let cases = [
            bbox(566_123.4, 245_876.2, 569_001.0, 243_010.9),
            bbox(500_000.0, 300_000.0, 500_000.5, 299_999.5),
            bbox(1_000.0, 2_000.0, 3_000.0, 1_000.0),
            bbox(0.0, 999.9, 0.1, 0.0),
            bbox(723_456.789, 512_345.678, 731_234.567, 498_765.432),
        ];

        for input in cases {
            let grid = planner.snap(&input).unwrap();
            assert!(grid.ulx as f64 <= input.ulx, "{input:?}");
            assert!(grid.uly as f64 >= input.uly, "{input:?}");
            assert!(grid.lrx as f64 >= input.lrx, "{input:?}");
            assert!(grid.lry as f64 <= input.lry, "{input:?}");
            for v in [grid.ulx, grid.uly, grid.lrx, grid.lry] {
                assert_eq!(v % 1000, 0);
            }
            assert_eq!(grid.x_tiles as i64 * 1000, grid.lrx - grid.ulx);
            assert_eq!(grid.y_tiles as i64 * 1000, grid.uly - grid.lry);
        }
    }

    #[test]
    fn test_plan_is_column_major_north_first() {
        let planner = GridPlanner::new(1000, 1.0).unwrap();
        let tiles = planner
            .plan(&bbox(566_500.0, 245_500.0, 567_500.0, 243_500.0))
            .unwrap();

        let corners: Vec<(i64, i64)> = tiles.iter().map(|t| (t.xmin, t.ymax)).collect();
        assert_eq!(
            corners,
            vec![
                (566_000, 246_000),
                (566_000, 245_000),
                (566_000, 244_000),
                (567_000, 246_000),
                (567_000, 245_000),
                (567_000, 244_000),
            ]
        );
        for tile in &tiles {
            assert_eq!(tile.xmax - tile.xmin, 1000);
            assert_eq!(tile.ymax - tile.ymin, 1000);
            assert_eq!(tile.size, 1000);
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = GridPlanner::new(500, 0.5).unwrap();
        let input = bbox(566_123.4, 245_876.2, 569_001.0, 243_010.9);
        assert_eq!(planner.plan(&input).unwrap(), planner.plan(&input).unwrap());
    }

    #[test]
    fn test_plan_tiles_cover_snapped_grid_without_gaps() {
        let planner = GridPlanner::new(250, 1.0).unwrap();
        let input = bbox(10_010.0, 20_990.0, 11_240.0, 20_020.0);
        let grid = planner.snap(&input).unwrap();
        let tiles = planner.plan(&input).unwrap();

        assert_eq!(tiles.len(), grid.tile_count());
        let area: i64 = tiles.iter().map(|t| (t.xmax - t.xmin) * (t.ymax - t.ymin)).sum();
        assert_eq!(area, (grid.lrx - grid.ulx) * (grid.uly - grid.lry));

        let mut keys: Vec<TileKey> = tiles.iter().map(|t| t.key()).collect();
        keys.dedup();
        assert_eq!(keys.len(), tiles.len());
    }

    #[test]
    fn test_negative_snapped_coordinate_is_rejected() {
        let planner = GridPlanner::new(1000, 1.0).unwrap();
        let err = planner.plan(&bbox(-10.0, 5_000.0, 2_000.0, 1_000.0)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidBbox(_)));
    }

    #[test]
    fn test_inverted_bbox_is_rejected() {
        let planner = GridPlanner::new(1000, 1.0).unwrap();
        let err = planner.plan(&bbox(5_000.0, 1_000.0, 2_000.0, 3_000.0)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidBbox(_)));
    }

    #[test]
    fn test_tile_size_must_be_positive() {
        assert!(matches!(
            GridPlanner::new(0, 1.0),
            Err(FetchError::InvalidTileSize(0))
        ));
    }
}

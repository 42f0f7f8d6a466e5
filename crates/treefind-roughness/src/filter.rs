//! Window filters over elevation grids.
//!
//! All windows are square, `2 * half + 1` cells on a side, centred on the
//! output cell. Out-of-range samples are replaced by the nearest in-range
//! sample (no wrapping, no zero padding).

use treefind_raster::{is_nodata, Grid};

/// Fold every window with `fold`, one axis at a time.
///
/// Square windows with nearest-edge extension separate exactly into a
/// horizontal pass followed by a vertical pass.
fn separable_reduce<T: Copy>(
    grid: &Grid<T>,
    half: usize,
    identity: T,
    fold: impl Fn(T, T) -> T,
) -> Grid<T> {
    let (width, height) = grid.dimensions();
    let k = half as isize;

    let horizontal = Grid::from_fn(width, height, |row, col| {
        (-k..=k).fold(identity, |acc, d| {
            fold(acc, grid.get_clamped(row as isize, col as isize + d))
        })
    });
    Grid::from_fn(width, height, |row, col| {
        (-k..=k).fold(identity, |acc, d| {
            fold(acc, horizontal.get_clamped(row as isize + d, col as isize))
        })
    })
}

/// Windowed maximum and minimum of `values`.
///
/// Missing samples never win a window. A window holding only missing samples
/// yields `-inf` for the maximum and `+inf` for the minimum.
pub fn local_extrema(
    values: &Grid<f32>,
    half: usize,
    nodata: Option<f64>,
) -> (Grid<f32>, Grid<f32>) {
    let for_max = values.map(|v| if is_nodata(v, nodata) { f32::NEG_INFINITY } else { v });
    let for_min = values.map(|v| if is_nodata(v, nodata) { f32::INFINITY } else { v });

    let local_max = separable_reduce(&for_max, half, f32::NEG_INFINITY, f32::max);
    let local_min = separable_reduce(&for_min, half, f32::INFINITY, f32::min);
    (local_max, local_min)
}

/// Larger of the upward and downward deviation from the window extremes.
///
/// Zero on a flat neighbourhood and on missing samples.
pub fn roughness_score(values: &Grid<f32>, half: usize, nodata: Option<f64>) -> Grid<f32> {
    let (local_max, local_min) = local_extrema(values, half, nodata);
    let (width, height) = values.dimensions();

    Grid::from_fn(width, height, |row, col| {
        let value = values.get(row, col);
        if is_nodata(value, nodata) {
            return 0.0;
        }
        (local_max.get(row, col) - value).max(value - local_min.get(row, col))
    })
}

/// Uniform (box) mean over each window.
pub fn box_blur(values: &Grid<f32>, half: usize) -> Grid<f32> {
    let cells = ((2 * half + 1) * (2 * half + 1)) as f64;
    let sums = separable_reduce(&values.map(f64::from), half, 0.0, |a, b| a + b);
    sums.map(|sum| (sum / cells) as f32)
}

/// Clamp every sample into `[0, 1]`.
pub fn clip_unit(values: &Grid<f32>) -> Grid<f32> {
    values.map(|v| v.clamp(0.0, 1.0))
}

/// 1 where `value >= threshold`, else 0.
pub fn binarize(values: &Grid<f32>, threshold: f32) -> Grid<u8> {
    values.map(|v| u8::from(v >= threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> Grid<f32> {
        Grid::from_fn(4, 3, |row, col| (row * 4 + col) as f32)
    }

    #[test]
    fn test_local_extrema_clamps_at_edges() {
        let (max, min) = local_extrema(&ramp(), 1, None);
        // Corner (0,0) sees rows 0..=1, cols 0..=1 after clamping.
        assert_eq!(max.get(0, 0), 5.0);
        assert_eq!(min.get(0, 0), 0.0);
        // Bottom-right corner sees rows 1..=2, cols 2..=3.
        assert_eq!(max.get(2, 3), 11.0);
        assert_eq!(min.get(2, 3), 6.0);
        // Interior.
        assert_eq!(max.get(1, 1), 10.0);
        assert_eq!(min.get(1, 1), 0.0);
    }

    #[test]
    fn test_local_extrema_skips_missing() {
        let mut values = Grid::filled(3, 3, 5.0f32);
        values.set(0, 0, -9999.0);
        values.set(2, 2, f32::NAN);
        let (max, min) = local_extrema(&values, 1, Some(-9999.0));
        assert_eq!(max.get(1, 1), 5.0);
        assert_eq!(min.get(1, 1), 5.0);
    }

    #[test]
    fn test_box_blur_uses_nearest_extension() {
        // Row 0 = 0, row 1 = 9. A corner window reads row 0 twice (clamped)
        // and row 1 once: (6 * 0 + 3 * 9) / 9 = 3.
        let values = Grid::from_fn(2, 2, |row, _| if row == 0 { 0.0 } else { 9.0 });
        let blurred = box_blur(&values, 1);
        assert_relative_eq!(blurred.get(0, 0), 3.0);
        assert_relative_eq!(blurred.get(1, 1), 6.0);
    }

    #[test]
    fn test_box_blur_preserves_constant() {
        let blurred = box_blur(&Grid::filled(5, 4, 2.5), 2);
        assert!(blurred.data().iter().all(|&v| (v - 2.5).abs() < 1e-6));
    }

    #[test]
    fn test_binarize_threshold_is_inclusive() {
        let values = Grid::new(3, 1, vec![0.999_999, 1.0, 0.0]).unwrap();
        assert_eq!(binarize(&values, 1.0).data(), &[0, 1, 0]);
    }

    #[test]
    fn test_clip_unit() {
        let values = Grid::new(3, 1, vec![-0.5, 0.25, 7.0]).unwrap();
        assert_eq!(clip_unit(&values).data(), &[0.0, 0.25, 1.0]);
    }

    #[test]
    fn test_roughness_score_is_zero_on_missing() {
        let mut values = Grid::filled(3, 3, 0.0f32);
        values.set(1, 1, -9999.0);
        let score = roughness_score(&values, 1, Some(-9999.0));
        assert!(score.data().iter().all(|&v| v == 0.0));
    }
}

//! Binary morphology with a square structuring element.
//!
//! Cells outside the grid count as background: erosion clears the border,
//! dilation never grows from outside.

use treefind_raster::Grid;

fn sample_or_background(mask: &Grid<u8>, row: isize, col: isize) -> u8 {
    let (width, height) = mask.dimensions();
    if row < 0 || col < 0 || row >= height as isize || col >= width as isize {
        0
    } else {
        mask.get(row as usize, col as usize)
    }
}

fn reduce_window(mut hits: impl Iterator<Item = u8>, all: bool) -> u8 {
    if all {
        u8::from(hits.all(|v| v != 0))
    } else {
        u8::from(hits.any(|v| v != 0))
    }
}

fn separable(mask: &Grid<u8>, half: usize, all: bool) -> Grid<u8> {
    let (width, height) = mask.dimensions();
    let k = half as isize;

    let horizontal = Grid::from_fn(width, height, |row, col| {
        let hits = (-k..=k).map(|d| sample_or_background(mask, row as isize, col as isize + d));
        reduce_window(hits, all)
    });
    Grid::from_fn(width, height, |row, col| {
        let hits = (-k..=k)
            .map(|d| sample_or_background(&horizontal, row as isize + d, col as isize));
        reduce_window(hits, all)
    })
}

/// One binary erosion pass.
pub fn erode(mask: &Grid<u8>, half: usize) -> Grid<u8> {
    separable(mask, half, true)
}

/// One binary dilation pass.
pub fn dilate(mask: &Grid<u8>, half: usize) -> Grid<u8> {
    separable(mask, half, false)
}

/// Erode `iterations` times, then dilate the same number of times.
pub fn opening(mask: &Grid<u8>, half: usize, iterations: usize) -> Grid<u8> {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, half);
    }
    for _ in 0..iterations {
        out = dilate(&out, half);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: usize, from: usize, to: usize) -> Grid<u8> {
        Grid::from_fn(size, size, |row, col| {
            u8::from((from..to).contains(&row) && (from..to).contains(&col))
        })
    }

    #[test]
    fn test_erode_shrinks_square() {
        let eroded = erode(&square(9, 2, 7), 1);
        assert_eq!(eroded, square(9, 3, 6));
    }

    #[test]
    fn test_erode_clears_border() {
        let eroded = erode(&Grid::filled(4, 4, 1), 1);
        assert_eq!(eroded, square(4, 1, 3));
    }

    #[test]
    fn test_dilate_grows_square() {
        let dilated = dilate(&square(9, 3, 6), 1);
        assert_eq!(dilated, square(9, 2, 7));
    }

    #[test]
    fn test_opening_removes_isolated_cell() {
        let mut mask = Grid::filled(7, 7, 0u8);
        mask.set(3, 3, 1);
        let opened = opening(&mask, 1, 1);
        assert!(opened.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_opening_keeps_large_region() {
        let mask = square(15, 3, 12);
        assert_eq!(opening(&mask, 1, 2), mask);
    }
}

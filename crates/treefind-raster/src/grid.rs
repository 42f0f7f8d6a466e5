//! Dense row-major 2-D sample grid.

use crate::{RasterError, Result};

/// A dense 2-D grid of samples in row-major order.
///
/// Row 0 is the northern edge, column 0 the western edge, matching the
/// sample order of a north-up GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    /// Wrap an existing sample buffer.
    ///
    /// Fails if `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        let expected = width * height;
        if data.len() != expected {
            return Err(RasterError::ShapeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)` in cells.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// True if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the cell is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.height && col < self.width, "cell ({row}, {col}) out of bounds");
        self.data[row * self.width + col]
    }

    /// Sample at `(row, col)` with the indices clamped to the nearest edge.
    pub fn get_clamped(&self, row: isize, col: isize) -> T {
        let row = row.clamp(0, self.height as isize - 1) as usize;
        let col = col.clamp(0, self.width as isize - 1) as usize;
        self.data[row * self.width + col]
    }

    /// Overwrite the sample at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the cell is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.height && col < self.width, "cell ({row}, {col}) out of bounds");
        self.data[row * self.width + col] = value;
    }

    /// Samples in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Apply `f` to every sample.
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Grid::new(3, 2, vec![0.0f32; 5]).unwrap_err();
        assert!(matches!(
            err,
            RasterError::ShapeMismatch {
                expected: 6,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_row_major_layout() {
        let grid = Grid::from_fn(3, 2, |row, col| (row * 10 + col) as u8);
        assert_eq!(grid.data(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(grid.get(1, 2), 12);
    }

    #[test]
    fn test_get_clamped_uses_nearest_edge() {
        let grid = Grid::from_fn(3, 3, |row, col| (row * 3 + col) as i32);
        assert_eq!(grid.get_clamped(-1, -1), 0);
        assert_eq!(grid.get_clamped(-5, 1), 1);
        assert_eq!(grid.get_clamped(3, 3), 8);
        assert_eq!(grid.get_clamped(1, 7), 5);
    }
}

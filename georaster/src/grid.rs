use crate::RasterError;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A (row, column) index into a [Grid].
///
/// Row 0 is the northern edge and column 0 the western edge of
/// whatever area the grid covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Returns the cell at (`drow`, `dcol`) from `self` if it falls
    /// inside a grid of `dimensions` (rows, cols).
    pub fn offset(self, drow: isize, dcol: isize, (rows, cols): (usize, usize)) -> Option<Self> {
        let row = self.row.checked_add_signed(drow)?;
        let col = self.col.checked_add_signed(dcol)?;
        (row < rows && col < cols).then_some(Self { row, col })
    }

    /// Euclidean distance in cell units.
    pub fn distance(self, other: Self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let (dr, dc) = (
            self.row.abs_diff(other.row) as f64,
            self.col.abs_diff(other.col) as f64,
        );
        dr.hypot(dc)
    }

    /// Chessboard distance in cell units.
    pub fn chebyshev(self, other: Self) -> usize {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Cost of moving one unit of distance through a cell.
///
/// Always finite and non-negative. Impassable cells are represented
/// by the absence of a `Cost` (see [CostGrid]), never by a large
/// number.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Cost(f64);

impl Cost {
    pub const UNIT: Self = Self(1.0);

    /// Returns `None` for negative, NaN, or infinite values.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value >= 0.0).then_some(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Movement cost per cell, `None` meaning impassable.
pub type CostGrid = Grid<Option<Cost>>;

/// Traversability per cell, `true` meaning impassable.
pub type ObstacleMask = Grid<bool>;

/// A dense, row-major 2D array with at least one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    samples: Box<[T]>,
}

impl<T: Clone> Grid<T> {
    /// Returns a `rows` x `cols` grid with every sample set to `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Result<Self, RasterError> {
        check_dimensions(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            samples: vec![value; rows * cols].into_boxed_slice(),
        })
    }
}

impl<T> Grid<T> {
    /// Returns a grid backed by row-major `samples`.
    pub fn from_vec(rows: usize, cols: usize, samples: Vec<T>) -> Result<Self, RasterError> {
        check_dimensions(rows, cols)?;
        if samples.len() != rows * cols {
            return Err(RasterError::SampleCount {
                expected: rows * cols,
                actual: samples.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            samples: samples.into_boxed_slice(),
        })
    }

    /// Returns a grid from a list of equally sized rows, north first.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, RasterError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        check_dimensions(n_rows, n_cols)?;
        let mut samples = Vec::with_capacity(n_rows * n_cols);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != n_cols {
                return Err(RasterError::Ragged {
                    row,
                    len: values.len(),
                    expected: n_cols,
                });
            }
            samples.extend(values);
        }
        Self::from_vec(n_rows, n_cols, samples)
    }

    /// Returns a grid where each sample is produced by `f(cell)`.
    pub fn from_fn(
        rows: usize,
        cols: usize,
        mut f: impl FnMut(Cell) -> T,
    ) -> Result<Self, RasterError> {
        check_dimensions(rows, cols)?;
        let samples = (0..rows * cols)
            .map(|idx| f(Cell::new(idx / cols, idx % cols)))
            .collect();
        Self::from_vec(rows, cols, samples)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns (rows, cols).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns the number of samples in this grid.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.contains(cell)
            .then(|| &self.samples[self.linear_index(cell)])
    }

    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut T> {
        if self.contains(cell) {
            let idx = self.linear_index(cell);
            Some(&mut self.samples[idx])
        } else {
            None
        }
    }

    /// Row-major index of `cell`. Does not check bounds.
    pub fn linear_index(&self, cell: Cell) -> usize {
        cell.row * self.cols + cell.col
    }

    /// Inverse of [Grid::linear_index].
    pub fn cell_at(&self, idx: usize) -> Cell {
        Cell::new(idx / self.cols, idx % self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.samples
    }

    /// Returns an iterator over every (cell, sample), row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, &T)> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| (self.cell_at(idx), sample))
    }

    /// Returns a same-shaped grid of `f(sample)`.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            samples: self.samples.iter().map(f).collect(),
        }
    }

    /// Like [Grid::map], but `f` also receives each sample's cell.
    pub fn map_cells<U>(&self, mut f: impl FnMut(Cell, &T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            samples: self
                .samples
                .iter()
                .enumerate()
                .map(|(idx, sample)| f(self.cell_at(idx), sample))
                .collect(),
        }
    }

    /// Number of samples for which `pred` holds.
    pub fn count_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.samples.iter().filter(|s| pred(s)).count()
    }

    pub fn ensure_same_shape<U>(&self, other: &Grid<U>) -> Result<(), RasterError> {
        if self.dimensions() == other.dimensions() {
            Ok(())
        } else {
            Err(RasterError::ShapeMismatch(
                self.dimensions(),
                other.dimensions(),
            ))
        }
    }

    /// Resamples `self` onto a `rows` x `cols` grid covering the same
    /// area.
    ///
    /// Every output cell folds all source samples whose footprint
    /// overlaps it, starting from `init`. Works for both downsampling
    /// (blocks of several samples) and upsampling (a single sample
    /// shared by several output cells).
    pub fn reduce_to<U: Clone>(
        &self,
        rows: usize,
        cols: usize,
        init: U,
        f: impl Fn(U, &T) -> U,
    ) -> Result<Grid<U>, RasterError> {
        Grid::from_fn(rows, cols, |cell| {
            let (r0, r1) = covering(cell.row, rows, self.rows);
            let (c0, c1) = covering(cell.col, cols, self.cols);
            let mut acc = init.clone();
            for row in r0..r1 {
                for col in c0..c1 {
                    acc = f(acc, &self[Cell::new(row, col)]);
                }
            }
            acc
        })
    }
}

impl Grid<Option<Cost>> {
    /// Lowest passable cost in the grid, if any cell is passable.
    pub fn min_cost(&self) -> Option<Cost> {
        self.samples
            .iter()
            .flatten()
            .copied()
            .min_by(|a, b| a.get().total_cmp(&b.get()))
    }

    /// Returns a mask with `true` for every impassable cell.
    pub fn impassable(&self) -> ObstacleMask {
        self.map(Option::is_none)
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    fn index(&self, cell: Cell) -> &T {
        assert!(self.contains(cell), "{cell:?} outside {:?}", self.dimensions());
        &self.samples[self.linear_index(cell)]
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    fn index_mut(&mut self, cell: Cell) -> &mut T {
        assert!(self.contains(cell), "{cell:?} outside {:?}", self.dimensions());
        let idx = self.linear_index(cell);
        &mut self.samples[idx]
    }
}

fn check_dimensions(rows: usize, cols: usize) -> Result<(), RasterError> {
    if rows == 0 || cols == 0 {
        Err(RasterError::Empty { rows, cols })
    } else {
        Ok(())
    }
}

/// Returns the half-open range of source indices (out of `src_len`)
/// overlapped by output index `idx` (out of `dst_len`).
fn covering(idx: usize, dst_len: usize, src_len: usize) -> (usize, usize) {
    let start = idx * src_len / dst_len;
    let end = ((idx + 1) * src_len).div_ceil(dst_len).min(src_len);
    (start, end.max(start + 1))
}

use thiserror::Error;

/// Malformed grids, bounds, or transforms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("grid has zero size ({rows}x{cols})")]
    Empty { rows: usize, cols: usize },

    #[error("expected {expected} samples for grid, got {actual}")]
    SampleCount { expected: usize, actual: usize },

    #[error("ragged rows: row {row} has {len} columns, expected {expected}")]
    Ragged {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("grid shapes differ: {0:?} vs {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),

    #[error("invalid bounds N:{north} S:{south} E:{east} W:{west}")]
    Bounds {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },

    #[error("affine transform is not invertible")]
    Singular,
}

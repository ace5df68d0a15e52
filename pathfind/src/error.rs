use georaster::{Cell, RasterError};
use terrain::TerrainError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathfindError {
    #[error("missing required parameter '{0}'")]
    Builder(&'static str),

    #[error("invalid parameter: {0}")]
    Param(&'static str),

    #[error("{cell:?} is outside the {dimensions:?} grid")]
    OutOfBounds {
        cell: Cell,
        dimensions: (usize, usize),
    },

    #[error("({lat}, {lon}) is outside the planning area")]
    OutsideArea { lat: f64, lon: f64 },

    #[error("{0}")]
    Raster(#[from] RasterError),

    #[error("{0}")]
    Terrain(#[from] TerrainError),
}

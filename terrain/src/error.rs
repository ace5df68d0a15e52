use georaster::RasterError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerrainError {
    #[error("missing required parameters: {0}")]
    Builder(&'static str),

    #[error("invalid parameter: {0}")]
    Param(&'static str),

    #[error("invalid cost {cost} for land-cover class {class}")]
    CostTable { class: u8, cost: f64 },

    #[error("terrain data unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Raster(#[from] RasterError),
}

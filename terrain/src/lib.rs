mod cost;
mod error;
pub mod landcover;
mod mask;
pub mod math;
mod source;

pub use crate::{
    cost::{hiking_speed_kmh, slope_cost, CostSurface, CostSurfaceBuilder, CostSurfaceConfig},
    error::TerrainError,
    landcover::{ClassCost, CostTable, LandCoverClass},
    mask::{DetectorPolicy, ObstacleInput, ObstacleLayer, ObstacleMaskBuilder},
    source::{ObstacleDetector, TerrainRasters, TerrainSource},
};

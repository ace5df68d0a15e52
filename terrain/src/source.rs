//! Interfaces to whatever supplies rasters and obstacle detections.

use crate::{ObstacleInput, TerrainError};
use georaster::{Bounds, GeoTransform, Grid};

/// Rasters covering one request area.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainRasters {
    /// Meters above sea level, NaN where missing.
    pub elevation: Grid<f64>,

    /// Land-cover class codes. Need not share `elevation`'s
    /// resolution.
    pub landcover: Grid<u8>,

    /// Transform of `elevation`.
    pub transform: GeoTransform,
}

pub trait TerrainSource {
    /// Returns elevation and land cover for `bounds`.
    fn fetch(&self, bounds: &Bounds) -> Result<TerrainRasters, TerrainError>;
}

pub trait ObstacleDetector {
    /// Returns the obstacles found within `bounds`, referenced to
    /// `transform` when returned as grids.
    fn detect(&self, bounds: &Bounds, transform: &GeoTransform)
        -> Result<ObstacleInput, TerrainError>;
}

//! Georeferenced grids and the transforms between grid cells and
//! geographic coordinates.
//!
//! Every grid in this workspace is row-major with row 0 at the
//! northern edge and column 0 at the western edge.

pub mod constants;
mod error;
mod grid;
mod transform;

pub use crate::{
    error::RasterError,
    grid::{Cell, Cost, CostGrid, Grid, ObstacleMask},
    transform::{Affine, Bounds, GeoTransform, Projection},
};
pub use geo;

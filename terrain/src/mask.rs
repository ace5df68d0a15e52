use crate::TerrainError;
use geo::{
    algorithm::{BoundingRect, Intersects},
    geometry::{Coord, Polygon},
};
use georaster::{Cell, GeoTransform, Grid, ObstacleMask};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Obstacle information as produced by a detector.
#[derive(Debug, Clone, PartialEq)]
pub enum ObstacleInput {
    /// Obstacle footprints in geographic coordinates.
    Polygons(Vec<Polygon>),

    /// A pre-classified grid, `true` = obstacle.
    Mask(ObstacleMask),

    /// Separate obstacle and traversable-ground classifications,
    /// `true` meaning the class applies.
    Classified {
        obstacle: Grid<bool>,
        traversable: Grid<bool>,
    },
}

impl ObstacleInput {
    /// No obstacles at all.
    pub fn none() -> Self {
        Self::Polygons(Vec::new())
    }
}

/// Which classification decides a cell that is marked both obstacle
/// and traversable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorPolicy {
    /// The cell is an obstacle.
    #[default]
    ObstacleWins,
    /// The cell is clear.
    TraversableWins,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleLayer {
    /// `true` = impassable.
    pub mask: ObstacleMask,

    /// The detector's traversable classification left no clear cell
    /// and was ignored.
    pub detector_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObstacleMaskBuilder {
    /// Safety margin around obstacles, meters.
    buffer_m: f64,

    /// Ground size of one dilation step, meters.
    resolution_m: Option<f64>,

    policy: DetectorPolicy,

    /// Areas closed to travel whatever the detector reports.
    no_go_zones: Vec<Polygon>,
}

impl ObstacleMaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn buffer(mut self, meters: f64) -> Self {
        self.buffer_m = meters;
        self
    }

    /// Overrides the ground size of one cell used to convert the buffer
    /// into dilation passes. Defaults to the transform's finer
    /// resolution.
    #[must_use]
    pub fn resolution(mut self, meters: f64) -> Self {
        self.resolution_m = Some(meters);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: DetectorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Geographic polygons marked impassable on top of the detector's
    /// obstacles. Buffered like any other obstacle.
    #[must_use]
    pub fn no_go_zones(mut self, zones: Vec<Polygon>) -> Self {
        self.no_go_zones = zones;
        self
    }

    pub fn build(
        &self,
        input: &ObstacleInput,
        transform: &GeoTransform,
    ) -> Result<ObstacleLayer, TerrainError> {
        if !(self.buffer_m.is_finite() && self.buffer_m >= 0.0) {
            return Err(TerrainError::Param("buffer must be non-negative"));
        }
        let resolution = self.resolution_m.unwrap_or_else(|| transform.resolution_m());
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(TerrainError::Param("resolution must be positive"));
        }

        let (rows, cols) = transform.dimensions();
        let (mut mask, detector_fallback) = match input {
            ObstacleInput::Polygons(polygons) => (rasterize(polygons, transform)?, false),
            ObstacleInput::Mask(mask) => (fit(mask, rows, cols, false, |a, b| a || b)?, false),
            ObstacleInput::Classified {
                obstacle,
                traversable,
            } => {
                let obstacle = fit(obstacle, rows, cols, false, |a, b| a || b)?;
                let traversable = fit(traversable, rows, cols, true, |a, b| a && b)?;
                self.fuse(&obstacle, &traversable)
            }
        };

        if !self.no_go_zones.is_empty() {
            let zones = rasterize(&self.no_go_zones, transform)?;
            mask = mask.map_cells(|cell, &blocked| blocked || zones[cell]);
        }

        // Past max(rows, cols) passes every obstacle has covered the grid.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let passes = ((self.buffer_m / resolution).floor() as usize).min(rows.max(cols));
        for _ in 0..passes {
            let grown = dilate(&mask);
            if grown == mask {
                break;
            }
            mask = grown;
        }

        debug!(
            "obstacle mask; dims: {:?}, buffer_passes: {}, obstacles: {}",
            mask.dimensions(),
            passes,
            mask.count_where(|&b| b)
        );

        Ok(ObstacleLayer {
            mask,
            detector_fallback,
        })
    }

    fn fuse(&self, obstacle: &Grid<bool>, traversable: &Grid<bool>) -> (ObstacleMask, bool) {
        let clear = match self.policy {
            DetectorPolicy::ObstacleWins => {
                traversable.map_cells(|cell, &t| t && !obstacle[cell])
            }
            DetectorPolicy::TraversableWins => traversable.clone(),
        };
        if clear.count_where(|&c| c) == 0 {
            warn!("detector classified no traversable cells, using obstacle classification only");
            (obstacle.clone(), true)
        } else {
            (clear.map(|&c| !c), false)
        }
    }
}

/// Resamples `grid` onto `rows` x `cols` when the shapes differ.
fn fit(
    grid: &Grid<bool>,
    rows: usize,
    cols: usize,
    init: bool,
    fold: impl Fn(bool, bool) -> bool,
) -> Result<Grid<bool>, TerrainError> {
    if grid.dimensions() == (rows, cols) {
        return Ok(grid.clone());
    }
    debug!("resampling mask; from: {:?}, to: {:?}", grid.dimensions(), (rows, cols));
    Ok(grid.reduce_to(rows, cols, init, |acc, &v| fold(acc, v))?)
}

/// Marks every cell whose footprint intersects or touches any polygon.
fn rasterize(polygons: &[Polygon], transform: &GeoTransform) -> Result<ObstacleMask, TerrainError> {
    let (rows, cols) = transform.dimensions();
    let mut mask = Grid::filled(rows, cols, false)?;
    for polygon in polygons {
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        let (min, max) = (rect.min(), rect.max());
        let corners = [
            min,
            max,
            Coord { x: min.x, y: max.y },
            Coord { x: max.x, y: min.y },
        ]
        .map(|c| transform.to_raster(c));
        let (row_lo, row_hi) = extent(corners.iter().map(|(row, _)| *row));
        let (col_lo, col_hi) = extent(corners.iter().map(|(_, col)| *col));
        let (Some(row_range), Some(col_range)) = (
            candidates(row_lo, row_hi, rows),
            candidates(col_lo, col_hi, cols),
        ) else {
            continue;
        };
        for row in row_range {
            for col in col_range.clone() {
                let cell = Cell::new(row, col);
                if !mask[cell] && transform.cell_polygon(cell).intersects(polygon) {
                    mask[cell] = true;
                }
            }
        }
    }
    Ok(mask)
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Cells that may overlap the raster span `lo..=hi`, padded by one
/// cell so that edge contacts are tested too.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn candidates(lo: f64, hi: f64, len: usize) -> Option<Range<usize>> {
    if !(lo.is_finite() && hi.is_finite()) || hi < -1.0 || lo > len as f64 + 1.0 {
        return None;
    }
    let start = (lo.floor() - 1.0).max(0.0) as usize;
    let end = (hi.floor() + 2.0).min(len as f64) as usize;
    (start < end).then_some(start..end)
}

/// Grows every obstacle into its 8-neighborhood.
fn dilate(mask: &ObstacleMask) -> ObstacleMask {
    let dims = mask.dimensions();
    mask.map_cells(|cell, &blocked| {
        blocked
            || (-1..=1).any(|dr| {
                (-1..=1).any(|dc| cell.offset(dr, dc, dims).map_or(false, |n| mask[n]))
            })
    })
}

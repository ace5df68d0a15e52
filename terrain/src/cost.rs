use crate::{
    landcover::{ClassCost, CostTable},
    math, TerrainError, TerrainRasters,
};
use georaster::{Cell, Cost, CostGrid, GeoTransform, Grid};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Fastest walking speed the hiking model allows, km/h.
pub const MAX_SPEED_KMH: f64 = 6.0;

/// Slowest walking speed the hiking model allows, km/h.
pub const MIN_SPEED_KMH: f64 = 0.5;

/// Floor applied to the final speed before inverting it, m/s.
const MIN_SPEED_MS: f64 = 0.1;

/// Parameters of the cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSurfaceConfig {
    /// Ground size of one elevation cell in meters. Derived from the
    /// raster's transform when unset.
    pub cell_size_m: Option<f64>,

    /// Fraction of the hiking speed achievable off road.
    pub off_road_factor: f64,

    /// Steepest traversable slope, rise over run.
    pub max_slope: f64,

    pub cost_table: CostTable,
}

impl Default for CostSurfaceConfig {
    fn default() -> Self {
        Self {
            cell_size_m: None,
            off_road_factor: 0.6,
            max_slope: 1.0,
            cost_table: CostTable::esa_worldcover(),
        }
    }
}

impl CostSurfaceConfig {
    /// Sets the steepest traversable slope from an angle, e.g. a
    /// vehicle's climbing limit.
    #[must_use]
    pub fn with_max_slope_degrees(mut self, degrees: f64) -> Self {
        self.max_slope = degrees.to_radians().tan();
        self
    }

    pub fn validate(&self) -> Result<(), TerrainError> {
        if !(self.off_road_factor.is_finite() && self.off_road_factor > 0.0) {
            return Err(TerrainError::Param("off_road_factor must be positive"));
        }
        if self.max_slope.is_nan() || self.max_slope < 0.0 {
            return Err(TerrainError::Param("max_slope must be non-negative"));
        }
        if let Some(size) = self.cell_size_m {
            if !(size.is_finite() && size > 0.0) {
                return Err(TerrainError::Param("cell_size_m must be positive"));
            }
        }
        self.cost_table.validate()
    }

    /// `cell_size_m` if set, otherwise the ground size of `transform`'s
    /// cells.
    fn cell_size(&self, transform: &GeoTransform) -> (f64, f64) {
        self.cell_size_m
            .map_or_else(|| transform.cell_size_m(), |size| (size, size))
    }
}

/// Tobler's hiking function: walking speed in km/h on a slope given
/// as rise over run.
pub fn hiking_speed_kmh(slope: f64) -> f64 {
    (MAX_SPEED_KMH * (-3.5 * (slope + 0.05).abs()).exp()).clamp(MIN_SPEED_KMH, MAX_SPEED_KMH)
}

/// Seconds needed to cross one meter of terrain with `slope`.
pub fn slope_cost(slope: f64, off_road_factor: f64) -> f64 {
    let speed_ms = hiking_speed_kmh(slope) * off_road_factor / 3.6;
    1.0 / speed_ms.max(MIN_SPEED_MS)
}

/// Per-cell movement cost (seconds per meter) plus the rasters it was
/// derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSurface {
    costs: CostGrid,
    slope: Grid<f64>,
    elevation: Option<Grid<f64>>,
    classes: Option<Grid<u8>>,
    cost_table: CostTable,
    transform: GeoTransform,

    /// Ground size of one cell, (north-south, east-west) meters.
    cell_size_m: (f64, f64),
}

impl CostSurface {
    pub fn builder<'a>() -> CostSurfaceBuilder<'a> {
        CostSurfaceBuilder {
            elevation: None,
            landcover: None,
            transform: None,
        }
    }

    /// A level, fully passable surface for when no terrain data is
    /// available.
    pub fn flat(transform: GeoTransform, config: &CostSurfaceConfig) -> Result<Self, TerrainError> {
        config.validate()?;
        let (rows, cols) = transform.dimensions();
        let cost = Cost::new(slope_cost(0.0, config.off_road_factor))
            .ok_or(TerrainError::Param("off_road_factor must be positive"))?;
        Ok(Self {
            costs: Grid::filled(rows, cols, Some(cost))?,
            slope: Grid::filled(rows, cols, 0.0)?,
            elevation: None,
            classes: None,
            cost_table: config.cost_table.clone(),
            cell_size_m: config.cell_size(&transform),
            transform,
        })
    }

    pub fn costs(&self) -> &CostGrid {
        &self.costs
    }

    pub fn into_costs(self) -> CostGrid {
        self.costs
    }

    pub fn slope(&self) -> &Grid<f64> {
        &self.slope
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Ground size of one cell, (north-south, east-west) meters.
    pub fn cell_size_m(&self) -> (f64, f64) {
        self.cell_size_m
    }

    /// Seconds needed to walk `cells` in order, each step costing its
    /// ground length times the mean cost of the two cells it joins.
    ///
    /// Returns `None` if any cell is impassable or outside the grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn travel_time_s(&self, cells: &[Cell]) -> Option<f64> {
        let (row_m, col_m) = self.cell_size_m;
        let mut total = 0.0;
        for pair in cells.windows(2) {
            let a = (*self.costs.get(pair[0])?)?.get();
            let b = (*self.costs.get(pair[1])?)?.get();
            let step_m = (pair[0].row.abs_diff(pair[1].row) as f64 * row_m)
                .hypot(pair[0].col.abs_diff(pair[1].col) as f64 * col_m);
            total += step_m * (a + b) / 2.0;
        }
        if let [only] = cells {
            (*self.costs.get(*only)?)?;
        }
        Some(total)
    }

    /// Returns `true` if this surface was not derived from terrain
    /// data.
    pub fn is_flat(&self) -> bool {
        self.elevation.is_none()
    }

    /// Elevation in meters, if known.
    pub fn elevation_at(&self, cell: Cell) -> Option<f64> {
        self.elevation
            .as_ref()
            .and_then(|e| e.get(cell))
            .copied()
            .filter(|v| v.is_finite())
    }

    /// Land-cover class code assigned to `cell`.
    pub fn class_at(&self, cell: Cell) -> Option<u8> {
        self.classes.as_ref().and_then(|c| c.get(cell)).copied()
    }

    /// Land-cover label of `cell`.
    pub fn label_at(&self, cell: Cell) -> Option<&str> {
        self.class_at(cell).map(|class| self.cost_table.label(class))
    }
}

pub struct CostSurfaceBuilder<'a> {
    elevation: Option<&'a Grid<f64>>,

    /// Land-cover class codes. May be finer or coarser than
    /// `elevation`.
    landcover: Option<&'a Grid<u8>>,

    transform: Option<GeoTransform>,
}

impl<'a> CostSurfaceBuilder<'a> {
    /// Elevation in meters, NaN where missing.
    #[must_use]
    pub fn elevation(mut self, elevation: &'a Grid<f64>) -> Self {
        self.elevation = Some(elevation);
        self
    }

    #[must_use]
    pub fn landcover(mut self, landcover: &'a Grid<u8>) -> Self {
        self.landcover = Some(landcover);
        self
    }

    /// Transform of the elevation raster.
    #[must_use]
    pub fn transform(mut self, transform: GeoTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Sets elevation, land cover, and transform at once.
    #[must_use]
    pub fn rasters(self, rasters: &'a TerrainRasters) -> Self {
        self.elevation(&rasters.elevation)
            .landcover(&rasters.landcover)
            .transform(rasters.transform)
    }

    pub fn build(&self, config: &CostSurfaceConfig) -> Result<CostSurface, TerrainError> {
        let (Some(elevation), Some(landcover), Some(transform)) =
            (self.elevation, self.landcover, self.transform)
        else {
            return Err(TerrainError::Builder("elevation, landcover, and transform"));
        };
        config.validate()?;
        if transform.dimensions() != elevation.dimensions() {
            return Err(georaster::RasterError::ShapeMismatch(
                transform.dimensions(),
                elevation.dimensions(),
            )
            .into());
        }

        let (rows, cols) = elevation.dimensions();
        let table = &config.cost_table;
        let classes = if landcover.dimensions() == elevation.dimensions() {
            landcover.clone()
        } else {
            if landcover.rows() < rows || landcover.cols() < cols {
                warn!(
                    "landcover {:?} is coarser than elevation {:?}, classes are repeated across cells",
                    landcover.dimensions(),
                    elevation.dimensions()
                );
            } else {
                debug!(
                    "downsampling landcover; from: {:?}, to: {:?}",
                    landcover.dimensions(),
                    elevation.dimensions()
                );
            }
            landcover
                .reduce_to(rows, cols, None, |worst: Option<u8>, &class| {
                    Some(worst.map_or(class, |w| table.worse(w, class)))
                })?
                .map(|class| class.unwrap_or_default())
        };

        let (row_m, col_m) = config.cell_size(&transform);
        let slope = math::slope(elevation, row_m, col_m);

        let costs = slope.map_cells(|cell, &s| {
            if elevation[cell].is_nan() || s > config.max_slope {
                return None;
            }
            match table.cost(classes[cell]) {
                ClassCost::Impassable => None,
                ClassCost::Multiplier(m) => Cost::new(slope_cost(s, config.off_road_factor) * m),
            }
        });

        debug!(
            "cost surface; dims: {:?}, cell_size: ({:.1}, {:.1}) m, impassable: {}",
            costs.dimensions(),
            row_m,
            col_m,
            costs.count_where(Option::is_none)
        );

        Ok(CostSurface {
            costs,
            slope,
            elevation: Some(elevation.clone()),
            classes: Some(classes),
            cost_table: table.clone(),
            transform,
            cell_size_m: (row_m, col_m),
        })
    }
}

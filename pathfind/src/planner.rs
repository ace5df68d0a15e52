use crate::{
    astar::{Connectivity, GridPathfinder},
    postprocess::{PathPostProcessor, DEFAULT_MAX_WAYPOINTS},
    route::{Route, RoutePlan},
    variants::{RouteVariantGenerator, MAX_VARIANTS},
    PathfindError,
};
use geo::geometry::{Coord, Polygon};
use georaster::{constants::METERS_PER_DEGREE, Bounds, Cell, GeoTransform};
use log::{debug, warn};
use terrain::{
    CostSurface, CostSurfaceConfig, DetectorPolicy, ObstacleDetector, ObstacleInput,
    ObstacleMaskBuilder, TerrainSource,
};

/// Largest side, in degrees, of any area handed to providers.
pub const DEFAULT_MAX_SPAN_DEG: f64 = 0.02;

/// Margin added around the endpoints when no bounds are given.
pub const DEFAULT_MARGIN_DEG: f64 = 0.002;

/// Cell size of the flat surface used when terrain is unavailable.
pub const DEFAULT_FALLBACK_RESOLUTION_M: f64 = 30.0;

/// Plans routes between two points from terrain and obstacle
/// providers.
#[derive(Debug, Clone, PartialEq)]
pub struct Planner {
    /// Start point (required).
    start: Option<Coord>,

    /// End point (required).
    end: Option<Coord>,

    /// Planning area (defaults to a corridor around the endpoints).
    bounds: Option<Bounds>,

    /// Number of routes, 1 to 3 (defaults to 3).
    variants: usize,

    connectivity: Connectivity,

    /// Spline resampling interval in meters (defaults to none).
    smoothing_m: Option<f64>,

    max_waypoints: usize,

    /// Obstacle safety margin in meters (defaults to 0).
    buffer_m: f64,

    policy: DetectorPolicy,

    /// Areas kept clear of routes regardless of what the detector
    /// reports.
    no_go_zones: Vec<Polygon>,

    max_span_deg: f64,

    margin_deg: f64,

    fallback_resolution_m: f64,
}

impl Default for Planner {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            bounds: None,
            variants: MAX_VARIANTS,
            connectivity: Connectivity::Eight,
            smoothing_m: None,
            max_waypoints: DEFAULT_MAX_WAYPOINTS,
            buffer_m: 0.0,
            policy: DetectorPolicy::ObstacleWins,
            no_go_zones: Vec::new(),
            max_span_deg: DEFAULT_MAX_SPAN_DEG,
            margin_deg: DEFAULT_MARGIN_DEG,
            fallback_resolution_m: DEFAULT_FALLBACK_RESOLUTION_M,
        }
    }
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start point of the routes (required).
    #[must_use]
    pub fn start(mut self, coord: Coord) -> Self {
        self.start = Some(coord);
        self
    }

    /// End point of the routes (required).
    #[must_use]
    pub fn end(mut self, coord: Coord) -> Self {
        self.end = Some(coord);
        self
    }

    #[must_use]
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn variants(mut self, count: usize) -> Self {
        self.variants = count;
        self
    }

    #[must_use]
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    #[must_use]
    pub fn smoothing(mut self, interval_m: Option<f64>) -> Self {
        self.smoothing_m = interval_m;
        self
    }

    #[must_use]
    pub fn max_waypoints(mut self, max: usize) -> Self {
        self.max_waypoints = max;
        self
    }

    #[must_use]
    pub fn buffer(mut self, meters: f64) -> Self {
        self.buffer_m = meters;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: DetectorPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn no_go_zones(mut self, zones: Vec<Polygon>) -> Self {
        self.no_go_zones = zones;
        self
    }

    #[must_use]
    pub fn max_span_deg(mut self, degrees: f64) -> Self {
        self.max_span_deg = degrees;
        self
    }

    /// Margin around the endpoints when no bounds are set.
    #[must_use]
    pub fn margin_deg(mut self, degrees: f64) -> Self {
        self.margin_deg = degrees;
        self
    }

    /// Cell size of the flat surface used when terrain is unavailable.
    #[must_use]
    pub fn fallback_resolution(mut self, meters: f64) -> Self {
        self.fallback_resolution_m = meters;
        self
    }

    pub fn plan(
        &self,
        config: &CostSurfaceConfig,
        source: &dyn TerrainSource,
        detector: Option<&dyn ObstacleDetector>,
    ) -> Result<RoutePlan, PathfindError> {
        let start = self.start.ok_or(PathfindError::Builder("start"))?;
        let end = self.end.ok_or(PathfindError::Builder("end"))?;
        if !(self.max_span_deg.is_finite() && self.max_span_deg > 0.0) {
            return Err(PathfindError::Param("max_span_deg must be positive"));
        }

        let requested = match self.bounds {
            Some(bounds) => {
                bounds.validate()?;
                bounds
            }
            None => Bounds::around(start, end, self.margin_deg)?,
        };
        let bounds = requested.limit(self.max_span_deg);
        if bounds != requested {
            warn!(
                "planning area {:.4}x{:.4} deg exceeds {} deg, limited around its center",
                requested.height(),
                requested.width(),
                self.max_span_deg
            );
        }
        for coord in [start, end] {
            if !bounds.contains(coord) {
                return Err(PathfindError::OutsideArea {
                    lat: coord.y,
                    lon: coord.x,
                });
            }
        }

        let (surface, terrain_fallback) = match source.fetch(&bounds) {
            Ok(rasters) => (CostSurface::builder().rasters(&rasters).build(config)?, false),
            Err(e) => {
                warn!("terrain unavailable, using flat surface: {e}");
                let transform = self.fallback_transform(&bounds)?;
                (CostSurface::flat(transform, config)?, true)
            }
        };
        let transform = *surface.transform();
        let start_cell = locate(&transform, start)?;
        let end_cell = locate(&transform, end)?;

        let (input, mut detector_fallback) = match detector.map(|d| d.detect(&bounds, &transform)) {
            None => (ObstacleInput::none(), false),
            Some(Ok(input)) => (input, false),
            Some(Err(e)) => {
                warn!("obstacle detection failed, planning without obstacles: {e}");
                (ObstacleInput::none(), true)
            }
        };
        let layer = ObstacleMaskBuilder::new()
            .buffer(self.buffer_m)
            .policy(self.policy)
            .no_go_zones(self.no_go_zones.clone())
            .build(&input, &transform)?;
        detector_fallback |= layer.detector_fallback;

        let pathfinder =
            GridPathfinder::new(&layer.mask, self.connectivity).weighted(surface.costs())?;
        let raw_routes =
            RouteVariantGenerator::new(&pathfinder).generate(start_cell, end_cell, self.variants)?;

        let post = PathPostProcessor::new(&transform)
            .max_waypoints(self.max_waypoints)
            .smoothing(self.smoothing_m);
        let mut routes = Vec::with_capacity(raw_routes.len());
        for raw in raw_routes {
            let waypoints = post.process(raw.path.cells(), start, end, &surface)?;
            let distance_m = waypoints.last().map_or(0.0, |w| w.distance_m);
            debug!(
                "route; kind: {:?}, cells: {}, waypoints: {}, clear: {}, distance: {:.0} m",
                raw.kind,
                raw.path.len(),
                waypoints.len(),
                raw.valid,
                distance_m
            );
            routes.push(Route {
                kind: raw.kind,
                name: raw.kind.name().to_string(),
                waypoints,
                path_clear: raw.valid,
                distance_m,
                cost: raw.path.total_cost(),
                estimated_time_s: surface.travel_time_s(raw.path.cells()),
                cells: raw.path.cells().to_vec(),
            });
        }

        let (rows, cols) = transform.dimensions();
        Ok(RoutePlan {
            routes,
            terrain_fallback,
            detector_fallback,
            bounds,
            rows,
            cols,
        })
    }

    /// Geographic grid over `bounds` with roughly
    /// `fallback_resolution_m` cells.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn fallback_transform(&self, bounds: &Bounds) -> Result<GeoTransform, PathfindError> {
        if !(self.fallback_resolution_m.is_finite() && self.fallback_resolution_m > 0.0) {
            return Err(PathfindError::Param("fallback resolution must be positive"));
        }
        let height_m = bounds.height() * METERS_PER_DEGREE;
        let width_m = bounds.width() * METERS_PER_DEGREE * bounds.center().y.to_radians().cos();
        let rows = ((height_m / self.fallback_resolution_m).ceil() as usize).max(2);
        let cols = ((width_m / self.fallback_resolution_m).ceil() as usize).max(2);
        Ok(GeoTransform::from_bounds(bounds, rows, cols)?)
    }
}

/// Cell containing `coord`, tolerating points that sit exactly on the
/// grid's outer edge.
#[allow(clippy::cast_precision_loss)]
fn locate(transform: &GeoTransform, coord: Coord) -> Result<Cell, PathfindError> {
    const EDGE: f64 = 1e-6;
    let (row, col) = transform.to_raster(coord);
    let (rows, cols) = transform.dimensions();
    let inside = |v: f64, len: usize| v >= -EDGE && v <= len as f64 + EDGE;
    if inside(row, rows) && inside(col, cols) {
        Ok(transform.to_grid(coord))
    } else {
        Err(PathfindError::OutsideArea {
            lat: coord.y,
            lon: coord.x,
        })
    }
}

use crate::{spline::CubicSpline, PathfindError};
use geo::{
    algorithm::HaversineDistance,
    geometry::{Coord, Point},
};
use georaster::{Cell, GeoTransform};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use terrain::{math::linspace, CostSurface};

/// Default cap on waypoints kept by simplification.
pub const DEFAULT_MAX_WAYPOINTS: usize = 15;

/// Most spline segments a smoothed route is resampled into.
pub const MAX_SMOOTHED_SEGMENTS: usize = 2_000;

/// Per-cell details attached to waypoints.
pub trait CellAttributes {
    fn elevation_m(&self, cell: Cell) -> Option<f64>;
    fn terrain_label(&self, cell: Cell) -> Option<String>;
}

impl CellAttributes for CostSurface {
    fn elevation_m(&self, cell: Cell) -> Option<f64> {
        self.elevation_at(cell)
    }

    fn terrain_label(&self, cell: Cell) -> Option<String> {
        self.label_at(cell).map(str::to_string)
    }
}

/// No attributes.
impl CellAttributes for () {
    fn elevation_m(&self, _cell: Cell) -> Option<f64> {
        None
    }

    fn terrain_label(&self, _cell: Cell) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,

    /// Ground elevation in meters, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub elevation_m: Option<f64>,

    /// Haversine distance along the route from the first waypoint.
    pub distance_m: f64,

    /// Land-cover label, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub terrain: Option<String>,
}

impl Waypoint {
    pub fn coord(&self) -> Coord {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Turns a cell path into a short list of geographic waypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPostProcessor<'a> {
    transform: &'a GeoTransform,
    max_waypoints: usize,

    /// Resampling interval in meters. No smoothing when `None`.
    smoothing_m: Option<f64>,
}

impl<'a> PathPostProcessor<'a> {
    pub fn new(transform: &'a GeoTransform) -> Self {
        Self {
            transform,
            max_waypoints: DEFAULT_MAX_WAYPOINTS,
            smoothing_m: None,
        }
    }

    /// Upper bound on waypoints after simplification (at least 2).
    #[must_use]
    pub fn max_waypoints(mut self, max: usize) -> Self {
        self.max_waypoints = max;
        self
    }

    /// Smooth the simplified path with a cubic spline resampled every
    /// `interval_m` meters.
    #[must_use]
    pub fn smoothing(mut self, interval_m: Option<f64>) -> Self {
        self.smoothing_m = interval_m;
        self
    }

    /// Keeps the first cell, the last cell, and every cell where the
    /// step direction changes. Evenly drops cells by index if more than
    /// `max_waypoints` remain.
    pub fn simplify(&self, cells: &[Cell]) -> Vec<Cell> {
        let mut deduped = cells.to_vec();
        deduped.dedup();
        if deduped.len() <= 2 {
            return deduped;
        }

        let direction = |a: Cell, b: Cell| (b.row.cmp(&a.row), b.col.cmp(&a.col));
        let last = deduped.len() - 1;
        let mut turns = vec![deduped[0]];
        turns.extend(
            deduped
                .windows(3)
                .filter(|w| direction(w[0], w[1]) != direction(w[1], w[2]))
                .map(|w| w[1]),
        );
        turns.push(deduped[last]);

        let max = self.max_waypoints.max(2);
        if turns.len() <= max {
            return turns;
        }
        let len = turns.len();
        (0..max - 1)
            .map(|i| turns[i * len / max])
            .chain(std::iter::once(turns[len - 1]))
            .collect()
    }

    /// Simplifies, optionally smooths, and georeferences `cells`.
    ///
    /// The first and last waypoints are exactly `start` and `end`.
    pub fn process(
        &self,
        cells: &[Cell],
        start: Coord,
        end: Coord,
        attributes: &dyn CellAttributes,
    ) -> Result<Vec<Waypoint>, PathfindError> {
        if self.max_waypoints < 2 {
            return Err(PathfindError::Param("max_waypoints must be at least 2"));
        }
        if let Some(interval) = self.smoothing_m {
            if !(interval.is_finite() && interval > 0.0) {
                return Err(PathfindError::Param("smoothing interval must be positive"));
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let mut points: Vec<(f64, f64)> = self
            .simplify(cells)
            .into_iter()
            .map(|cell| (cell.row as f64 + 0.5, cell.col as f64 + 0.5))
            .collect();
        let (first, last) = (self.transform.to_raster(start), self.transform.to_raster(end));
        match points.len() {
            0 | 1 => points = vec![first, last],
            n => {
                points[0] = first;
                points[n - 1] = last;
            }
        }

        if let Some(interval) = self.smoothing_m {
            points = self.smooth(points, interval);
        }

        let last_idx = points.len() - 1;
        let mut waypoints = Vec::with_capacity(points.len());
        let mut distance_m = 0.0;
        let mut prev: Option<Point> = None;
        for (i, &(row, col)) in points.iter().enumerate() {
            let coord = match i {
                0 => start,
                _ if i == last_idx => end,
                _ => self.transform.to_geo_continuous(row, col),
            };
            let point = Point::from(coord);
            if let Some(prev) = prev {
                distance_m += prev.haversine_distance(&point);
            }
            prev = Some(point);
            let cell = self.transform.to_grid(coord);
            waypoints.push(Waypoint {
                lat: coord.y,
                lon: coord.x,
                elevation_m: attributes.elevation_m(cell),
                distance_m,
                terrain: attributes.terrain_label(cell),
            });
        }
        Ok(waypoints)
    }

    /// Fits a spline per axis over arc length and resamples it. Paths
    /// with fewer than three distinct points are returned unchanged.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn smooth(&self, original: Vec<(f64, f64)>, interval_m: f64) -> Vec<(f64, f64)> {
        let mut points = original.clone();
        points.dedup();
        if points.len() < 3 {
            return original;
        }

        let mut arc = vec![0.0];
        for pair in points.windows(2) {
            let step = (pair[1].0 - pair[0].0).hypot(pair[1].1 - pair[0].1);
            arc.push(arc[arc.len() - 1] + step);
        }
        let rows: Vec<f64> = points.iter().map(|p| p.0).collect();
        let cols: Vec<f64> = points.iter().map(|p| p.1).collect();
        let (Some(row_spline), Some(col_spline)) = (
            CubicSpline::natural(&arc, &rows),
            CubicSpline::natural(&arc, &cols),
        ) else {
            return original;
        };

        let total = arc[arc.len() - 1];
        let interval_cells = interval_m / self.transform.resolution_m();
        let segments = (total / interval_cells).ceil();
        if segments > MAX_SMOOTHED_SEGMENTS as f64 {
            warn!(
                "smoothing interval {interval_m} m needs {segments} segments, capped at {MAX_SMOOTHED_SEGMENTS}"
            );
        }
        let samples = (segments.min(MAX_SMOOTHED_SEGMENTS as f64) as usize + 1).max(2);
        debug!(
            "smoothing; knots: {}, length: {:.1} cells, samples: {}",
            points.len(),
            total,
            samples
        );
        linspace(0.0, total, samples)
            .map(|s| (row_spline.eval(s), col_spline.eval(s)))
            .collect()
    }
}

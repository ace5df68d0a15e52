use crate::{postprocess::Waypoint, variants::RouteKind};
use georaster::{Bounds, Cell};
use serde::{Deserialize, Serialize};

/// One navigable route between the requested endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub kind: RouteKind,
    pub name: String,
    pub waypoints: Vec<Waypoint>,

    /// `false` when the route is a straight-line fallback that may
    /// cross obstacles.
    pub path_clear: bool,

    /// Length along the waypoints in meters.
    pub distance_m: f64,

    /// Accumulated search cost: the mean per-meter cost of each step's
    /// cells times its length in cells (diagonals count sqrt 2).
    /// Unscaled by cell size, so only comparable within one plan.
    pub cost: f64,

    /// Walking time in seconds over the cost surface, or `None` when
    /// the route crosses impassable cells.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub estimated_time_s: Option<f64>,

    /// Grid cells the route passes through, before simplification.
    #[serde(skip)]
    pub cells: Vec<Cell>,
}

/// Every route produced for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub routes: Vec<Route>,

    /// Terrain data was unavailable and a flat surface was used.
    pub terrain_fallback: bool,

    /// Obstacle detection failed or was unusable, and was partly or
    /// fully ignored.
    pub detector_fallback: bool,

    /// Area actually planned over.
    pub bounds: Bounds,

    pub rows: usize,
    pub cols: usize,
}

impl RoutePlan {
    /// Returns the route of `kind`, if one was generated.
    pub fn route(&self, kind: RouteKind) -> Option<&Route> {
        self.routes.iter().find(|route| route.kind == kind)
    }
}

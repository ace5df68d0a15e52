//! # Terrain-aware route planning
//!
//! `pathfind` searches obstacle masks and terrain cost grids for
//! least-cost routes, generates flanking alternatives, and turns the
//! resulting cell paths into geographic waypoints.

pub mod astar;
mod error;
pub mod planner;
pub mod postprocess;
mod route;
mod spline;
pub mod variants;

pub use {
    crate::{
        astar::{CellPath, Connectivity, CostModel, GridPathfinder, RouteLeg},
        error::PathfindError,
        planner::Planner,
        postprocess::{CellAttributes, PathPostProcessor, Waypoint},
        route::{Route, RoutePlan},
        spline::CubicSpline,
        variants::{RawRoute, RouteKind, RouteVariantGenerator},
    },
    geo, georaster, terrain,
};

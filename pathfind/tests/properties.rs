use approx::assert_relative_eq;
use geo::{geometry::Coord, polygon};
use georaster::{Bounds, Cell, GeoTransform, Grid, ObstacleMask};
use pathfind::{
    Connectivity, GridPathfinder, PathPostProcessor, PathfindError, Planner, RouteKind,
    RouteVariantGenerator,
};
use std::f64::consts::SQRT_2;
use terrain::{
    landcover::esa, slope_cost, CostSurfaceConfig, ObstacleDetector, ObstacleInput, ObstacleMaskBuilder,
    TerrainError, TerrainRasters, TerrainSource,
};

/// 0.01 x 0.02 degree test area.
fn bounds() -> Bounds {
    Bounds::new(46.01, 46.0, 7.02, 7.0).unwrap()
}

/// Level grassland, 20 x 40 cells over whatever bounds are requested.
struct Meadow;

impl TerrainSource for Meadow {
    fn fetch(&self, bounds: &Bounds) -> Result<TerrainRasters, TerrainError> {
        Ok(TerrainRasters {
            elevation: Grid::filled(20, 40, 350.0)?,
            landcover: Grid::filled(20, 40, esa::GRASSLAND)?,
            transform: GeoTransform::from_bounds(bounds, 20, 40)?,
        })
    }
}

struct Offline;

impl TerrainSource for Offline {
    fn fetch(&self, _bounds: &Bounds) -> Result<TerrainRasters, TerrainError> {
        Err(TerrainError::Unavailable("tile server unreachable".to_string()))
    }
}

struct Broken;

impl ObstacleDetector for Broken {
    fn detect(&self, _: &Bounds, _: &GeoTransform) -> Result<ObstacleInput, TerrainError> {
        Err(TerrainError::Unavailable("model timed out".to_string()))
    }
}

struct Fixed(ObstacleInput);

impl ObstacleDetector for Fixed {
    fn detect(&self, _: &Bounds, _: &GeoTransform) -> Result<ObstacleInput, TerrainError> {
        Ok(self.0.clone())
    }
}

/// Encloses cell (9, 2) in a ring of obstacles two cells out.
struct Ring;

impl ObstacleDetector for Ring {
    fn detect(&self, _: &Bounds, xform: &GeoTransform) -> Result<ObstacleInput, TerrainError> {
        let center = Cell::new(9, 2);
        let mask = Grid::from_fn(xform.rows(), xform.cols(), |c| c.chebyshev(center) == 2)?;
        Ok(ObstacleInput::Mask(mask))
    }
}

fn west() -> Coord {
    Coord {
        x: 7.00112,
        y: 46.00526,
    }
}

fn east() -> Coord {
    Coord {
        x: 7.01888,
        y: 46.00526,
    }
}

fn open(rows: usize, cols: usize) -> ObstacleMask {
    Grid::filled(rows, cols, false).unwrap()
}

#[test]
fn uniform_diagonal_cost_is_sqrt2_per_step() {
    for n in [2, 5, 17] {
        let mask = open(n, n);
        let leg = GridPathfinder::new(&mask, Connectivity::Eight)
            .find_path(Cell::new(0, 0), Cell::new(n - 1, n - 1))
            .unwrap();
        assert!(leg.valid);
        assert_relative_eq!(leg.path.total_cost(), (n - 1) as f64 * SQRT_2, epsilon = 1e-9);
    }
}

#[test]
fn scenario_a_open_grid() {
    let mask = open(5, 5);
    let leg = GridPathfinder::new(&mask, Connectivity::Eight)
        .find_path(Cell::new(0, 0), Cell::new(4, 4))
        .unwrap();
    assert!(leg.valid);
    assert_eq!(leg.path.len(), 5);
    assert_relative_eq!(leg.path.total_cost(), 5.657, epsilon = 1e-3);
}

#[test]
fn scenario_b_single_gap() {
    let mut mask = open(5, 5);
    for col in [0, 1, 3, 4] {
        mask[Cell::new(2, col)] = true;
    }
    let leg = GridPathfinder::new(&mask, Connectivity::Eight)
        .find_path(Cell::new(0, 0), Cell::new(4, 4))
        .unwrap();
    assert!(leg.valid);
    assert!(leg.path.cells().contains(&Cell::new(2, 2)));
    assert!(leg.path.cells().iter().all(|&c| !mask[c]));
}

#[test]
fn scenario_c_start_snaps_to_only_clear_neighbor() {
    let mut mask = open(5, 5);
    for cell in [(2, 2), (1, 2), (3, 2), (2, 1)] {
        mask[Cell::from(cell)] = true;
    }
    let leg = GridPathfinder::new(&mask, Connectivity::Eight)
        .find_path(Cell::new(2, 2), Cell::new(4, 4))
        .unwrap();
    assert!(leg.valid);
    assert_eq!(leg.start, Cell::new(2, 3));
    assert_eq!(leg.path.cells()[0], Cell::new(2, 3));
}

#[test]
fn scenario_d_enclosed_start() {
    let mut mask = open(9, 9);
    for (cell, _) in open(9, 9).iter() {
        if cell.chebyshev(Cell::new(4, 4)) == 2 {
            mask[cell] = true;
        }
    }
    let leg = GridPathfinder::new(&mask, Connectivity::Eight)
        .find_path(Cell::new(4, 4), Cell::new(0, 8))
        .unwrap();
    assert!(!leg.valid);
    assert!(leg.path.len() >= 2);

    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .plan(&CostSurfaceConfig::default(), &Meadow, Some(&Ring))
        .unwrap();
    assert_eq!(plan.routes.len(), 3);
    for route in &plan.routes {
        assert!(!route.path_clear);
        assert!(route.waypoints.len() >= 2);
    }
}

#[test]
fn scenario_e_flanks_are_longer() {
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .plan(&CostSurfaceConfig::default(), &Meadow, None)
        .unwrap();
    assert_eq!(plan.routes.len(), 3);
    assert!(!plan.terrain_fallback && !plan.detector_fallback);
    let direct = plan.route(RouteKind::Direct).unwrap();
    let left = plan.route(RouteKind::LeftFlank).unwrap();
    let right = plan.route(RouteKind::RightFlank).unwrap();
    for route in &plan.routes {
        assert!(route.path_clear);
    }
    assert!(direct.distance_m <= left.distance_m);
    assert!(direct.distance_m <= right.distance_m);
    // Heading east, the left flank passes north of the right one.
    let max_lat = |r: &pathfind::Route| {
        r.waypoints
            .iter()
            .map(|w| w.lat)
            .fold(f64::NEG_INFINITY, f64::max)
    };
    assert!(max_lat(left) > max_lat(right));
}

#[test]
fn clear_routes_never_cross_obstacles() {
    let mut mask = open(30, 30);
    for (cell, _) in open(30, 30).iter() {
        if (cell.row * 7 + cell.col * 3) % 5 == 0 && cell.row % 4 != 0 {
            mask[cell] = true;
        }
    }
    let finder = GridPathfinder::new(&mask, Connectivity::Eight);
    let routes = RouteVariantGenerator::new(&finder)
        .generate(Cell::new(1, 1), Cell::new(28, 27), 3)
        .unwrap();
    for route in routes.iter().filter(|r| r.valid) {
        assert!(route.path.cells().iter().all(|&c| !mask[c]));
    }
}

#[test]
fn planned_routes_avoid_polygon_wall() {
    // North-south wall across the middle, open along the top rows.
    let wall = polygon![
        (x: 7.0098, y: 46.0),
        (x: 7.0102, y: 46.0),
        (x: 7.0102, y: 46.0085),
        (x: 7.0098, y: 46.0085),
        (x: 7.0098, y: 46.0),
    ];
    let input = ObstacleInput::Polygons(vec![wall]);
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .plan(&CostSurfaceConfig::default(), &Meadow, Some(&Fixed(input.clone())))
        .unwrap();

    let xform = GeoTransform::from_bounds(&plan.bounds, plan.rows, plan.cols).unwrap();
    let mask = ObstacleMaskBuilder::new().build(&input, &xform).unwrap().mask;
    assert!(mask.count_where(|&b| b) > 0);
    let direct = plan.route(RouteKind::Direct).unwrap();
    assert!(direct.path_clear);
    for route in plan.routes.iter().filter(|r| r.path_clear) {
        assert!(route.cells.iter().all(|&c| !mask[c]));
    }
}

#[test]
fn no_go_zones_apply_without_detections() {
    let wall = polygon![
        (x: 7.0098, y: 46.0),
        (x: 7.0102, y: 46.0),
        (x: 7.0102, y: 46.0085),
        (x: 7.0098, y: 46.0085),
        (x: 7.0098, y: 46.0),
    ];
    let planner = Planner::new().start(west()).end(east()).bounds(bounds());
    let nothing = Fixed(ObstacleInput::none());

    let unrestricted = planner
        .clone()
        .plan(&CostSurfaceConfig::default(), &Meadow, Some(&nothing))
        .unwrap();
    let restricted = planner
        .no_go_zones(vec![wall.clone()])
        .plan(&CostSurfaceConfig::default(), &Meadow, Some(&nothing))
        .unwrap();

    let xform = GeoTransform::from_bounds(&restricted.bounds, restricted.rows, restricted.cols)
        .unwrap();
    let zone = ObstacleMaskBuilder::new()
        .build(&ObstacleInput::Polygons(vec![wall]), &xform)
        .unwrap()
        .mask;
    let direct = |plan: &pathfind::RoutePlan| plan.route(RouteKind::Direct).unwrap().clone();
    assert!(direct(&unrestricted).cells.iter().any(|&c| zone[c]));
    assert!(direct(&restricted).path_clear);
    for route in restricted.routes.iter().filter(|r| r.path_clear) {
        assert!(route.cells.iter().all(|&c| !zone[c]));
    }
}

#[test]
fn estimated_time_follows_walking_speed() {
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .variants(1)
        .plan(&CostSurfaceConfig::default(), &Meadow, None)
        .unwrap();
    let route = &plan.routes[0];
    let per_m = slope_cost(0.0, CostSurfaceConfig::default().off_road_factor);
    let time_s = route.estimated_time_s.unwrap();
    assert_relative_eq!(time_s, route.distance_m * per_m, max_relative = 0.05);

    // Search cost counts cells, not meters.
    assert!(time_s > route.cost * 10.0);
}

#[test]
fn endpoints_pinned_after_smoothing() {
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .smoothing(Some(25.0))
        .plan(&CostSurfaceConfig::default(), &Meadow, Some(&Ring))
        .unwrap();
    for route in &plan.routes {
        let first = &route.waypoints[0];
        let last = &route.waypoints[route.waypoints.len() - 1];
        assert_eq!((first.lat, first.lon), (west().y, west().x));
        assert_eq!((last.lat, last.lon), (east().y, east().x));
        assert_eq!(first.elevation_m, Some(350.0));
        assert_eq!(first.terrain.as_deref(), Some("grassland"));
    }
}

#[test]
fn simplification_never_grows() {
    let xform = GeoTransform::from_bounds(&bounds(), 20, 40).unwrap();
    let post = PathPostProcessor::new(&xform);
    let mask = open(20, 40);
    let finder = GridPathfinder::new(&mask, Connectivity::Four);
    for end in [Cell::new(19, 39), Cell::new(0, 39), Cell::new(10, 3)] {
        let leg = finder.find_path(Cell::new(0, 0), end).unwrap();
        let simplified = post.simplify(leg.path.cells());
        assert!(simplified.len() <= leg.path.len());
        assert!(simplified.len() <= 15);
        assert_eq!(simplified.first(), leg.path.cells().first());
        assert_eq!(simplified.last(), leg.path.cells().last());
    }
}

#[test]
fn search_is_deterministic() {
    let mut mask = open(25, 25);
    for row in 3..22 {
        mask[Cell::new(row, 12)] = true;
    }
    let finder = GridPathfinder::new(&mask, Connectivity::Eight);
    let generator = RouteVariantGenerator::new(&finder);
    let first = generator.generate(Cell::new(12, 0), Cell::new(12, 24), 3).unwrap();
    for _ in 0..5 {
        assert_eq!(
            generator.generate(Cell::new(12, 0), Cell::new(12, 24), 3).unwrap(),
            first
        );
    }
}

#[test]
fn missing_terrain_uses_flat_surface() {
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .variants(1)
        .plan(&CostSurfaceConfig::default(), &Offline, None)
        .unwrap();
    assert!(plan.terrain_fallback);
    assert_eq!(plan.routes.len(), 1);
    let route = &plan.routes[0];
    assert!(route.path_clear);
    assert!(route.waypoints.iter().all(|w| w.elevation_m.is_none()));
}

#[test]
fn failed_detector_is_flagged() {
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .plan(&CostSurfaceConfig::default(), &Meadow, Some(&Broken))
        .unwrap();
    assert!(plan.detector_fallback);
    assert!(plan.routes.iter().all(|r| r.path_clear));
}

#[test]
fn oversized_area_is_limited() {
    let huge = Bounds::new(46.1, 45.9, 7.1, 6.9).unwrap();
    let center = huge.center();
    let plan = Planner::new()
        .start(Coord {
            x: center.x - 0.005,
            y: center.y + 0.001,
        })
        .end(Coord {
            x: center.x + 0.005,
            y: center.y - 0.001,
        })
        .bounds(huge)
        .variants(1)
        .plan(&CostSurfaceConfig::default(), &Meadow, None)
        .unwrap();
    assert_relative_eq!(plan.bounds.height(), 0.02, epsilon = 1e-9);
    assert_relative_eq!(plan.bounds.width(), 0.02, epsilon = 1e-9);
}

#[test]
fn planner_rejects_bad_requests() {
    let config = CostSurfaceConfig::default();
    assert_eq!(
        Planner::new().end(east()).plan(&config, &Meadow, None),
        Err(PathfindError::Builder("start"))
    );

    let far = Coord { x: 8.0, y: 46.005 };
    assert!(matches!(
        Planner::new()
            .start(west())
            .end(far)
            .bounds(bounds())
            .plan(&config, &Meadow, None),
        Err(PathfindError::OutsideArea { .. })
    ));

    let inverted = Bounds {
        north: 46.0,
        south: 46.01,
        east: 7.02,
        west: 7.0,
    };
    assert!(matches!(
        Planner::new()
            .start(west())
            .end(east())
            .bounds(inverted)
            .plan(&config, &Meadow, None),
        Err(PathfindError::Raster(_))
    ));
}

#[test]
fn plan_serializes() {
    let plan = Planner::new()
        .start(west())
        .end(east())
        .bounds(bounds())
        .variants(1)
        .plan(&CostSurfaceConfig::default(), &Meadow, None)
        .unwrap();
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["routes"][0]["kind"], "direct");
    assert_eq!(json["routes"][0]["path_clear"], true);
    assert!(json["routes"][0].get("cells").is_none());
    assert!(json["routes"][0]["estimated_time_s"].as_f64().unwrap() > 0.0);
}

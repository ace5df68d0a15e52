//! Self-contained terrain scenes loaded from JSON.

use anyhow::{anyhow, Error as AnyError};
use geo::geometry::{Coord, LineString, Polygon};
use georaster::{Bounds, Cell, GeoTransform, Grid};
use log::debug;
use serde::Deserialize;
use std::{fs, path::Path};
use terrain::{ObstacleDetector, ObstacleInput, TerrainError, TerrainRasters, TerrainSource};

/// On-disk layout. Rows run north to south.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneFile {
    bounds: Bounds,

    /// Meters above sea level, `null` where missing.
    elevation: Vec<Vec<Option<f64>>>,

    landcover: Vec<Vec<u8>>,

    #[serde(default)]
    obstacles: Option<SceneObstacles>,

    /// Exterior rings of `[lon, lat]` pairs routes must stay out of.
    #[serde(default)]
    no_go_zones: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SceneObstacles {
    /// Exterior rings of `[lon, lat]` pairs.
    Polygons(Vec<Vec<[f64; 2]>>),
    Mask(Vec<Vec<bool>>),
    Classified {
        obstacle: Vec<Vec<bool>>,
        traversable: Vec<Vec<bool>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Obstacles {
    Polygons(Vec<Polygon>),
    Mask(Grid<bool>),
    Classified {
        obstacle: Grid<bool>,
        traversable: Grid<bool>,
    },
}

/// Rasters and obstacles covering `bounds`, each grid spanning the
/// whole area at its own resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub bounds: Bounds,
    elevation: Grid<f64>,
    landcover: Grid<u8>,
    obstacles: Option<Obstacles>,
    pub no_go_zones: Vec<Polygon>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, AnyError> {
        let json = fs::read_to_string(path)
            .map_err(|e| anyhow!("reading {}: {e}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, AnyError> {
        let SceneFile {
            bounds,
            elevation,
            landcover,
            obstacles,
            no_go_zones,
        } = serde_json::from_str(json)?;
        bounds.validate()?;
        let elevation = Grid::from_rows(
            elevation
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                .collect(),
        )?;
        let landcover = Grid::from_rows(landcover)?;
        let obstacles = match obstacles {
            None => None,
            Some(SceneObstacles::Polygons(rings)) => Some(Obstacles::Polygons(
                rings.into_iter().map(polygon).collect(),
            )),
            Some(SceneObstacles::Mask(rows)) => Some(Obstacles::Mask(Grid::from_rows(rows)?)),
            Some(SceneObstacles::Classified {
                obstacle,
                traversable,
            }) => Some(Obstacles::Classified {
                obstacle: Grid::from_rows(obstacle)?,
                traversable: Grid::from_rows(traversable)?,
            }),
        };
        let no_go_zones: Vec<Polygon> = no_go_zones.into_iter().map(polygon).collect();
        debug!(
            "scene; bounds: {:?}, elevation: {:?}, landcover: {:?}, no-go zones: {}",
            bounds,
            elevation.dimensions(),
            landcover.dimensions(),
            no_go_zones.len()
        );
        Ok(Self {
            bounds,
            elevation,
            landcover,
            obstacles,
            no_go_zones,
        })
    }
}

/// Most sub-cells per axis a finer raster is sampled into.
const MAX_SUPERSAMPLE: usize = 8;

impl TerrainSource for Scene {
    fn fetch(&self, bounds: &Bounds) -> Result<TerrainRasters, TerrainError> {
        let (elevation, area) = crop(&self.elevation, &self.bounds, bounds)?;
        let transform = GeoTransform::from_bounds(&area, elevation.rows(), elevation.cols())?;
        let landcover = resample(&self.landcover, &self.bounds, &area, &transform)?;
        Ok(TerrainRasters {
            elevation,
            landcover,
            transform,
        })
    }
}

impl ObstacleDetector for Scene {
    fn detect(
        &self,
        bounds: &Bounds,
        transform: &GeoTransform,
    ) -> Result<ObstacleInput, TerrainError> {
        let input = match &self.obstacles {
            None => ObstacleInput::none(),
            Some(Obstacles::Polygons(polygons)) => ObstacleInput::Polygons(polygons.clone()),
            Some(Obstacles::Mask(mask)) => {
                ObstacleInput::Mask(resample(mask, &self.bounds, bounds, transform)?)
            }
            Some(Obstacles::Classified {
                obstacle,
                traversable,
            }) => ObstacleInput::Classified {
                obstacle: resample(obstacle, &self.bounds, bounds, transform)?,
                traversable: resample(traversable, &self.bounds, bounds, transform)?,
            },
        };
        Ok(input)
    }
}

fn polygon(ring: Vec<[f64; 2]>) -> Polygon {
    let exterior: Vec<Coord> = ring.into_iter().map(|[x, y]| Coord { x, y }).collect();
    Polygon::new(LineString::from(exterior), Vec::new())
}

/// Cuts the cells of `grid` (spanning `scene`) that cover `area`, and
/// returns them with their exact extent.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn crop<T: Clone>(
    grid: &Grid<T>,
    scene: &Bounds,
    area: &Bounds,
) -> Result<(Grid<T>, Bounds), TerrainError> {
    let (rows, cols) = grid.dimensions();
    let transform = GeoTransform::from_bounds(scene, rows, cols)?;
    let (top, left) = transform.to_raster(Coord {
        x: area.west,
        y: area.north,
    });
    let (bottom, right) = transform.to_raster(Coord {
        x: area.east,
        y: area.south,
    });
    let lo = |v: f64, len: usize| v.clamp(0.0, len as f64).floor() as usize;
    let hi = |v: f64, len: usize| v.clamp(0.0, len as f64).ceil() as usize;
    let (row0, row1) = (lo(top, rows), hi(bottom, rows));
    let (col0, col1) = (lo(left, cols), hi(right, cols));
    if row1 <= row0 || col1 <= col0 {
        return Err(TerrainError::Unavailable(format!(
            "{area:?} lies outside the scene"
        )));
    }

    let cropped = Grid::from_fn(row1 - row0, col1 - col0, |cell| {
        grid[Cell::new(cell.row + row0, cell.col + col0)].clone()
    })?;
    let nw = transform.to_geo_continuous(row0 as f64, col0 as f64);
    let se = transform.to_geo_continuous(row1 as f64, col1 as f64);
    Ok((cropped, Bounds::new(nw.y, se.y, se.x, nw.x)?))
}

/// Samples `grid` (spanning `scene`) at the cell centres of `target`
/// (spanning `area`). Each target cell is split into enough sub-cells to
/// keep every source cell it overlaps, up to `MAX_SUPERSAMPLE` per axis.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn resample<T: Clone>(
    grid: &Grid<T>,
    scene: &Bounds,
    area: &Bounds,
    target: &GeoTransform,
) -> Result<Grid<T>, TerrainError> {
    let source = GeoTransform::from_bounds(scene, grid.rows(), grid.cols())?;
    let (rows, cols) = target.dimensions();
    let factor = |dst: f64, src: f64| {
        ((dst / src) * (1.0 - 1e-9))
            .ceil()
            .clamp(1.0, MAX_SUPERSAMPLE as f64) as usize
    };
    let sub_rows = factor(
        area.height() / rows as f64,
        scene.height() / grid.rows() as f64,
    );
    let sub_cols = factor(area.width() / cols as f64, scene.width() / grid.cols() as f64);
    let sampled = GeoTransform::from_bounds(area, rows * sub_rows, cols * sub_cols)?;
    debug!(
        "resampling scene raster; from: {:?}, to: {:?}",
        grid.dimensions(),
        sampled.dimensions()
    );
    Ok(Grid::from_fn(sampled.rows(), sampled.cols(), |cell| {
        grid[source.to_grid(sampled.to_geo(cell))].clone()
    })?)
}

#[cfg(test)]
mod tests {
    use super::{crop, Scene};
    use geo::geometry::Coord;
    use georaster::{Bounds, Cell, GeoTransform, Grid};
    use pathfind::Planner;
    use terrain::{
        CostSurface, CostSurfaceConfig, ObstacleDetector, ObstacleInput, TerrainError,
        TerrainSource,
    };

    const SCENE: &str = r#"{
        "bounds": { "north": 1.0, "south": 0.0, "east": 2.0, "west": 0.0 },
        "elevation": [[10, 11, 12, 13], [20, null, 22, 23]],
        "landcover": [[30, 30], [80, 30]],
        "obstacles": { "polygons": [[[0.1, 0.1], [0.4, 0.1], [0.4, 0.4], [0.1, 0.1]]] }
    }"#;

    #[test]
    fn test_load_scene() {
        let scene = Scene::from_json(SCENE).unwrap();
        let bounds = scene.bounds;
        let rasters = scene.fetch(&bounds).unwrap();
        assert_eq!(rasters.elevation.dimensions(), (2, 4));
        assert_eq!(rasters.landcover.dimensions(), (2, 4));
        assert_eq!(rasters.landcover[Cell::new(1, 0)], 80);
        assert_eq!(rasters.landcover[Cell::new(1, 1)], 80);
        assert_eq!(rasters.landcover[Cell::new(1, 2)], 30);
        assert!(rasters.elevation[Cell::new(1, 1)].is_nan());
        assert_eq!(rasters.elevation[Cell::new(1, 3)], 23.0);

        let transform = rasters.transform;
        match scene.detect(&bounds, &transform).unwrap() {
            ObstacleInput::Polygons(polygons) => assert_eq!(polygons.len(), 1),
            other => panic!("unexpected obstacles {other:?}"),
        }
    }

    #[test]
    fn test_load_no_go_zones() {
        let scene = Scene::from_json(SCENE).unwrap();
        assert!(scene.no_go_zones.is_empty());

        let json = r#"{
            "bounds": { "north": 1.0, "south": 0.0, "east": 1.0, "west": 0.0 },
            "elevation": [[0]],
            "landcover": [[30]],
            "no_go_zones": [[[0.2, 0.2], [0.6, 0.2], [0.6, 0.6], [0.2, 0.2]]]
        }"#;
        let scene = Scene::from_json(json).unwrap();
        assert_eq!(scene.no_go_zones.len(), 1);
        assert_eq!(scene.no_go_zones[0].exterior().0.len(), 4);
    }

    #[test]
    fn test_reject_ragged_scene() {
        let json = r#"{
            "bounds": { "north": 1.0, "south": 0.0, "east": 1.0, "west": 0.0 },
            "elevation": [[1, 2], [3]],
            "landcover": [[30]]
        }"#;
        assert!(Scene::from_json(json).is_err());
    }

    #[test]
    fn test_crop_covers_area() {
        let grid = Grid::from_fn(4, 4, |cell| cell.row * 4 + cell.col).unwrap();
        let scene = Bounds::new(4.0, 0.0, 4.0, 0.0).unwrap();

        // Partial cells are kept whole.
        let area = Bounds::new(3.5, 1.5, 2.5, 0.5).unwrap();
        let (cropped, extent) = crop(&grid, &scene, &area).unwrap();
        assert_eq!(cropped.dimensions(), (3, 3));
        assert_eq!(cropped[Cell::new(0, 0)], 0);
        assert_eq!(extent, Bounds::new(4.0, 1.0, 3.0, 0.0).unwrap());

        let outside = Bounds::new(9.0, 8.0, 9.0, 8.0).unwrap();
        assert!(matches!(
            crop(&grid, &scene, &outside),
            Err(TerrainError::Unavailable(_))
        ));
    }

    #[test]
    fn test_coarse_landcover_follows_partial_request() {
        let json = r#"{
            "bounds": { "north": 1.0, "south": 0.0, "east": 4.0, "west": 0.0 },
            "elevation": [[0, 0, 0, 0]],
            "landcover": [[80, 30]]
        }"#;
        let scene = Scene::from_json(json).unwrap();
        let request = Bounds::new(1.0, 0.0, 4.0, 1.5).unwrap();
        let rasters = scene.fetch(&request).unwrap();
        assert_eq!(rasters.elevation.dimensions(), (1, 3));
        assert_eq!(
            rasters.landcover,
            Grid::from_rows(vec![vec![80, 30, 30]]).unwrap()
        );

        // The grass cell east of the water stays passable.
        let surface = CostSurface::builder()
            .rasters(&rasters)
            .build(&CostSurfaceConfig::default())
            .unwrap();
        let costs = surface.costs();
        assert!(costs[Cell::new(0, 0)].is_none());
        assert!(costs[Cell::new(0, 1)].is_some());
        assert!(costs[Cell::new(0, 2)].is_some());
    }

    #[test]
    fn test_detect_crops_mask() {
        let json = r#"{
            "bounds": { "north": 2.0, "south": 0.0, "east": 2.0, "west": 0.0 },
            "elevation": [[0, 0], [0, 0]],
            "landcover": [[30, 30], [30, 30]],
            "obstacles": { "mask": [[true, false], [false, false]] }
        }"#;
        let scene = Scene::from_json(json).unwrap();
        let north_half = Bounds::new(2.0, 1.0, 2.0, 0.0).unwrap();
        let transform = GeoTransform::from_bounds(&north_half, 1, 2).unwrap();
        match scene.detect(&north_half, &transform).unwrap() {
            ObstacleInput::Mask(mask) => {
                assert_eq!(mask, Grid::from_rows(vec![vec![true, false]]).unwrap());
            }
            other => panic!("unexpected obstacles {other:?}"),
        }
    }

    #[test]
    fn test_plan_bundled_scene() {
        let scene = Scene::from_json(include_str!("../scenes/valley.json")).unwrap();
        let plan = Planner::new()
            .start(Coord {
                x: 7.0015,
                y: 46.0015,
            })
            .end(Coord {
                x: 7.0145,
                y: 46.0105,
            })
            .bounds(scene.bounds)
            .plan(
                &CostSurfaceConfig::default(),
                &scene,
                Some(&scene as &dyn ObstacleDetector),
            )
            .unwrap();
        assert!(!plan.terrain_fallback);
        assert!(!plan.detector_fallback);
        assert_eq!((plan.rows, plan.cols), (24, 32));
        assert_eq!(plan.routes.len(), 3);
        for route in &plan.routes {
            assert!(route.path_clear, "{} is blocked", route.name);
            assert!(route.waypoints.iter().all(|w| w.elevation_m.is_some()));
        }
    }
}

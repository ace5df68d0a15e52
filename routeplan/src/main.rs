mod options;
mod scene;

use anyhow::Error as AnyError;
use clap::Parser;
use log::warn;
use options::{Cli, Command as CliCmd};
use pathfind::{
    terrain::{CostSurfaceConfig, DetectorPolicy, ObstacleDetector},
    Connectivity, Planner, Route, RoutePlan,
};
use scene::Scene;
use std::{fs, io::Write};
use textplots::{Chart, Plot, Shape};

fn main() -> Result<(), AnyError> {
    let Cli {
        scene,
        config,
        start,
        dest,
        variants,
        smooth,
        buffer,
        max_waypoints,
        max_slope_deg,
        four_connected,
        traversable_wins,
        cmd,
    } = Cli::parse();

    env_logger::init();

    let scene = Scene::load(&scene)?;
    let mut config: CostSurfaceConfig = match config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => CostSurfaceConfig::default(),
    };
    if let Some(degrees) = max_slope_deg {
        config = config.with_max_slope_degrees(degrees);
    }

    eprintln!(
        "start: {:?}, dest: {:?}, variants: {variants}, smooth: {smooth:?}, buffer: {buffer}",
        start.0, dest.0
    );

    let plan = Planner::new()
        .start(start.0)
        .end(dest.0)
        .bounds(scene.bounds)
        .no_go_zones(scene.no_go_zones.clone())
        .variants(variants)
        .connectivity(if four_connected {
            Connectivity::Four
        } else {
            Connectivity::Eight
        })
        .smoothing(smooth)
        .max_waypoints(max_waypoints)
        .buffer(buffer)
        .policy(if traversable_wins {
            DetectorPolicy::TraversableWins
        } else {
            DetectorPolicy::ObstacleWins
        })
        .plan(&config, &scene, Some(&scene as &dyn ObstacleDetector))?;

    for route in plan.routes.iter().filter(|route| !route.path_clear) {
        warn!("{} could not avoid all obstacles", route.name);
    }

    match cmd {
        CliCmd::Csv => print_csv(&plan)?,
        CliCmd::Json => print_json(&plan)?,
        CliCmd::Plot => plot_ascii(&plan),
    };
    Ok(())
}

/// # Example with gnuplot
///
/// ```sh
/// cargo run -- --scene=routeplan/scenes/valley.json --start=46.0015,7.0015 --dest=46.0105,7.0145 csv | grep Direct | tr ',' ' ' > ~/.tmp/route && gnuplot -p -e "plot '~/.tmp/route' using 2:5 with lines"
/// ```
fn print_csv(plan: &RoutePlan) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Route,Distance,Latitude,Longitude,Elevation,Terrain")?;
    for route in &plan.routes {
        let name = route.name.replace(' ', "");
        for waypoint in &route.waypoints {
            let distance = waypoint.distance_m;
            let latitude = waypoint.lat;
            let longitude = waypoint.lon;
            let elevation = waypoint
                .elevation_m
                .map(|elev| elev.to_string())
                .unwrap_or_default();
            let terrain = waypoint.terrain.as_deref().unwrap_or_default();
            writeln!(
                stdout,
                "{name},{distance},{latitude},{longitude},{elevation},{terrain}",
            )?;
        }
    }
    Ok(())
}

fn print_json(plan: &RoutePlan) -> Result<(), AnyError> {
    let json = serde_json::to_string(plan)?;
    println!("{json}");
    Ok(())
}

/// Elevation against distance, one chart per route.
#[allow(clippy::cast_possible_truncation)]
fn plot_ascii(plan: &RoutePlan) {
    let x_max = plan
        .routes
        .iter()
        .map(|route| route.distance_m as f32)
        .fold(1.0, f32::max);

    for route in &plan.routes {
        println!(
            "{}: {:.0} m, {}, {} waypoints{}",
            route.name,
            route.distance_m,
            route
                .estimated_time_s
                .map_or_else(|| "time unknown".to_string(), |s| format!("{:.0} min", s / 60.0)),
            route.waypoints.len(),
            if route.path_clear { "" } else { " (blocked)" }
        );
        let profile = elevation_profile(route);
        if profile.is_empty() {
            println!("  no elevation along route");
            continue;
        }
        Chart::new(300, 150, 0.0, x_max)
            .lineplot(&Shape::Lines(&profile))
            .display();
    }
}

/// `(distance, elevation)` of the waypoints with known elevation.
#[allow(clippy::cast_possible_truncation)]
fn elevation_profile(route: &Route) -> Vec<(f32, f32)> {
    route
        .waypoints
        .iter()
        .filter_map(|w| w.elevation_m.map(|elev| (w.distance_m as f32, elev as f32)))
        .collect()
}

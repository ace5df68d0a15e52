use anyhow::{anyhow, Error as AnyError};
use clap::{Parser, Subcommand};
use geo::geometry::Coord;
use std::{path::PathBuf, str::FromStr};

/// Plan terrain-aware routes between two points of a scene.
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// JSON scene with elevation, land cover and obstacles.
    #[arg(short, long)]
    pub scene: PathBuf,

    /// JSON cost model parameters (defaults to walking over ESA
    /// WorldCover classes).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Start "lat,lon".
    #[arg(long)]
    pub start: LatLon,

    /// Destination "lat,lon".
    #[arg(long)]
    pub dest: LatLon,

    /// Number of routes to generate, 1 to 3.
    #[arg(short, long, default_value_t = 3)]
    pub variants: usize,

    /// Resample routes along a spline every this many meters.
    #[arg(long)]
    pub smooth: Option<f64>,

    /// Keep at least this many meters away from obstacles.
    #[arg(short, long, default_value_t = 0.0)]
    pub buffer: f64,

    /// Most waypoints kept per route before smoothing.
    #[arg(short, long, default_value_t = 15)]
    pub max_waypoints: usize,

    /// Steepest climbable slope in degrees, overrides the config.
    #[arg(long)]
    pub max_slope_deg: Option<f64>,

    /// Only move between edge-adjacent cells.
    #[arg(long, default_value_t = false)]
    pub four_connected: bool,

    /// Cells classified both obstacle and traversable are clear.
    #[arg(long, default_value_t = false)]
    pub traversable_wins: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct LatLon(pub Coord<f64>);

impl FromStr for LatLon {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_str, lon_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lon"))?;
        let lat = f64::from_str(lat_str.trim())?;
        let lon = f64::from_str(lon_str.trim())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(anyhow!("{lat},{lon} is not on the globe"));
        }
        Ok(Self(Coord { y: lat, x: lon }))
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print waypoints to stdout.
    Csv,

    /// Print the route plan as JSON to stdout.
    Json,

    /// Plot elevation profiles to terminal.
    Plot,
}

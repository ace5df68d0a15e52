/// Mean earth radius in meters, as used by haversine distances.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Length of one degree of latitude (or of longitude at the equator)
/// in meters.
pub const METERS_PER_DEGREE: f64 = MEAN_EARTH_RADIUS * std::f64::consts::PI / 180.0;

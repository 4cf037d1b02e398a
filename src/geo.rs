//! Geographic primitives: points, rectangles and great-circle distance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Mean Earth radius used for all distance calculations, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            round_to(self.latitude, 4),
            round_to(self.longitude, 4)
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GeoParseError {
    #[error("expected \"latitude,longitude\", got {0:?}")]
    Shape(String),
    #[error("invalid coordinate {0:?}")]
    Number(String),
}

impl FromStr for GeoPoint {
    type Err = GeoParseError;

    /// Parses the persisted `latitude,longitude` form.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(',').filter(|p| !p.is_empty()).collect();
        if parts.len() != 2 {
            return Err(GeoParseError::Shape(raw.to_string()));
        }
        let latitude = parts[0]
            .trim()
            .parse::<f64>()
            .map_err(|_| GeoParseError::Number(parts[0].to_string()))?;
        let longitude = parts[1]
            .trim()
            .parse::<f64>()
            .map_err(|_| GeoParseError::Number(parts[1].to_string()))?;
        Ok(GeoPoint::new(latitude, longitude))
    }
}

/// Rectangle defined by its upper-left and lower-right corners, bounds
/// inclusive. Latitudes may come in either order. Longitude runs eastward
/// from the upper-left corner, so a rectangle whose upper-left longitude is
/// greater than its lower-right one crosses the 180th meridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub upper_left: GeoPoint,
    pub lower_right: GeoPoint,
}

impl GeoRect {
    pub const fn new(upper_left: GeoPoint, lower_right: GeoPoint) -> Self {
        Self {
            upper_left,
            lower_right,
        }
    }

    /// Rectangle covering the entire globe.
    pub const fn world() -> Self {
        Self::new(GeoPoint::new(90.0, -180.0), GeoPoint::new(-90.0, 180.0))
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        let (lat_min, lat_max) = min_max(self.upper_left.latitude, self.lower_right.latitude);
        if point.latitude < lat_min || point.latitude > lat_max {
            return false;
        }
        let west = self.upper_left.longitude;
        let east = self.lower_right.longitude;
        if west <= east {
            point.longitude >= west && point.longitude <= east
        } else {
            point.longitude >= west || point.longitude <= east
        }
    }

    /// True if the rectangle spans the 180th meridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.upper_left.longitude > self.lower_right.longitude
    }
}

/// Haversine distance between two points, in kilometers.
///
/// Symmetric and zero for identical points. One degree along the equator is
/// roughly 111.19 km.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Clamp guards against rounding pushing `a` past 1.0 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

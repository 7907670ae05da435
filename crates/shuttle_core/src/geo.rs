//! Spherical geometry on WGS-84 degree coordinates.
//!
//! All distances are great-circle distances on a sphere of radius
//! [`EARTH_RADIUS_M`]. This is accurate to a few tenths of a percent at city
//! scale, which is far below the step size the simulator moves in.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in degrees.
///
/// Fields are public so points can be read and deserialized freely, which
/// means a literal or a decoded payload may hold out-of-range values.
/// [`GeoPoint::new`] checks on construction; [`GeoPoint::is_valid`] is the
/// gate for points from anywhere else (oracle geometry goes through it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Checked constructor enforcing `-90 ≤ lat ≤ 90` and `-180 ≤ lng ≤ 180`.
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(GeoError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Builds a point from radians, wrapping longitude back into range.
    fn from_radians(lat: f64, lng: f64) -> Self {
        let mut lng_deg = lng.to_degrees();
        if !(-180.0..=180.0).contains(&lng_deg) {
            lng_deg = (lng_deg + 540.0).rem_euclid(360.0) - 180.0;
        }
        Self {
            lat: lat.to_degrees().clamp(-90.0, 90.0),
            lng: lng_deg,
        }
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.lat, self.lng).is_ok()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Haversine great-circle distance in metres.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let sin_dlat = ((b.lat - a.lat).to_radians() * 0.5).sin();
    let sin_dlng = ((b.lng - a.lng).to_radians() * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from `a` to `b`, in radians within `(-π, π]`.
///
/// Returns `0.0` when the points coincide.
pub fn bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    if a == b {
        return 0.0;
    }
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    let theta = y.atan2(x);
    // atan2 yields [-π, π]; fold -π onto π.
    if theta <= -PI {
        PI
    } else {
        theta
    }
}

/// Point reached after travelling `meters` from `origin` along the great
/// circle with initial `bearing` (radians).
pub fn destination(origin: GeoPoint, bearing: f64, meters: f64) -> GeoPoint {
    let lat1 = origin.lat.to_radians();
    let lng1 = origin.lng.to_radians();
    let angular = meters / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lng2 = lng1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::from_radians(lat2, lng2)
}

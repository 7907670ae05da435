//! OSRM `/route` client used as the network-backed [`RouteOracle`].
//!
//! Wraps a blocking HTTP client; callers on an async runtime must invoke it
//! from a blocking worker (the controller uses `spawn_blocking`).

mod client;
mod parser;
mod response;


pub use client::OsrmRouteOracle;

use super::{OracleError, RouteOracle, Waypoints};
use crate::geo::GeoPoint;

impl RouteOracle for OsrmRouteOracle {
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        self.fetch_route(waypoints)
    }
}

//! Route oracles: turn an ordered list of waypoints into a drivable polyline.
//!
//! Providers, selectable via [`RouteOracleKind`]:
//!
//! - **`StraightLineOracle`**: joins the waypoints with straight segments. Zero dependencies.
//! - **`OsrmRouteOracle`** (feature `osrm`): calls an OSRM `/route` HTTP endpoint.
//!
//! Network-backed providers are wrapped in [`CachedRouteOracle`]. The simulator
//! never talks to an oracle directly; it goes through [`RouteResolver`], which
//! degrades to a straight line whenever the oracle fails.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Ordered waypoints handed to an oracle; never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoints(Vec<GeoPoint>);

impl Waypoints {
    /// Starting point followed by the remaining stops in visiting order.
    pub fn new(origin: GeoPoint, rest: impl IntoIterator<Item = GeoPoint>) -> Self {
        let mut points = vec![origin];
        points.extend(rest);
        Self(points)
    }

    pub fn as_slice(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Path geometry to walk; always holds at least one point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePolyline(Vec<GeoPoint>);

impl RoutePolyline {
    pub fn new(points: Vec<GeoPoint>) -> Option<Self> {
        (!points.is_empty()).then_some(Self(points))
    }

    /// Straight segments through the waypoints, in order.
    pub fn straight_line(waypoints: &Waypoints) -> Self {
        Self(waypoints.0.clone())
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> GeoPoint {
        self.0[0]
    }
}

/// Reasons an oracle could not produce a route.
#[derive(Debug, Error)]
pub enum OracleError {
    #[cfg(feature = "osrm")]
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[cfg(feature = "osrm")]
    #[error("routing request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[cfg(feature = "osrm")]
    #[error("routing response was not valid JSON: {0}")]
    Json(#[source] reqwest::Error),

    #[error("routing service answered {0}")]
    Api(String),

    #[error("routing service returned no route")]
    NoRoute,

    #[error("malformed route geometry: {0}")]
    Malformed(String),

    #[error("no routing oracle configured")]
    Unavailable,
}

/// Routing backend. Implementations must be `Send + Sync` so one oracle can be
/// shared by every simulation and called from blocking worker threads.
pub trait RouteOracle: Send + Sync {
    /// Driving path through `waypoints` in order, as `(lat, lng)` points.
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError>;
}

impl<T: RouteOracle + ?Sized> RouteOracle for Arc<T> {
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        (**self).route(waypoints)
    }
}

impl<T: RouteOracle + ?Sized> RouteOracle for Box<T> {
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        (**self).route(waypoints)
    }
}

/// Which routing backend to use. Part of [`crate::config::SimulationConfig`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteOracleKind {
    /// Straight segments between waypoints, no external service.
    #[default]
    StraightLine,
    /// OSRM HTTP endpoint (e.g. `"https://router.project-osrm.org"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

// ---------------------------------------------------------------------------
// Straight-line provider (always available)
// ---------------------------------------------------------------------------

/// Returns the waypoints themselves as the route.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineOracle;

impl RouteOracle for StraightLineOracle {
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        Ok(waypoints.as_slice().to_vec())
    }
}

// ---------------------------------------------------------------------------
// OSRM provider (behind `osrm` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "osrm")]
pub mod osrm;

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

type WaypointKey = Vec<(u64, u64)>;

fn waypoint_key(waypoints: &Waypoints) -> WaypointKey {
    waypoints
        .as_slice()
        .iter()
        .map(|p| (p.lat.to_bits(), p.lng.to_bits()))
        .collect()
}

/// LRU-cached wrapper around any [`RouteOracle`].
///
/// Keyed by the exact waypoint sequence. Only successful routes are cached;
/// failures are retried on the next call.
pub struct CachedRouteOracle {
    inner: Box<dyn RouteOracle>,
    cache: Mutex<LruCache<WaypointKey, Vec<GeoPoint>>>,
}

impl CachedRouteOracle {
    pub fn new(inner: Box<dyn RouteOracle>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cached_routes(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl RouteOracle for CachedRouteOracle {
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        let key = waypoint_key(waypoints);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let route = self.inner.route(waypoints)?;

        // Poisoned mutex: skip caching, the route is still good.
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, route.clone());
        }
        Ok(route)
    }
}

// ---------------------------------------------------------------------------
// Factory: build an oracle from RouteOracleKind
// ---------------------------------------------------------------------------

/// Default route cache capacity for network-backed oracles.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 1_000;

/// Construct a shared [`RouteOracle`] from a [`RouteOracleKind`] descriptor.
///
/// - `StraightLine` is returned without caching.
/// - `Osrm` is wrapped in a [`CachedRouteOracle`]. If the HTTP client cannot
///   be built the straight-line oracle is used instead.
#[cfg_attr(not(feature = "osrm"), allow(unused_variables))]
pub fn build_route_oracle(kind: &RouteOracleKind, cache_capacity: usize) -> Arc<dyn RouteOracle> {
    match kind {
        RouteOracleKind::StraightLine => Arc::new(StraightLineOracle),

        #[cfg(feature = "osrm")]
        RouteOracleKind::Osrm { endpoint } => match osrm::OsrmRouteOracle::new(endpoint) {
            Ok(oracle) => Arc::new(CachedRouteOracle::new(Box::new(oracle), cache_capacity)),
            Err(err) => {
                tracing::warn!(%endpoint, error = %err, "OSRM client unavailable, using straight-line routes");
                Arc::new(StraightLineOracle)
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Resolver: the adapter the simulator uses
// ---------------------------------------------------------------------------

/// Resolves waypoints to a polyline, falling back to straight segments.
///
/// Failures are only visible as a `warn` log line; the caller always gets a
/// non-empty polyline.
#[derive(Clone, Default)]
pub struct RouteResolver {
    oracle: Option<Arc<dyn RouteOracle>>,
}

impl RouteResolver {
    pub fn new(oracle: Arc<dyn RouteOracle>) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    /// Resolver with no oracle; every route is a straight line.
    pub fn without_oracle() -> Self {
        Self { oracle: None }
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn resolve(&self, waypoints: &Waypoints) -> RoutePolyline {
        let Some(oracle) = &self.oracle else {
            return RoutePolyline::straight_line(waypoints);
        };

        match oracle.route(waypoints).and_then(validate_geometry) {
            Ok(polyline) => polyline,
            Err(err) => {
                tracing::warn!(
                    waypoints = waypoints.len(),
                    error = %err,
                    "route oracle failed, falling back to straight-line route"
                );
                RoutePolyline::straight_line(waypoints)
            }
        }
    }
}

impl std::fmt::Debug for RouteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResolver")
            .field("has_oracle", &self.oracle.is_some())
            .finish()
    }
}

fn validate_geometry(points: Vec<GeoPoint>) -> Result<RoutePolyline, OracleError> {
    if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
        return Err(OracleError::Malformed(format!("coordinate {bad} out of range")));
    }
    RoutePolyline::new(points).ok_or(OracleError::NoRoute)
}

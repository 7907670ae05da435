//! Test helpers for common test setup and utilities.
//!
//! Shared fixtures for unit tests, integration tests and benches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::events::{ArrivalCause, CompletionReason, SimulationEvent, SimulationListener, StopDistance};
use crate::geo::GeoPoint;
use crate::render::{MarkerId, MarkerStyle, RenderSink};
use crate::routing::{OracleError, RouteOracle, Waypoints};
use crate::stops::{Passenger, PassengerId, PassengerStatus, Stop};

/// Depot used as the vehicle's starting point across tests.
pub const TEST_ORIGIN: (f64, f64) = (-26.005, 28.003_888_9);

/// # Panics
///
/// Panics if the coordinates are out of range.
pub fn point(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng).expect("test coordinates should be valid")
}

pub fn test_origin() -> GeoPoint {
    point(TEST_ORIGIN.0, TEST_ORIGIN.1)
}

pub fn test_passenger(id: &str, pickup: GeoPoint, dropoff: GeoPoint) -> Passenger {
    Passenger {
        id: PassengerId(id.to_string()),
        name: format!("Passenger {id}"),
        pickup,
        dropoff,
        status: PassengerStatus::Ready,
    }
}

/// Three riders within a couple of kilometres of [`TEST_ORIGIN`], one of
/// them absent.
pub fn sample_passengers() -> Vec<Passenger> {
    let (lat, lng) = TEST_ORIGIN;
    let mut absent = test_passenger("p3", point(lat + 0.004, lng), point(lat - 0.010, lng));
    absent.status = PassengerStatus::Absent;
    vec![
        test_passenger("p1", point(lat + 0.002, lng + 0.001), point(lat + 0.012, lng + 0.006)),
        test_passenger("p2", point(lat - 0.003, lng + 0.002), point(lat + 0.009, lng - 0.004)),
        absent,
    ]
}

/// Oracle that always fails, for exercising the straight-line fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingOracle;

impl RouteOracle for FailingOracle {
    fn route(&self, _waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        Err(OracleError::Unavailable)
    }
}

/// Oracle returning a fixed geometry regardless of the request.
#[derive(Debug, Clone)]
pub struct FixedOracle(pub Vec<GeoPoint>);

impl RouteOracle for FixedOracle {
    fn route(&self, _waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        Ok(self.0.clone())
    }
}

/// Listener that rebuilds the event feed into a shared log.
///
/// Clones share the log, so one copy can move into a spawned simulation while
/// the test keeps the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn arrivals(&self) -> Vec<Stop> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SimulationEvent::StopArrived { stop, .. } => Some(stop),
                _ => None,
            })
            .collect()
    }

    pub fn completion(&self) -> Option<CompletionReason> {
        self.events().into_iter().find_map(|event| match event {
            SimulationEvent::Completed { reason } => Some(reason),
            _ => None,
        })
    }

    fn push(&self, event: SimulationEvent) {
        if let Ok(mut log) = self.events.lock() {
            log.push(event);
        }
    }
}

impl SimulationListener for RecordingListener {
    fn on_position_update(&mut self, position: GeoPoint, distances: &[StopDistance]) {
        self.push(SimulationEvent::PositionUpdated {
            position,
            distances: distances.to_vec(),
        });
    }

    fn on_stop_arrived(&mut self, stop: &Stop, cause: ArrivalCause) {
        self.push(SimulationEvent::StopArrived {
            stop: stop.clone(),
            cause,
        });
    }

    fn on_simulation_complete(&mut self, reason: CompletionReason) {
        self.push(SimulationEvent::Completed { reason });
    }
}

/// What a [`RecordingSink`] currently shows.
#[derive(Debug, Default, Clone)]
pub struct MapSnapshot {
    pub markers: HashMap<MarkerId, (GeoPoint, MarkerStyle)>,
    pub polyline: Vec<GeoPoint>,
    pub fit_count: usize,
}

/// In-memory map whose state stays readable after the sink moves into a task.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    map: Arc<Mutex<MapSnapshot>>,
}

impl RecordingSink {
    pub fn snapshot(&self) -> MapSnapshot {
        self.map.lock().map(|map| map.clone()).unwrap_or_default()
    }

    fn with_map(&self, f: impl FnOnce(&mut MapSnapshot)) {
        if let Ok(mut map) = self.map.lock() {
            f(&mut map);
        }
    }
}

impl RenderSink for RecordingSink {
    fn upsert_marker(&mut self, id: &MarkerId, point: GeoPoint, style: &MarkerStyle) {
        self.with_map(|map| {
            map.markers.insert(id.clone(), (point, style.clone()));
        });
    }

    fn remove_marker(&mut self, id: &MarkerId) {
        self.with_map(|map| {
            map.markers.remove(id);
        });
    }

    fn set_polyline(&mut self, points: &[GeoPoint]) {
        self.with_map(|map| map.polyline = points.to_vec());
    }

    fn fit_bounds(&mut self, _points: &[GeoPoint]) {
        self.with_map(|map| map.fit_count += 1);
    }
}

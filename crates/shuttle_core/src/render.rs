//! Map output: the simulator's feed translated into marker/polyline calls.
//!
//! [`RenderSink`] is whatever draws the map. [`MapPresenter`] is a downstream
//! subscriber that reads events and simulator snapshots and writes to the
//! sink; nothing flows back from the sink into the simulation.

use std::collections::HashMap;

use crate::events::SimulationEvent;
use crate::geo::GeoPoint;
use crate::simulator::PositionSimulator;
use crate::stops::{Passenger, PassengerId, PassengerStatus, StopKey, StopKind, StopList};

pub const VEHICLE_COLOR: &str = "#0066cc";
pub const DROPOFF_COLOR: &str = "#fd00b6";
const VEHICLE_RADIUS: u8 = 10;
const STOP_RADIUS: u8 = 8;

/// Pickup marker colour by passenger readiness.
pub fn status_color(status: PassengerStatus) -> &'static str {
    match status {
        PassengerStatus::Ready => "#10b981",
        PassengerStatus::NotReady => "#f59e0b",
        PassengerStatus::Absent => "#ef4444",
        PassengerStatus::Unset => "#6b7280",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerId {
    Vehicle,
    Stop(StopKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub radius: u8,
    /// Visiting order within the stop's kind, shown on the marker.
    pub label: Option<u32>,
    pub popup: String,
}

/// A map widget or anything else that can show markers and a route line.
pub trait RenderSink: Send {
    fn upsert_marker(&mut self, id: &MarkerId, point: GeoPoint, style: &MarkerStyle);

    fn remove_marker(&mut self, id: &MarkerId);

    fn set_polyline(&mut self, points: &[GeoPoint]);

    fn fit_bounds(&mut self, points: &[GeoPoint]);
}

/// Draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn upsert_marker(&mut self, _: &MarkerId, _: GeoPoint, _: &MarkerStyle) {}

    fn remove_marker(&mut self, _: &MarkerId) {}

    fn set_polyline(&mut self, _: &[GeoPoint]) {}

    fn fit_bounds(&mut self, _: &[GeoPoint]) {}
}

#[derive(Debug, Clone)]
struct StopMarker {
    point: GeoPoint,
    color: &'static str,
    label: u32,
    title: String,
    kind: StopKind,
}

/// Keeps the map in sync with one simulation run.
#[derive(Debug, Clone)]
pub struct MapPresenter {
    vehicle_title: String,
    markers: HashMap<StopKey, StopMarker>,
}

impl MapPresenter {
    /// Prepares numbered, coloured markers for `stops`. Passenger names and
    /// statuses come from `passengers` when known.
    pub fn new(vehicle_title: impl Into<String>, stops: &StopList, passengers: &[Passenger]) -> Self {
        let by_id: HashMap<&PassengerId, &Passenger> =
            passengers.iter().map(|p| (&p.id, p)).collect();

        let (mut pickups, mut dropoffs) = (0, 0);
        let markers = stops
            .iter()
            .map(|stop| {
                let passenger = by_id.get(&stop.owner);
                let (color, label) = match stop.kind {
                    StopKind::Pickup => {
                        pickups += 1;
                        let status = passenger.map_or(PassengerStatus::Unset, |p| p.status);
                        (status_color(status), pickups)
                    }
                    StopKind::Dropoff => {
                        dropoffs += 1;
                        (DROPOFF_COLOR, dropoffs)
                    }
                };
                let title = passenger.map_or_else(|| stop.owner.to_string(), |p| p.name.clone());
                let marker = StopMarker {
                    point: stop.point,
                    color,
                    label,
                    title,
                    kind: stop.kind,
                };
                (stop.key(), marker)
            })
            .collect();

        Self {
            vehicle_title: vehicle_title.into(),
            markers,
        }
    }

    /// Places the vehicle and every stop, then frames them.
    pub fn draw_initial(&self, sink: &mut dyn RenderSink, vehicle: GeoPoint) {
        sink.upsert_marker(&MarkerId::Vehicle, vehicle, &self.vehicle_style());
        let mut frame = vec![vehicle];
        for (key, marker) in &self.markers {
            sink.upsert_marker(
                &MarkerId::Stop(key.clone()),
                marker.point,
                &marker.style(None),
            );
            frame.push(marker.point);
        }
        sink.fit_bounds(&frame);
    }

    /// Applies one batch of simulator output to the map.
    pub fn render(
        &mut self,
        sink: &mut dyn RenderSink,
        events: &[SimulationEvent],
        simulator: &PositionSimulator,
    ) {
        for event in events {
            match event {
                SimulationEvent::PositionUpdated {
                    position,
                    distances,
                } => {
                    sink.upsert_marker(&MarkerId::Vehicle, *position, &self.vehicle_style());
                    for entry in distances {
                        if let Some(marker) = self.markers.get(&entry.stop) {
                            sink.upsert_marker(
                                &MarkerId::Stop(entry.stop.clone()),
                                marker.point,
                                &marker.style(Some(entry.meters)),
                            );
                        }
                    }
                }
                SimulationEvent::StopArrived { stop, .. } => {
                    let key = stop.key();
                    self.markers.remove(&key);
                    sink.remove_marker(&MarkerId::Stop(key));
                    sink.upsert_marker(&MarkerId::Vehicle, stop.point, &self.vehicle_style());
                }
                SimulationEvent::Completed { .. } => sink.set_polyline(&[]),
            }
        }

        // While a new route is being fetched the old geometry is stale.
        let Some(state) = simulator.state().filter(|_| simulator.is_running()) else {
            return;
        };
        sink.set_polyline(&state.remaining_polyline());
        let mut frame = vec![state.vehicle()];
        frame.extend(simulator.remaining_stops().iter().map(|stop| stop.point));
        sink.fit_bounds(&frame);
    }

    fn vehicle_style(&self) -> MarkerStyle {
        MarkerStyle {
            color: VEHICLE_COLOR,
            radius: VEHICLE_RADIUS,
            label: None,
            popup: self.vehicle_title.clone(),
        }
    }
}

impl StopMarker {
    fn style(&self, distance_m: Option<f64>) -> MarkerStyle {
        let mut popup = format!("{} · {} #{}", self.title, self.kind, self.label);
        if let Some(meters) = distance_m {
            popup.push_str(&format!(" · {:.0} m", meters));
        }
        MarkerStyle {
            color: self.color,
            radius: STOP_RADIUS,
            label: Some(self.label),
            popup,
        }
    }
}

//! Live feed emitted by the simulator.
//!
//! Events are plain data. Consumers (map, distance displays) subscribe through
//! [`SimulationListener`] and never feed anything back into the simulation.

use serde::Serialize;

use crate::geo::GeoPoint;
use crate::stops::{Stop, StopKey};

/// Distance from the vehicle to one remaining stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopDistance {
    pub stop: StopKey,
    pub meters: f64,
}

/// How a stop came to be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalCause {
    /// The vehicle came within the arrival radius.
    Proximity,
    /// Confirmed by hand (e.g. a driver marking a passenger as picked up).
    Manual,
}

/// Why the simulation went idle on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    AllStopsVisited,
    /// The polyline ran out before the remaining stops were reached.
    RouteExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    PositionUpdated {
        position: GeoPoint,
        distances: Vec<StopDistance>,
    },
    StopArrived {
        stop: Stop,
        cause: ArrivalCause,
    },
    Completed {
        reason: CompletionReason,
    },
}

/// Receiver for the simulation feed. All methods default to no-ops.
pub trait SimulationListener: Send {
    fn on_position_update(&mut self, _position: GeoPoint, _distances: &[StopDistance]) {}

    fn on_stop_arrived(&mut self, _stop: &Stop, _cause: ArrivalCause) {}

    fn on_simulation_complete(&mut self, _reason: CompletionReason) {}
}

/// Routes each event to the matching listener callback.
pub fn dispatch<L: SimulationListener + ?Sized>(listener: &mut L, events: &[SimulationEvent]) {
    for event in events {
        match event {
            SimulationEvent::PositionUpdated {
                position,
                distances,
            } => listener.on_position_update(*position, distances),
            SimulationEvent::StopArrived { stop, cause } => listener.on_stop_arrived(stop, *cause),
            SimulationEvent::Completed { reason } => listener.on_simulation_complete(*reason),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl SimulationListener for NullListener {}

/// Forwards the feed into a channel, e.g. for a UI task.
impl SimulationListener for tokio::sync::mpsc::UnboundedSender<SimulationEvent> {
    fn on_position_update(&mut self, position: GeoPoint, distances: &[StopDistance]) {
        let _ = self.send(SimulationEvent::PositionUpdated {
            position,
            distances: distances.to_vec(),
        });
    }

    fn on_stop_arrived(&mut self, stop: &Stop, cause: ArrivalCause) {
        let _ = self.send(SimulationEvent::StopArrived {
            stop: stop.clone(),
            cause,
        });
    }

    fn on_simulation_complete(&mut self, reason: CompletionReason) {
        let _ = self.send(SimulationEvent::Completed { reason });
    }
}

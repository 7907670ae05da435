//! Position simulator: walks a vehicle along a route polyline in fixed steps.
//!
//! The simulator is a tick-driven state machine and knows nothing about
//! timers or HTTP. Whenever it needs a (new) route it hands back a
//! [`RouteRequest`] and suspends ticking until the caller delivers the
//! resolved polyline through [`PositionSimulator::apply_route`]. Requests are
//! tagged with a generation so a route fetched for a cancelled or restarted
//! run is discarded instead of applied.
//!
//! Per tick the vehicle either snaps to the next polyline vertex (when that
//! vertex is within one step) or moves one step toward it along the great
//! circle. The point it moved to becomes the new start of the segment, so the
//! bearing for the next tick is taken from the advanced point rather than the
//! original vertex.

use std::sync::Arc;

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::events::{ArrivalCause, CompletionReason, SimulationEvent, StopDistance};
use crate::geo::{bearing, destination, distance, GeoPoint};
use crate::routing::{RoutePolyline, Waypoints};
use crate::stops::{Stop, StopKey, StopList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SimulationPhase {
    Idle,
    /// Ticking is suspended until the route for `generation` arrives.
    AwaitingRoute { generation: u64 },
    Running,
}

/// A route the simulator needs resolved before it can continue.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub generation: u64,
    pub waypoints: Waypoints,
}

/// Everything one simulator call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub events: Vec<SimulationEvent>,
    pub reroute: Option<RouteRequest>,
}

impl TickOutcome {
    fn event(event: SimulationEvent) -> Self {
        Self {
            events: vec![event],
            reroute: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.reroute.is_none()
    }
}

/// Immutable snapshot of a running simulation.
///
/// `segment_start` is the logical value of `polyline[segment_cursor]`: the
/// original vertex right after a route swap or snap, the advanced position
/// after a partial step. The shared polyline itself is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    polyline: Arc<RoutePolyline>,
    segment_cursor: usize,
    segment_start: GeoPoint,
    stop_cursor: usize,
    vehicle: GeoPoint,
}

impl SimulationState {
    fn new(polyline: RoutePolyline, stop_cursor: usize, vehicle: GeoPoint) -> Self {
        let segment_start = polyline.first();
        Self {
            polyline: Arc::new(polyline),
            segment_cursor: 0,
            segment_start,
            stop_cursor,
            vehicle,
        }
    }

    pub fn polyline(&self) -> &RoutePolyline {
        &self.polyline
    }

    pub fn segment_cursor(&self) -> usize {
        self.segment_cursor
    }

    pub fn segment_start(&self) -> GeoPoint {
        self.segment_start
    }

    pub fn stop_cursor(&self) -> usize {
        self.stop_cursor
    }

    pub fn vehicle(&self) -> GeoPoint {
        self.vehicle
    }

    /// Points still ahead, starting with the (possibly advanced) segment start.
    pub fn remaining_polyline(&self) -> Vec<GeoPoint> {
        let mut points = vec![self.segment_start];
        points.extend_from_slice(&self.polyline.points()[self.segment_cursor + 1..]);
        points
    }

    fn remaining_points(&self) -> usize {
        self.polyline.len() - self.segment_cursor
    }

    /// Snapshot after one movement step. Requires a next vertex.
    fn advanced(&self, step_meters: f64) -> Self {
        let next_idx = self.segment_cursor + 1;
        let next = self.polyline.points()[next_idx];
        let seg_m = distance(self.segment_start, next);

        let snapped = Self {
            segment_cursor: next_idx,
            segment_start: next,
            vehicle: next,
            ..self.clone()
        };
        // Covers zero-length segments too: no bearing is computed for them.
        if seg_m <= step_meters {
            return snapped;
        }

        let moved = destination(self.segment_start, bearing(self.segment_start, next), step_meters);
        // Never extrapolate past the vertex.
        if distance(self.segment_start, moved) >= seg_m {
            return snapped;
        }

        Self {
            segment_start: moved,
            vehicle: moved,
            ..self.clone()
        }
    }
}

/// Drives one vehicle through an ordered stop list.
#[derive(Debug, Clone)]
pub struct PositionSimulator {
    step_meters: f64,
    arrival_radius_meters: f64,
    phase: SimulationPhase,
    generation: u64,
    stops: StopList,
    state: Option<SimulationState>,
}

impl Default for PositionSimulator {
    fn default() -> Self {
        Self::with_tuning(&SimulationConfig::default())
    }
}

impl PositionSimulator {
    /// Builds an idle simulator. Rejects a config with a non-positive step or
    /// arrival radius, which would otherwise never reach a stop.
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_tuning(config))
    }

    pub(crate) fn with_tuning(config: &SimulationConfig) -> Self {
        Self {
            step_meters: config.step_meters,
            arrival_radius_meters: config.arrival_radius_meters,
            phase: SimulationPhase::Idle,
            generation: 0,
            stops: StopList::default(),
            state: None,
        }
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SimulationPhase::Idle
    }

    pub fn is_running(&self) -> bool {
        self.phase == SimulationPhase::Running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> Option<&SimulationState> {
        self.state.as_ref()
    }

    pub fn vehicle_position(&self) -> Option<GeoPoint> {
        self.state.as_ref().map(|state| state.vehicle)
    }

    /// Stops not yet reached, in visiting order.
    pub fn remaining_stops(&self) -> &[Stop] {
        let cursor = self.state.as_ref().map_or(0, |state| state.stop_cursor);
        self.stops.as_slice().get(cursor..).unwrap_or(&[])
    }

    pub fn current_target(&self) -> Option<&Stop> {
        self.remaining_stops().first()
    }

    /// Begins a run from `initial`. An empty stop list leaves the simulator idle.
    ///
    /// Any previous run is abandoned; its outstanding route is now stale.
    pub fn start(&mut self, stops: StopList, initial: GeoPoint) -> Option<RouteRequest> {
        self.stop();
        if stops.is_empty() {
            tracing::info!("no stops to visit, simulation stays idle");
            return None;
        }

        tracing::info!(stops = stops.len(), start = %initial, "simulation started");
        self.stops = stops;
        self.state = Some(SimulationState::new(
            RoutePolyline::straight_line(&Waypoints::new(initial, [])),
            0,
            initial,
        ));
        Some(self.request_route(initial))
    }

    /// Installs a resolved route. Returns `false` when the route belongs to a
    /// superseded request and was discarded.
    pub fn apply_route(&mut self, generation: u64, polyline: RoutePolyline) -> bool {
        let awaiting = matches!(self.phase, SimulationPhase::AwaitingRoute { generation: g } if g == generation);
        let Some(state) = self.state.as_ref().filter(|_| awaiting) else {
            tracing::debug!(generation, current = self.generation, "discarding stale route");
            return false;
        };

        self.state = Some(SimulationState::new(polyline, state.stop_cursor, state.vehicle));
        self.phase = SimulationPhase::Running;
        true
    }

    /// Advances the simulation by one step. Does nothing unless running.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::default();
        }
        let Some(state) = self.state.as_ref() else {
            return self.finish(CompletionReason::AllStopsVisited);
        };

        if state.stop_cursor >= self.stops.len() {
            return self.finish(CompletionReason::AllStopsVisited);
        }
        if state.remaining_points() < 2 {
            tracing::warn!(
                remaining_stops = self.stops.len() - state.stop_cursor,
                "route ended before all stops were reached"
            );
            return self.finish(CompletionReason::RouteExhausted);
        }

        let mut next = state.advanced(self.step_meters);
        let target = &self.stops.as_slice()[next.stop_cursor];

        if distance(next.vehicle, target.point) <= self.arrival_radius_meters {
            let stop = target.clone();
            next.vehicle = stop.point;
            next.stop_cursor += 1;
            let vehicle = next.vehicle;
            let more_stops = next.stop_cursor < self.stops.len();
            self.state = Some(next);

            let arrived = SimulationEvent::StopArrived {
                stop,
                cause: ArrivalCause::Proximity,
            };
            if more_stops {
                return TickOutcome {
                    events: vec![arrived],
                    reroute: Some(self.request_route(vehicle)),
                };
            }
            let mut outcome = self.finish(CompletionReason::AllStopsVisited);
            outcome.events.insert(0, arrived);
            return outcome;
        }

        let position = next.vehicle;
        self.state = Some(next);
        TickOutcome::event(SimulationEvent::PositionUpdated {
            position,
            distances: self.stop_distances(position),
        })
    }

    /// Completes a stop by hand. Unknown or already visited stops are ignored.
    pub fn mark_stop_reached(&mut self, key: &StopKey) -> TickOutcome {
        let Some(state) = self.state.as_ref().filter(|_| !self.is_idle()) else {
            return TickOutcome::default();
        };
        let (stop_cursor, vehicle) = (state.stop_cursor, state.vehicle);

        let Some(index) = self.stops.position(key).filter(|&idx| idx >= stop_cursor) else {
            tracing::debug!(stop = %key, "ignoring reached mark for inactive stop");
            return TickOutcome::default();
        };

        // Removing the current target makes the following stop the target.
        let stop = self.stops.remove(index);
        let mut outcome = TickOutcome::event(SimulationEvent::StopArrived {
            stop,
            cause: ArrivalCause::Manual,
        });
        if stop_cursor < self.stops.len() {
            outcome.reroute = Some(self.request_route(vehicle));
        }
        outcome
    }

    /// Halts the run. Safe in any phase and idempotent.
    pub fn stop(&mut self) {
        if !self.is_idle() {
            tracing::debug!(generation = self.generation, "simulation stopped");
        }
        self.generation += 1;
        self.phase = SimulationPhase::Idle;
        self.state = None;
    }

    /// Distance from `position` to every remaining stop.
    pub fn stop_distances(&self, position: GeoPoint) -> Vec<StopDistance> {
        self.remaining_stops()
            .iter()
            .map(|stop| StopDistance {
                stop: stop.key(),
                meters: distance(position, stop.point),
            })
            .collect()
    }

    fn request_route(&mut self, from: GeoPoint) -> RouteRequest {
        self.generation += 1;
        self.phase = SimulationPhase::AwaitingRoute {
            generation: self.generation,
        };
        RouteRequest {
            generation: self.generation,
            waypoints: Waypoints::new(from, self.remaining_stops().iter().map(|s| s.point)),
        }
    }

    fn finish(&mut self, reason: CompletionReason) -> TickOutcome {
        tracing::info!(?reason, "simulation complete");
        self.stop();
        TickOutcome::event(SimulationEvent::Completed { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stops::{PassengerId, StopId, StopKind};

    fn pt(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    fn stop(id: &str, lat: f64, lng: f64) -> Stop {
        Stop {
            id: StopId(id.to_string()),
            point: pt(lat, lng),
            kind: StopKind::Pickup,
            owner: PassengerId(id.to_string()),
        }
    }

    fn stops(list: Vec<Stop>) -> StopList {
        StopList::new(list).unwrap()
    }

    fn straight(request: &RouteRequest) -> RoutePolyline {
        RoutePolyline::straight_line(&request.waypoints)
    }

    /// Starts a run and installs the straight-line route.
    fn running(list: Vec<Stop>) -> PositionSimulator {
        let mut sim = PositionSimulator::default();
        let request = sim.start(stops(list), pt(0.0, 0.0)).expect("request");
        assert!(sim.apply_route(request.generation, straight(&request)));
        sim
    }

    #[test]
    fn empty_stop_list_stays_idle() {
        let mut sim = PositionSimulator::default();
        assert!(sim.start(StopList::default(), pt(0.0, 0.0)).is_none());
        assert!(sim.is_idle());
        assert!(sim.tick().is_empty());
    }

    #[test]
    fn start_requests_route_through_all_stops() {
        let mut sim = PositionSimulator::default();
        let request = sim
            .start(stops(vec![stop("a", 0.0, 0.01), stop("b", 0.0, 0.02)]), pt(0.0, 0.0))
            .unwrap();
        assert_eq!(
            request.waypoints.as_slice(),
            &[pt(0.0, 0.0), pt(0.0, 0.01), pt(0.0, 0.02)]
        );
        assert_eq!(
            sim.phase(),
            SimulationPhase::AwaitingRoute {
                generation: request.generation
            }
        );
        // Suspended until the route is applied.
        assert!(sim.tick().is_empty());
    }

    #[test]
    fn restart_discards_previous_route() {
        let mut sim = PositionSimulator::default();
        let first = sim.start(stops(vec![stop("a", 0.0, 0.01)]), pt(0.0, 0.0)).unwrap();
        let second = sim.start(stops(vec![stop("b", 0.0, 0.02)]), pt(0.0, 0.0)).unwrap();
        assert!(!sim.apply_route(first.generation, straight(&first)));
        assert!(sim.apply_route(second.generation, straight(&second)));
        assert!(sim.is_running());
    }

    #[test]
    fn long_segment_advances_one_step_without_touching_polyline() {
        let mut sim = running(vec![stop("a", 0.0, 0.01)]);
        let before = sim.state().unwrap().polyline().clone();

        let outcome = sim.tick();
        let state = sim.state().unwrap();
        assert!((distance(pt(0.0, 0.0), state.vehicle()) - 50.0).abs() < 1e-6);
        assert_eq!(state.segment_start(), state.vehicle());
        assert_eq!(state.segment_cursor(), 0);
        assert_eq!(state.polyline(), &before);
        assert!(matches!(
            outcome.events.as_slice(),
            [SimulationEvent::PositionUpdated { .. }]
        ));
    }

    #[test]
    fn zero_length_segment_snaps_to_next_vertex() {
        let mut sim = PositionSimulator::default();
        let request = sim.start(stops(vec![stop("a", 0.0, 0.01)]), pt(0.0, 0.0)).unwrap();
        let polyline = RoutePolyline::new(vec![pt(0.0, 0.0), pt(0.0, 0.0), pt(0.0, 0.01)]).unwrap();
        sim.apply_route(request.generation, polyline);

        sim.tick();
        let state = sim.state().unwrap();
        assert_eq!(state.segment_cursor(), 1);
        assert_eq!(state.vehicle(), pt(0.0, 0.0));
    }

    #[test]
    fn short_segment_snaps_exactly_to_vertex() {
        let mut sim = PositionSimulator::default();
        let request = sim.start(stops(vec![stop("a", 0.0, 0.01)]), pt(0.0, 0.0)).unwrap();
        // ~33 m to the first vertex, below the 50 m step.
        let polyline =
            RoutePolyline::new(vec![pt(0.0, 0.0), pt(0.0003, 0.0), pt(0.0, 0.01)]).unwrap();
        sim.apply_route(request.generation, polyline);

        sim.tick();
        assert_eq!(sim.vehicle_position(), Some(pt(0.0003, 0.0)));
        assert_eq!(sim.state().unwrap().segment_cursor(), 1);
    }

    #[test]
    fn position_update_reports_every_remaining_stop() {
        let mut sim = running(vec![stop("a", 0.0, 0.01), stop("b", 0.0, 0.02)]);
        let outcome = sim.tick();
        let [SimulationEvent::PositionUpdated { distances, .. }] = outcome.events.as_slice() else {
            panic!("expected a position update, got {:?}", outcome.events);
        };
        assert_eq!(distances.len(), 2);
        assert_eq!(distances[0].stop.id.0, "a");
        assert!(distances[0].meters < distances[1].meters);
    }

    #[test]
    fn arrival_emits_once_and_requests_reroute() {
        // ~89 m away: the first step lands within the 60 m radius.
        let mut sim = running(vec![stop("a", 0.0, 0.0008), stop("b", 0.0, 0.01)]);

        let outcome = sim.tick();
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(
            &outcome.events[0],
            SimulationEvent::StopArrived { stop, cause: ArrivalCause::Proximity } if stop.id.0 == "a"
        ));
        let reroute = outcome.reroute.expect("reroute");
        assert_eq!(reroute.waypoints.as_slice(), &[pt(0.0, 0.0008), pt(0.0, 0.01)]);
        assert_eq!(sim.vehicle_position(), Some(pt(0.0, 0.0008)));
        assert_eq!(sim.state().unwrap().stop_cursor(), 1);

        // Suspended: no second arrival while the route is outstanding.
        assert!(sim.tick().is_empty());
        assert!(sim.apply_route(reroute.generation, straight(&reroute)));
        assert_eq!(sim.current_target().unwrap().id.0, "b");
    }

    #[test]
    fn last_arrival_completes_the_run() {
        let mut sim = running(vec![stop("a", 0.0, 0.0008)]);
        let outcome = sim.tick();
        assert!(outcome.reroute.is_none());
        assert!(matches!(
            outcome.events.as_slice(),
            [
                SimulationEvent::StopArrived { .. },
                SimulationEvent::Completed {
                    reason: CompletionReason::AllStopsVisited
                }
            ]
        ));
        assert!(sim.is_idle());
    }

    #[test]
    fn exhausted_route_completes_without_arrival() {
        let mut sim = PositionSimulator::default();
        let request = sim.start(stops(vec![stop("a", 0.0, 0.01)]), pt(0.0, 0.0)).unwrap();
        // Route stops well short of the stop.
        let polyline = RoutePolyline::new(vec![pt(0.0, 0.0), pt(0.0, 0.0004)]).unwrap();
        sim.apply_route(request.generation, polyline);

        assert!(matches!(
            sim.tick().events.as_slice(),
            [SimulationEvent::PositionUpdated { .. }]
        ));
        assert_eq!(
            sim.tick().events,
            vec![SimulationEvent::Completed {
                reason: CompletionReason::RouteExhausted
            }]
        );
        assert!(sim.is_idle());
    }

    #[test]
    fn marking_current_target_moves_to_next_stop() {
        let mut sim = running(vec![stop("a", 0.0, 0.01), stop("b", 0.0, 0.02)]);
        sim.tick();
        let vehicle = sim.vehicle_position().unwrap();

        let outcome = sim.mark_stop_reached(&stop("a", 0.0, 0.01).key());
        assert!(matches!(
            outcome.events.as_slice(),
            [SimulationEvent::StopArrived { cause: ArrivalCause::Manual, .. }]
        ));
        let reroute = outcome.reroute.expect("reroute");
        assert_eq!(reroute.waypoints.as_slice(), &[vehicle, pt(0.0, 0.02)]);
        assert_eq!(sim.current_target().unwrap().id.0, "b");
    }

    #[test]
    fn marking_unknown_or_visited_stop_is_noop() {
        let mut sim = running(vec![stop("a", 0.0, 0.0008), stop("b", 0.0, 0.01)]);
        assert!(sim.mark_stop_reached(&stop("zzz", 0.0, 0.0).key()).is_empty());

        let reroute = sim.tick().reroute.unwrap();
        sim.apply_route(reroute.generation, straight(&reroute));
        assert!(sim.mark_stop_reached(&stop("a", 0.0, 0.0008).key()).is_empty());
    }

    #[test]
    fn marking_last_stop_keeps_route_and_completes_next_tick() {
        let mut sim = running(vec![stop("a", 0.0, 0.01)]);
        let outcome = sim.mark_stop_reached(&stop("a", 0.0, 0.01).key());
        assert!(outcome.reroute.is_none());
        assert!(sim.is_running());
        assert_eq!(
            sim.tick().events,
            vec![SimulationEvent::Completed {
                reason: CompletionReason::AllStopsVisited
            }]
        );
    }

    #[test]
    fn stop_is_idempotent_and_invalidates_pending_route() {
        let mut sim = PositionSimulator::default();
        let request = sim.start(stops(vec![stop("a", 0.0, 0.01)]), pt(0.0, 0.0)).unwrap();
        sim.stop();
        sim.stop();
        assert!(sim.is_idle());
        assert!(!sim.apply_route(request.generation, straight(&request)));
        assert!(sim.mark_stop_reached(&stop("a", 0.0, 0.01).key()).is_empty());
    }
}

use std::sync::Arc;

use shuttle_core::config::SimulationConfig;
use shuttle_core::controller::{run_until_idle, RunReport};
use shuttle_core::events::SimulationEvent;
use shuttle_core::geo::GeoPoint;
use shuttle_core::routing::{RouteOracle, RouteResolver};
use shuttle_core::sequencing::plan_route_stops;
use shuttle_core::simulator::{PositionSimulator, RouteRequest};
use shuttle_core::stops::{Passenger, StopList};
use shuttle_core::test_helpers::{sample_passengers, test_origin};

/// Builder for reproducible single-vehicle trips.
pub struct TripBuilder {
    config: SimulationConfig,
    passengers: Vec<Passenger>,
    origin: GeoPoint,
    resolver: RouteResolver,
}

impl Default for TripBuilder {
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            passengers: sample_passengers(),
            origin: test_origin(),
            resolver: RouteResolver::without_oracle(),
        }
    }
}

impl TripBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_passengers(mut self, passengers: Vec<Passenger>) -> Self {
        self.passengers = passengers;
        self
    }

    pub fn with_origin(mut self, origin: GeoPoint) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_oracle(mut self, oracle: impl RouteOracle + 'static) -> Self {
        self.resolver = RouteResolver::new(Arc::new(oracle));
        self
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn stops(&self) -> StopList {
        plan_route_stops(&self.passengers, self.origin).expect("passenger stops are unique")
    }

    /// Starts the simulator; the first route is still pending.
    pub fn start(&self) -> (PositionSimulator, Option<RouteRequest>) {
        let mut simulator = PositionSimulator::new(&self.config).expect("valid config");
        let request = simulator.start(self.stops(), self.origin);
        (simulator, request)
    }

    /// Starts the simulator and installs the first route.
    pub fn running(&self) -> PositionSimulator {
        let (mut simulator, request) = self.start();
        let request = request.expect("trip has stops");
        let polyline = self.resolver.resolve(&request.waypoints);
        assert!(simulator.apply_route(request.generation, polyline));
        simulator
    }

    pub fn run(&self, max_ticks: usize) -> RunReport {
        let (mut simulator, request) = self.start();
        run_until_idle(&mut simulator, &self.resolver, request, max_ticks)
    }
}

pub fn arrivals(events: &[SimulationEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, SimulationEvent::StopArrived { .. }))
        .count()
}

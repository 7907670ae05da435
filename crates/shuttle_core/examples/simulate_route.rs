//! Drive a shuttle through three passengers' pickups and dropoffs and print
//! the event feed.
//!
//! Run with: cargo run -p shuttle_core --example simulate_route [config.json]

use std::time::Duration;

use shuttle_core::config::SimulationConfig;
use shuttle_core::controller::SimulationController;
use shuttle_core::events::{ArrivalCause, CompletionReason, SimulationListener, StopDistance};
use shuttle_core::geo::GeoPoint;
use shuttle_core::sequencing::plan_route_stops;
use shuttle_core::stops::Stop;
use shuttle_core::test_helpers::{sample_passengers, test_origin};

struct PrintListener {
    ticks: usize,
}

impl SimulationListener for PrintListener {
    fn on_position_update(&mut self, position: GeoPoint, distances: &[StopDistance]) {
        self.ticks += 1;
        if let Some(next) = distances.first() {
            println!("  tick {:>4}  at {}  {:.0} m to {}", self.ticks, position, next.meters, next.stop);
        }
    }

    fn on_stop_arrived(&mut self, stop: &Stop, cause: ArrivalCause) {
        println!("Arrived at {} {} ({:?})", stop.kind, stop.id, cause);
    }

    fn on_simulation_complete(&mut self, reason: CompletionReason) {
        println!("--- Trip complete after {} ticks: {:?} ---", self.ticks, reason);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::default().with_tick_interval(Duration::from_millis(20)),
    };

    let passengers = sample_passengers();
    let origin = test_origin();
    let stops = plan_route_stops(&passengers, origin)?;
    println!("--- Route plan ({} stops from {}) ---", stops.len(), origin);
    for (i, stop) in stops.iter().enumerate() {
        println!("  {}  {} {} at {}", i + 1, stop.kind, stop.owner, stop.point);
    }

    // Built outside the runtime: the OSRM oracle owns a blocking HTTP client.
    let controller = SimulationController::from_config(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let handle = controller.spawn(stops, origin, PrintListener { ticks: 0 });
        handle.join().await
    })?;
    Ok(())
}

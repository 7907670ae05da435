mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shuttle_core::config::SimulationConfig;
use shuttle_core::controller::SimulationController;
use shuttle_core::events::{ArrivalCause, CompletionReason, SimulationEvent};
use shuttle_core::geo::GeoPoint;
use shuttle_core::render::{MapPresenter, MarkerId};
use shuttle_core::routing::{OracleError, RouteOracle, RouteResolver, Waypoints};
use shuttle_core::stops::StopList;
use shuttle_core::test_helpers::{
    point, sample_passengers, test_origin, test_passenger, RecordingListener, RecordingSink,
};

use support::trip::TripBuilder;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn fast_config() -> SimulationConfig {
    SimulationConfig::default()
        .with_step_meters(200.0)
        .with_tick_interval(Duration::from_millis(2))
}

/// Straight-line oracle that takes its time and counts requests.
struct SlowOracle {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl RouteOracle for SlowOracle {
    fn route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(waypoints.as_slice().to_vec())
    }
}

#[tokio::test]
async fn timer_driven_trip_visits_every_stop() {
    let stops = TripBuilder::new().stops();
    let expected: Vec<_> = stops.iter().map(|s| s.key()).collect();
    let controller = SimulationController::new(fast_config(), RouteResolver::without_oracle())
        .expect("valid config");
    let listener = RecordingListener::default();

    let handle = controller.spawn(stops, test_origin(), listener.clone());
    tokio::time::timeout(TEST_TIMEOUT, handle.join())
        .await
        .expect("trip finished in time")
        .expect("task did not panic");

    let visited: Vec<_> = listener.arrivals().iter().map(|s| s.key()).collect();
    assert_eq!(visited, expected);
    assert_eq!(listener.completion(), Some(CompletionReason::AllStopsVisited));
}

#[tokio::test]
async fn map_is_cleared_when_trip_completes() {
    let passengers = sample_passengers();
    let builder = TripBuilder::new().with_passengers(passengers.clone());
    let stops = builder.stops();
    let presenter = MapPresenter::new("Shuttle", &stops, &passengers);
    let sink = RecordingSink::default();
    let controller = SimulationController::new(fast_config(), RouteResolver::without_oracle())
        .expect("valid config");

    let handle = controller.spawn_with_map(
        stops,
        test_origin(),
        RecordingListener::default(),
        presenter,
        Box::new(sink.clone()),
    );
    tokio::time::timeout(TEST_TIMEOUT, handle.join())
        .await
        .expect("trip finished in time")
        .expect("task did not panic");

    let map = sink.snapshot();
    assert_eq!(map.markers.len(), 1);
    assert!(map.markers.contains_key(&MarkerId::Vehicle));
    assert!(map.polyline.is_empty());
    assert!(map.fit_count >= 1);
}

#[tokio::test]
async fn cancel_discards_route_in_flight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let oracle = SlowOracle {
        delay: Duration::from_millis(200),
        calls: Arc::clone(&calls),
    };
    let controller = SimulationController::new(fast_config(), RouteResolver::new(Arc::new(oracle)))
        .expect("valid config");
    let listener = RecordingListener::default();

    let handle = controller.spawn(TripBuilder::new().stops(), test_origin(), listener.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();
    handle.cancel();
    tokio::time::timeout(TEST_TIMEOUT, handle.join())
        .await
        .expect("cancelled task ends")
        .expect("task did not panic");

    // Let the slow fetch finish; its route must not restart anything.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn manual_marks_complete_a_distant_trip() {
    let origin = test_origin();
    let far = test_passenger(
        "far",
        point(origin.lat + 1.0, origin.lng),
        point(origin.lat + 2.0, origin.lng),
    );
    let stops = TripBuilder::new().with_passengers(vec![far.clone()]).stops();
    let config = SimulationConfig::default().with_tick_interval(Duration::from_millis(5));
    let controller = SimulationController::new(config, RouteResolver::without_oracle())
        .expect("valid config");
    let listener = RecordingListener::default();

    let handle = controller.spawn(stops, origin, listener.clone());
    assert!(handle.mark_stop_reached(far.pickup_stop().key()));
    assert!(handle.mark_stop_reached(far.dropoff_stop().key()));
    tokio::time::timeout(TEST_TIMEOUT, handle.join())
        .await
        .expect("trip finished in time")
        .expect("task did not panic");

    let manual = listener
        .events()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                SimulationEvent::StopArrived {
                    cause: ArrivalCause::Manual,
                    ..
                }
            )
        })
        .count();
    assert_eq!(manual, 2);
    assert_eq!(listener.completion(), Some(CompletionReason::AllStopsVisited));
}

#[tokio::test]
async fn empty_trip_finishes_immediately() {
    let controller = SimulationController::new(fast_config(), RouteResolver::without_oracle())
        .expect("valid config");
    let listener = RecordingListener::default();
    let handle = controller.spawn(StopList::default(), test_origin(), listener.clone());
    tokio::time::timeout(TEST_TIMEOUT, handle.join())
        .await
        .expect("idle task ends")
        .expect("task did not panic");
    assert!(listener.events().is_empty());
}

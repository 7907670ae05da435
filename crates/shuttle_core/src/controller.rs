//! Simulation clock: drives a [`PositionSimulator`] from a timer or a loop.
//!
//! Two drivers share the same simulator contract:
//!
//! - [`SimulationController`] runs one simulation on a tokio task, ticking on a
//!   fixed interval. Route fetches run on the blocking pool; ticking is
//!   suspended until the fetched route has been applied, so ticks never race a
//!   route swap. Cancelling discards any fetch still in flight.
//! - [`run_until_idle`] drives a simulator synchronously, resolving routes
//!   inline. Tests, benches and offline replays use it.

use std::future::pending;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::events::{dispatch, SimulationEvent, SimulationListener};
use crate::geo::GeoPoint;
use crate::render::{MapPresenter, RenderSink};
use crate::routing::{build_route_oracle, RoutePolyline, RouteResolver};
use crate::simulator::{PositionSimulator, RouteRequest, TickOutcome};
use crate::stops::{StopKey, StopList};

// ---------------------------------------------------------------------------
// Synchronous driver
// ---------------------------------------------------------------------------

/// What a synchronous run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub events: Vec<SimulationEvent>,
    pub ticks: usize,
}

impl RunReport {
    pub fn completed(&self) -> bool {
        matches!(self.events.last(), Some(SimulationEvent::Completed { .. }))
    }
}

/// Ticks `simulator` until it goes idle or `max_ticks` have run, resolving
/// `pending` and every re-route through `resolver` in place.
pub fn run_until_idle(
    simulator: &mut PositionSimulator,
    resolver: &RouteResolver,
    mut pending: Option<RouteRequest>,
    max_ticks: usize,
) -> RunReport {
    let mut report = RunReport::default();
    loop {
        if let Some(request) = pending.take() {
            let polyline = resolver.resolve(&request.waypoints);
            simulator.apply_route(request.generation, polyline);
        }
        if simulator.is_idle() || report.ticks >= max_ticks {
            break;
        }
        let outcome = simulator.tick();
        report.ticks += 1;
        report.events.extend(outcome.events);
        pending = outcome.reroute;
    }
    report
}

// ---------------------------------------------------------------------------
// Timer-driven controller
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Command {
    MarkStopReached(StopKey),
}

/// Spawns timer-driven simulations sharing one configuration and resolver.
#[derive(Debug, Clone)]
pub struct SimulationController {
    config: SimulationConfig,
    resolver: RouteResolver,
}

impl SimulationController {
    /// Fails on an invalid `config`; a zero tick interval cannot drive a timer.
    pub fn new(config: SimulationConfig, resolver: RouteResolver) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, resolver })
    }

    /// Builds the resolver from the oracle named in `config`.
    pub fn from_config(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let oracle = build_route_oracle(&config.route_oracle, config.route_cache_capacity);
        Self::new(config, RouteResolver::new(oracle))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Starts a simulation on the current tokio runtime.
    pub fn spawn<L>(&self, stops: StopList, initial: GeoPoint, listener: L) -> SimulationHandle
    where
        L: SimulationListener + 'static,
    {
        self.spawn_inner(stops, initial, Box::new(listener), None)
    }

    /// Like [`spawn`](Self::spawn), additionally keeping a map in sync.
    pub fn spawn_with_map<L>(
        &self,
        stops: StopList,
        initial: GeoPoint,
        listener: L,
        presenter: MapPresenter,
        sink: Box<dyn RenderSink>,
    ) -> SimulationHandle
    where
        L: SimulationListener + 'static,
    {
        self.spawn_inner(stops, initial, Box::new(listener), Some((presenter, sink)))
    }

    fn spawn_inner(
        &self,
        stops: StopList,
        initial: GeoPoint,
        listener: Box<dyn SimulationListener>,
        map: Option<(MapPresenter, Box<dyn RenderSink>)>,
    ) -> SimulationHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // Validated in `new`.
        let mut simulator = PositionSimulator::with_tuning(&self.config);
        let first_request = simulator.start(stops, initial);
        let mut driver = Driver {
            simulator,
            resolver: self.resolver.clone(),
            listener,
            map,
        };
        if let Some((presenter, sink)) = driver.map.as_mut() {
            presenter.draw_initial(sink.as_mut(), initial);
        }

        let period = self.config.tick_interval();
        let task = tokio::spawn(async move {
            driver
                .run(period, first_request, command_rx, cancel_rx)
                .await;
        });

        SimulationHandle {
            commands: command_tx,
            cancel: cancel_tx,
            task,
        }
    }
}

/// Control surface for one running simulation.
#[derive(Debug)]
pub struct SimulationHandle {
    commands: mpsc::UnboundedSender<Command>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SimulationHandle {
    /// Marks a stop as reached by hand. Returns `false` once the run is over.
    pub fn mark_stop_reached(&self, key: StopKey) -> bool {
        self.commands.send(Command::MarkStopReached(key)).is_ok()
    }

    /// Stops ticking and drops any route still being fetched. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the simulation task to end.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

struct Driver {
    simulator: PositionSimulator,
    resolver: RouteResolver,
    listener: Box<dyn SimulationListener>,
    map: Option<(MapPresenter, Box<dyn RenderSink>)>,
}

impl Driver {
    async fn run(
        &mut self,
        period: std::time::Duration,
        first_request: Option<RouteRequest>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let (route_tx, mut routes) = mpsc::unbounded_channel::<(u64, RoutePolyline)>();
        if let Some(request) = first_request {
            self.fetch(request, &route_tx);
        }

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.simulator.is_idle() {
            tokio::select! {
                biased;

                _ = cancelled(&mut cancel) => {
                    self.simulator.stop();
                }
                Some(command) = commands.recv() => match command {
                    Command::MarkStopReached(key) => {
                        let outcome = self.simulator.mark_stop_reached(&key);
                        self.publish(outcome, &route_tx);
                    }
                },
                Some((generation, polyline)) = routes.recv() => {
                    if self.simulator.apply_route(generation, polyline) {
                        ticker.reset();
                        self.publish(TickOutcome::default(), &route_tx);
                    }
                }
                _ = ticker.tick(), if self.simulator.is_running() => {
                    let outcome = self.simulator.tick();
                    self.publish(outcome, &route_tx);
                }
            }
        }

        // A blocking HTTP client must not be dropped on an async worker.
        let resolver = std::mem::take(&mut self.resolver);
        tokio::task::spawn_blocking(move || drop(resolver));
    }

    fn publish(&mut self, outcome: TickOutcome, route_tx: &mpsc::UnboundedSender<(u64, RoutePolyline)>) {
        dispatch(self.listener.as_mut(), &outcome.events);
        if let Some((presenter, sink)) = self.map.as_mut() {
            presenter.render(sink.as_mut(), &outcome.events, &self.simulator);
        }
        if let Some(request) = outcome.reroute {
            self.fetch(request, route_tx);
        }
    }

    fn fetch(&self, request: RouteRequest, route_tx: &mpsc::UnboundedSender<(u64, RoutePolyline)>) {
        let resolver = self.resolver.clone();
        let route_tx = route_tx.clone();
        tokio::task::spawn_blocking(move || {
            let polyline = resolver.resolve(&request.waypoints);
            // Receiver gone: the simulation already ended.
            let _ = route_tx.send((request.generation, polyline));
        });
    }
}

/// Resolves once cancellation is requested. A dropped handle detaches the
/// simulation instead of cancelling it.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            pending::<()>().await;
        }
    }
}

//! Simulated shuttle movement along a routed multi-stop trip.
//!
//! A [`simulator::PositionSimulator`] advances a vehicle a fixed distance per
//! tick along a route polyline, detects arrivals at the ordered stops produced
//! by [`sequencing`], and re-routes from each reached stop. Routes come from a
//! pluggable [`routing::RouteOracle`] with straight-line fallback.
//! [`controller`] drives the simulator from a timer or a plain loop.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod geo;
pub mod render;
pub mod routing;
pub mod sequencing;
pub mod simulator;
pub mod stops;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

//! Visiting order for pickups and dropoffs.
//!
//! Ordering is a greedy nearest-neighbour walk over great-circle distance.
//! It is quadratic in the number of stops, which is fine for the tens of
//! stops a shuttle run carries.

use crate::error::StopListError;
use crate::geo::{distance, GeoPoint};
use crate::stops::{Passenger, Stop, StopList};

/// Orders `stops` by repeatedly picking the closest remaining stop to the
/// current location, starting from `start`.
///
/// Ties keep input order: a later stop only wins when strictly closer.
pub fn sequence(stops: Vec<Stop>, start: GeoPoint) -> Vec<Stop> {
    let mut remaining = stops;
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current = start;

    while !remaining.is_empty() {
        let mut nearest_idx = 0;
        let mut nearest_m = distance(current, remaining[0].point);
        for (idx, stop) in remaining.iter().enumerate().skip(1) {
            let d = distance(current, stop.point);
            if d < nearest_m {
                nearest_m = d;
                nearest_idx = idx;
            }
        }
        let next = remaining.remove(nearest_idx);
        current = next.point;
        ordered.push(next);
    }

    ordered
}

/// Plans the full run for a group: every riding passenger's pickup ordered
/// from the vehicle, followed by their dropoffs ordered from the last pickup.
pub fn plan_route_stops(
    passengers: &[Passenger],
    vehicle: GeoPoint,
) -> Result<StopList, StopListError> {
    let riding: Vec<&Passenger> = passengers.iter().filter(|p| p.is_riding()).collect();

    let pickups = sequence(riding.iter().map(|p| p.pickup_stop()).collect(), vehicle);
    let dropoff_start = pickups.last().map(|stop| stop.point).unwrap_or(vehicle);
    let dropoffs = sequence(
        riding.iter().map(|p| p.dropoff_stop()).collect(),
        dropoff_start,
    );

    let mut stops = pickups;
    stops.extend(dropoffs);
    StopList::new(stops)
}

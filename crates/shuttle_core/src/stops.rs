//! Passengers and the pickup/dropoff stops derived from them.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StopListError;
use crate::geo::GeoPoint;

/// Opaque passenger reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassengerId(pub String);

impl fmt::Display for PassengerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque stop token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopId(pub String);

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Pickup,
    Dropoff,
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopKind::Pickup => f.write_str("pickup"),
            StopKind::Dropoff => f.write_str("dropoff"),
        }
    }
}

/// Identity of a stop within one simulation: `(id, kind)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopKey {
    pub id: StopId,
    pub kind: StopKind,
}

impl fmt::Display for StopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.kind)
    }
}

/// A pickup or dropoff waypoint tied to one passenger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub point: GeoPoint,
    pub kind: StopKind,
    pub owner: PassengerId,
}

impl Stop {
    pub fn key(&self) -> StopKey {
        StopKey {
            id: self.id.clone(),
            kind: self.kind,
        }
    }

    pub fn matches(&self, key: &StopKey) -> bool {
        self.kind == key.kind && self.id == key.id
    }
}

/// Passenger readiness as reported by the group roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassengerStatus {
    Ready,
    NotReady,
    Absent,
    #[default]
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    pub name: String,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    #[serde(default)]
    pub status: PassengerStatus,
}

impl Passenger {
    /// Absent passengers are left out of route planning.
    pub fn is_riding(&self) -> bool {
        self.status != PassengerStatus::Absent
    }

    pub fn pickup_stop(&self) -> Stop {
        self.stop(StopKind::Pickup, self.pickup)
    }

    pub fn dropoff_stop(&self) -> Stop {
        self.stop(StopKind::Dropoff, self.dropoff)
    }

    fn stop(&self, kind: StopKind, point: GeoPoint) -> Stop {
        Stop {
            id: StopId(format!("{}:{}", self.id, kind)),
            point,
            kind,
            owner: self.id.clone(),
        }
    }
}

/// Ordered stops; insertion order is visiting order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopList {
    stops: Vec<Stop>,
}

impl StopList {
    /// Builds a list, rejecting duplicate `(id, kind)` pairs.
    pub fn new(stops: Vec<Stop>) -> Result<Self, StopListError> {
        let mut seen = HashSet::with_capacity(stops.len());
        for stop in &stops {
            let key = stop.key();
            if !seen.insert(key.clone()) {
                return Err(StopListError::DuplicateStop(key));
            }
        }
        Ok(Self { stops })
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stop> {
        self.stops.iter()
    }

    pub fn as_slice(&self) -> &[Stop] {
        &self.stops
    }

    pub fn position(&self, key: &StopKey) -> Option<usize> {
        self.stops.iter().position(|stop| stop.matches(key))
    }

    /// Removes and returns the stop at `index`.
    pub(crate) fn remove(&mut self, index: usize) -> Stop {
        self.stops.remove(index)
    }
}

impl<'a> IntoIterator for &'a StopList {
    type Item = &'a Stop;
    type IntoIter = std::slice::Iter<'a, Stop>;

    fn into_iter(self) -> Self::IntoIter {
        self.stops.iter()
    }
}

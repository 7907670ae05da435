use reqwest::{blocking::Client, Url};
use std::time::Duration;

use super::parser::parse_route_response;
use super::response::OsrmRouteResponse;
use crate::geo::GeoPoint;
use crate::routing::{OracleError, Waypoints};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin HTTP client for OSRM driving routes.
#[derive(Debug, Clone)]
pub struct OsrmRouteOracle {
    client: Client,
    endpoint: String,
}

impl OsrmRouteOracle {
    /// Create a client for the given OSRM endpoint (e.g. `http://localhost:5000`).
    pub fn new(endpoint: &str) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(OracleError::Client)?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full-overview GeoJSON route through `waypoints`, converted to `(lat, lng)`.
    pub fn fetch_route(&self, waypoints: &Waypoints) -> Result<Vec<GeoPoint>, OracleError> {
        let url = route_url(&self.endpoint, waypoints)?;
        let response = self.client.get(url).send().map_err(OracleError::Http)?;
        let parsed: OsrmRouteResponse = response.json().map_err(OracleError::Json)?;
        parse_route_response(parsed)
    }
}

/// OSRM expects `lng,lat` pairs joined by `;`.
pub(super) fn route_url(endpoint: &str, waypoints: &Waypoints) -> Result<Url, OracleError> {
    let coord_segment = waypoints
        .as_slice()
        .iter()
        .map(|point| format!("{:.6},{:.6}", point.lng, point.lat))
        .collect::<Vec<_>>()
        .join(";");

    let base = format!("{}/route/v1/driving/{}", endpoint, coord_segment);
    let mut url = Url::parse(&base)
        .map_err(|err| OracleError::Api(format!("failed to build OSRM URL: {}", err)))?;
    url.query_pairs_mut()
        .append_pair("overview", "full")
        .append_pair("geometries", "geojson");
    Ok(url)
}

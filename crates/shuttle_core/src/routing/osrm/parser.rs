use super::response::OsrmRouteResponse;
use crate::geo::GeoPoint;
use crate::routing::OracleError;

pub(super) fn parse_route_response(resp: OsrmRouteResponse) -> Result<Vec<GeoPoint>, OracleError> {
    if resp.code != "Ok" {
        let detail = match resp.message {
            Some(message) if !message.trim().is_empty() => format!("{}: {}", resp.code, message),
            _ => resp.code,
        };
        return Err(OracleError::Api(detail));
    }

    let route = resp
        .routes
        .and_then(|routes| routes.into_iter().next())
        .ok_or(OracleError::NoRoute)?;

    if route.geometry.coordinates.is_empty() {
        return Err(OracleError::NoRoute);
    }

    route
        .geometry
        .coordinates
        .iter()
        .map(|&[lng, lat]| {
            GeoPoint::new(lat, lng).map_err(|err| OracleError::Malformed(err.to_string()))
        })
        .collect()
}

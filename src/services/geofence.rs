use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Maximum distance between user and station to start a rental
pub const GEOFENCE_RADIUS_METERS: f64 = 100.0;

/// Upper bound on waiting for a position fix
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location capability unavailable")]
    Unsupported,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("geolocation unsupported")]
    GeolocationUnsupported,

    #[error("position unavailable")]
    PositionUnavailable,

    #[error("out of range: {distance_meters:.0} m from station")]
    OutOfRange { distance_meters: f64 },
}

/// Source of the device's current position. Always queried fresh, in
/// high-accuracy mode, with a bounded timeout; implementations must not
/// serve a cached fix.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(
        &self,
        high_accuracy: bool,
        timeout: Duration,
    ) -> Result<Position, LocationError>;
}

/// A position already obtained and reported by the device making the
/// request. The API layer wraps the coordinates from the request body in
/// this provider so the validation path is the same either way.
pub struct ReportedPosition(pub Position);

#[async_trait]
impl LocationProvider for ReportedPosition {
    async fn current_position(
        &self,
        _high_accuracy: bool,
        _timeout: Duration,
    ) -> Result<Position, LocationError> {
        Ok(self.0)
    }
}

/// Great-circle distance in meters (haversine)
pub fn distance_meters(a: Position, b: Position) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Obtains a fresh position and checks it against the station's
/// geofence. Optimistic pre-filter only: the store recomputes the same
/// distance authoritatively inside the reserve transaction.
pub async fn check_within_range(
    provider: &dyn LocationProvider,
    station: Position,
) -> Result<Position, GeofenceError> {
    let position = tokio::time::timeout(
        LOCATION_TIMEOUT,
        provider.current_position(true, LOCATION_TIMEOUT),
    )
    .await
    .map_err(|_| GeofenceError::PositionUnavailable)?
    .map_err(|e| match e {
        LocationError::Unsupported => GeofenceError::GeolocationUnsupported,
        LocationError::Unavailable(_) => GeofenceError::PositionUnavailable,
    })?;

    let distance = distance_meters(position, station);
    if distance > GEOFENCE_RADIUS_METERS {
        tracing::debug!(distance_meters = distance, "Geofence pre-check failed");
        return Err(GeofenceError::OutOfRange {
            distance_meters: distance,
        });
    }

    Ok(position)
}

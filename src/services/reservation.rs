use serde::Serialize;
use uuid::Uuid;

use crate::services::balance_gate::{self, BalanceGateError};
use crate::services::geofence::{self, GeofenceError, LocationProvider, Position};
use crate::services::notifier::{rental_error_intent, rental_success_intent};
use crate::store::ReservationStore;
use crate::worker::WorkerHandle;

/// Code reported when a failure does not match the closed taxonomy
pub const CODE_UNCLASSIFIED: &str = "UNCLASSIFIED";

#[derive(Debug, Clone, Serialize)]
pub struct ReservationSuccess {
    pub rental_id: Uuid,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReservationFailure {
    pub code: String,
    pub message: String,
}

/// One fixed user-facing sentence per failure code; anything
/// unclassified gets the generic retry-suggesting message.
pub fn user_message(code: &str) -> &'static str {
    match code {
        "MIN_BALANCE" => {
            "Your balance is below the 5.00 minimum needed to start a rental. Please top up first."
        }
        "OUT_OF_RANGE" => {
            "You are too far from this station. Move within 100 meters and try again."
        }
        "STATION_NOT_FOUND" => "Station not found.",
        "STATION_INACTIVE" => "This station is out of service.",
        "NO_UNITS_AVAILABLE" => "No power banks are available at this station right now.",
        "HAS_ACTIVE_RENTAL" => {
            "You already have an active rental. Return it before starting a new one."
        }
        "GEOLOCATION_UNSUPPORTED" => "Location services are not available on this device.",
        "POSITION_UNAVAILABLE" => {
            "Could not determine your location. Check location permissions and try again."
        }
        "WALLET_UNAVAILABLE" => "Could not read your wallet balance. Please try again.",
        _ => "Something went wrong while reserving. Please try again.",
    }
}

fn failure(code: &str) -> ReservationFailure {
    ReservationFailure {
        code: code.to_string(),
        message: user_message(code).to_string(),
    }
}

/// Runs the full reservation flow for one user-initiated attempt:
/// station lookup, geofence and balance pre-filters (fail closed,
/// advisory only), then the single atomic reserve call, and finally a
/// notification intent for the outcome posted fire-and-forget to the
/// worker. Never retries; a failed attempt ends here and retry is a
/// fresh user action.
#[tracing::instrument(skip(store, location, worker), fields(user_id = %user_id, station_id = %station_id))]
pub async fn reserve_unit(
    store: &dyn ReservationStore,
    location: &dyn LocationProvider,
    worker: &WorkerHandle,
    user_id: Uuid,
    station_id: Uuid,
) -> Result<ReservationSuccess, ReservationFailure> {
    use std::time::Instant;
    let start_time = Instant::now();

    tracing::info!("Starting reservation flow");

    let outcome = attempt_reservation(store, location, user_id, station_id).await;

    // Every outcome, success or failure, becomes a notification so the
    // user learns of it even if the page is gone by now.
    match &outcome {
        Ok(success) => {
            worker.notify(rental_success_intent(&success.station_name, success.rental_id));
            tracing::info!(
                rental_id = %success.rental_id,
                duration_ms = start_time.elapsed().as_millis(),
                "Reservation succeeded"
            );
        }
        Err(fail) => {
            worker.notify(rental_error_intent(&fail.message));
            tracing::warn!(
                code = %fail.code,
                duration_ms = start_time.elapsed().as_millis(),
                "Reservation failed"
            );
        }
    }

    outcome
}

async fn attempt_reservation(
    store: &dyn ReservationStore,
    location: &dyn LocationProvider,
    user_id: Uuid,
    station_id: Uuid,
) -> Result<ReservationSuccess, ReservationFailure> {
    // 1. Station lookup, read fresh; a deactivated station fails closed
    // with its own message rather than reading as missing
    let station = store
        .find_station(station_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Station lookup failed");
            failure(CODE_UNCLASSIFIED)
        })?
        .ok_or_else(|| failure("STATION_NOT_FOUND"))?;

    if !station.is_active {
        return Err(failure("STATION_INACTIVE"));
    }

    // 2. Geofence pre-filter
    let position = geofence::check_within_range(
        location,
        Position {
            lat: station.lat,
            lng: station.lng,
        },
    )
    .await
    .map_err(|e| {
        failure(match e {
            GeofenceError::GeolocationUnsupported => "GEOLOCATION_UNSUPPORTED",
            GeofenceError::PositionUnavailable => "POSITION_UNAVAILABLE",
            GeofenceError::OutOfRange { .. } => "OUT_OF_RANGE",
        })
    })?;

    // 3. Balance pre-filter, read fresh
    balance_gate::ensure_min_balance(store, user_id)
        .await
        .map_err(|e| {
            failure(match e {
                BalanceGateError::WalletUnavailable => "WALLET_UNAVAILABLE",
                BalanceGateError::InsufficientFunds { .. } => "MIN_BALANCE",
            })
        })?;

    // 4. The atomic call; sole source of truth on ambiguous or racy
    // outcomes. The pre-filters above only exist to fail fast.
    match store
        .reserve(user_id, station.id, position.lat, position.lng)
        .await
    {
        Ok(rental_id) => Ok(ReservationSuccess {
            rental_id,
            station_name: station.name,
        }),
        Err(e) => {
            let code = match e.code() {
                Some(code) => code,
                None => {
                    tracing::error!(error = %e, "Reserve call failed with unclassified error");
                    CODE_UNCLASSIFIED
                }
            };
            Err(failure(code))
        }
    }
}

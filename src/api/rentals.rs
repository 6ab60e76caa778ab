use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{get_authenticated_user, require_auth},
    session::AppState,
};
use crate::error::AppError;
use crate::models::Rental;
use crate::services::geofence::{Position, ReportedPosition};
use crate::services::reservation::{self, ReservationFailure};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rentals/reserve", post(reserve))
        .route("/api/rentals/active", get(active_rental))
        .route_layer(middleware::from_fn(require_auth))
}

#[derive(Debug, Deserialize)]
struct ReserveBody {
    station_id: Uuid,
    lat: f64,
    lng: f64,
}

fn failure_status(code: &str) -> StatusCode {
    match code {
        "STATION_NOT_FOUND" => StatusCode::NOT_FOUND,
        "NO_UNITS_AVAILABLE" | "HAS_ACTIVE_RENTAL" => StatusCode::CONFLICT,
        "UNCLASSIFIED" | "WALLET_UNAVAILABLE" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ReservationFailure {
    fn into_response(self) -> Response {
        let status = failure_status(&self.code);
        let body = Json(json!({
            "success": false,
            "code": self.code,
            "message": self.message,
        }));
        (status, body).into_response()
    }
}

/// One user-initiated reservation attempt. The response carries the
/// specific failure code; clients must surface it rather than retry
/// blindly (a slow success may already have created a rental).
async fn reserve(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ReserveBody>,
) -> Response {
    let user = match get_authenticated_user(&session).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let location = ReportedPosition(Position {
        lat: body.lat,
        lng: body.lng,
    });

    match reservation::reserve_unit(
        state.store.as_ref(),
        &location,
        &state.worker,
        user.user_id,
        body.station_id,
    )
    .await
    {
        Ok(success) => Json(json!({
            "success": true,
            "rental_id": success.rental_id,
        }))
        .into_response(),
        Err(failure) => failure.into_response(),
    }
}

/// The caller's active rental, if any. Lets a client that saw a slow or
/// lost response check for a just-created rental instead of retrying
/// the reserve call.
async fn active_rental(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Option<Rental>>, AppError> {
    let user = get_authenticated_user(&session)
        .await
        .map_err(|_| AppError::Unauthorized)?;

    let rental = state
        .store
        .active_rental(user.user_id)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(Json(rental))
}

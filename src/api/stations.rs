use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::{station::is_short_code, Station};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stations/:key", get(lookup_station))
}

/// Looks up an active station by durable id (canonical UUID) or by
/// 4-character short code (case-insensitive). Not-found, inactive and
/// ambiguous short codes all answer the same way.
async fn lookup_station(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Station>, AppError> {
    let station = if let Ok(id) = Uuid::parse_str(&key) {
        state
            .store
            .find_active_station(id)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
    } else if is_short_code(&key) {
        state
            .store
            .find_active_station_by_code(&key)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?
    } else {
        None
    };

    station
        .map(Json)
        .ok_or_else(|| AppError::NotFound("station not found".to_string()))
}

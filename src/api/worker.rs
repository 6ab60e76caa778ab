use axum::{extract::State, http::StatusCode, middleware, routing::post, Json, Router};

use crate::api::middleware::{auth::require_auth, session::AppState};
use crate::worker::WorkerMessage;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/worker/notify", post(post_message))
        .route_layer(middleware::from_fn(require_auth))
}

/// Forwards a structured message from a page into the worker inbox:
/// notification intents plus the SKIP_WAITING / CLIENTS_CLAIM lifecycle
/// overrides. Fire-and-forget; the page does not await display.
async fn post_message(
    State(state): State<AppState>,
    Json(message): Json<WorkerMessage>,
) -> StatusCode {
    state.worker.post(message);
    StatusCode::ACCEPTED
}

use axum::{http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::session::{AppState, SESSION_KEY_USER_ID};

// Identity is an external collaborator; these endpoints only bind an
// already-authenticated user id to the session cookie and clear it
// again. The upstream identity provider fronts them in deployment.

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/session", post(establish).delete(clear))
}

#[derive(Debug, Deserialize)]
struct EstablishBody {
    user_id: Uuid,
}

async fn establish(session: Session, Json(body): Json<EstablishBody>) -> StatusCode {
    match session.insert(SESSION_KEY_USER_ID, body.user_id).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::error!(error = %e, "Failed to establish session");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn clear(session: Session) -> StatusCode {
    match session.flush().await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::error!(error = %e, "Failed to clear session");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

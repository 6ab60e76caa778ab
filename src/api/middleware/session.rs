use std::sync::Arc;

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::store::ReservationStore;
use crate::worker::WorkerHandle;

/// Session keys used in the application
pub const SESSION_KEY_USER_ID: &str = "user_id";

/// Creates a session layer for Axum. Sessions are stored server-side in
/// Postgres; the cookie carries only an opaque id, so no signing key is
/// involved here.
pub async fn create_session_layer(
    pool: PgPool,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    // Create the session store backed by PostgreSQL
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    // Build the session layer
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(true) // Only send over HTTPS in production
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)));

    Ok(session_layer)
}

/// Application state shared by all routes
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub store: Arc<dyn ReservationStore>,
    pub worker: WorkerHandle,
}

use std::{net::SocketAddr, path::Path, sync::Arc};

use axum::{
    routing::{get, get_service},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voltpass::api::middleware::session::{create_session_layer, AppState};
use voltpass::config::Config;
use voltpass::db;
use voltpass::store::PgReservationStore;
use voltpass::worker::{NotificationDispatcher, WorkerHandle, DEFAULT_PRECACHE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voltpass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VoltPass server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let session_layer = create_session_layer(pool.clone()).await?;
    tracing::info!("Session layer initialized");

    // Spawn the notification worker; it outlives any request
    let (worker, inbox) = WorkerHandle::channel();
    let dispatcher = NotificationDispatcher::new(
        &config.base_url,
        &config.cache_version,
        DEFAULT_PRECACHE.iter().map(ToString::to_string).collect(),
    );
    tokio::spawn(dispatcher.run(inbox));
    tracing::info!(version = %config.cache_version, "Notification worker spawned");

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        store: Arc::new(PgReservationStore::new(pool)),
        worker,
    };

    // Serve static assets
    let static_routes = Router::new().nest_service(
        "/static",
        get_service(ServeDir::new(Path::new(&state.config.static_dir))),
    );

    // Build router
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(voltpass::api::auth::router())
        .merge(voltpass::api::stations::router())
        .merge(voltpass::api::rentals::router())
        .merge(voltpass::api::worker::router())
        .merge(static_routes)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}

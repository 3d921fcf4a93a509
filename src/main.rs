//! Mesas bot - conversational exam schedule lookup
//!
//! Serves a chat page whose WebSocket drives one dialogue state machine per
//! connection, answering questions about exam sittings ("mesas") stored in
//! SQLite.

mod api;
mod config;
mod db;
mod normalize;
mod render;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use chrono::Datelike;
use config::ServerConfig;
use db::Database;
use render::HtmlRenderer;
use runtime::{DatabaseSchedule, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mesas_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    if config.seed && db.is_empty()? {
        let year = chrono::Local::now().year();
        tracing::info!(year, "Empty schedule, loading reference data");
        db.seed_reference_data(year)?;
    }

    let sessions = SessionManager::new(
        Arc::new(DatabaseSchedule::new(db)),
        Arc::new(HtmlRenderer),
        config.advance_delay,
    );
    let state = AppState::new(sessions);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        advance_delay = ?config.advance_delay,
        "Mesas bot listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

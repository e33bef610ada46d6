//! HTTP gateway for confab
//!
//! Exposes the orchestrator as a JSON API. `run_server` owns the process
//! lifecycle: it wires the store, completion client and orchestrator together,
//! serves until SIGINT/SIGTERM, then drains background titling tasks.

pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::conversation::Orchestrator;
use crate::providers::{CompletionClient, OpenAiCompatibleClient};
use crate::session::SessionStore;

/// Largest accepted request body
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Upper bound for one request, above the longest chain of completion calls
pub const REQUEST_TIMEOUT_SECS: u64 = 180;

/// How long shutdown waits for in-flight titling tasks
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Builds the API router with body-size, timeout and tracing layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/setup", post(handlers::setup))
        .route("/api/chat", post(handlers::chat))
        .route("/api/session/terminate", post(handlers::terminate))
        .route("/api/session/rename", post(handlers::rename))
        .route("/api/session/delete", post(handlers::delete))
        .route("/api/session/use_persona", post(handlers::use_persona))
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/messages", get(handlers::list_messages))
        .route("/api/personas", get(handlers::list_personas))
        .route("/api/persona", post(handlers::save_persona))
        .route(
            "/api/persona/{id}",
            get(handlers::get_persona).delete(handlers::delete_persona),
        )
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Runs the server until a shutdown signal arrives
pub async fn run_server(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let summary = config.get_safe_summary();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %summary.model,
        listen = %summary.listen,
        in_memory_store = summary.in_memory_store,
        "Starting confab server"
    );

    let store = Arc::new(
        SessionStore::connect(&config.database_url)
            .await
            .context("Failed to open session store")?,
    );

    let client: Arc<dyn CompletionClient> = Arc::new(
        OpenAiCompatibleClient::from_config(&config.provider)
            .context("Failed to create completion client")?,
    );
    info!(
        client = client.client_name(),
        model = client.model(),
        "Completion client initialized"
    );

    let orchestrator = Arc::new(Orchestrator::new(store, client, config.timeouts));
    let app = router(AppState::new(orchestrator.clone()));

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(address = %listener.local_addr()?, "Listening. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped, draining background tasks");
    if !orchestrator
        .titler()
        .shutdown(Duration::from_secs(SHUTDOWN_GRACE_SECS))
        .await
    {
        warn!(
            grace_secs = SHUTDOWN_GRACE_SECS,
            "Background titling tasks did not finish in time"
        );
    }

    info!("confab stopped gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                wait_for_ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
            _ = wait_for_ctrl_c() => {}
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

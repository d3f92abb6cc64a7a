pub mod api;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod style;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::{Config, FileConfigSource};
use crate::coordinator::{Coordinator, State as CoordinatorState};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<Config>,
}

/// Run the server
pub async fn run(config: Config) -> Result<()> {
    let source = Arc::new(FileConfigSource::new(&config.storage.boards_file));
    tracing::info!("Board file: {}", source.path().display());

    let coordinator = Coordinator::start(&config.storage, source)
        .await
        .context("failed to open boards")?;
    let coordinator = Arc::new(coordinator);

    spawn_reload_listener(coordinator.clone())?;

    let config = Arc::new(config);
    let state = AppState {
        coordinator: coordinator.clone(),
        config: config.clone(),
    };
    let app = app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("termboard listening on {}", addr);
    tracing::info!(
        "Max body size: {} bytes, claim timeout: {}s, reload timeout: {}s",
        config.server.max_body_size,
        config.storage.claim_timeout_secs,
        config.storage.reload_timeout_secs
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown().await;
    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.security.cors_origins);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Ready check (claim + partition connectivity)
        .route("/ready", get(ready_check))
        .merge(api::router())
        // Middleware layers (order matters - applied bottom to top)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Readiness check - a claim can be taken and every partition answers
async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let coordinator = &state.coordinator;
    let status = match coordinator.state() {
        CoordinatorState::Ready => "ready",
        CoordinatorState::Refreshing => "refreshing",
    };

    match api::ops::ping(coordinator).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": status, "generation": coordinator.generation() })),
        ),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "generation": coordinator.generation() })),
            )
        }
    }
}

/// Build CORS layer from configuration
fn build_cors_layer(origins: &str) -> CorsLayer {
    if origins == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;

        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Reload the board file on SIGHUP
#[cfg(unix)]
fn spawn_reload_listener(coordinator: Arc<Coordinator>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP, reloading boards...");
            // Outcome is logged by the coordinator
            let _ = coordinator.reload().await;
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_listener(_coordinator: Arc<Coordinator>) -> Result<()> {
    tracing::warn!("SIGHUP reload is not supported on this platform");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tglogger_core::LoggerError;
use tglogger_ingest::HealthReporter;

use crate::handlers;

/// Renders the Prometheus exposition text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub reporter: HealthReporter,
    /// Present only when metrics are enabled.
    pub prometheus_render: Option<MetricsRender>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the router. Every route is unauthenticated and read-only.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(handlers::get_index))
        .route("/health", get(handlers::get_health))
        .route("/stats", get(handlers::get_stats))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), LoggerError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LoggerError::Internal(format!("failed to bind health server to {addr}: {e}")))?;

    tracing::info!("health server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| LoggerError::Internal(format!("health server error: {e}")))?;

    tracing::info!("health server stopped");
    Ok(())
}

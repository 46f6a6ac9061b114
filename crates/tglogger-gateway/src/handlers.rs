// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the health server.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use tglogger_ingest::StatsReport;

use crate::server::GatewayState;

/// Response body for `GET /`.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// GET / - service name and the available endpoints.
pub async fn get_index(State(state): State<GatewayState>) -> Json<IndexResponse> {
    let mut endpoints = vec!["/", "/health", "/stats"];
    if state.prometheus_render.is_some() {
        endpoints.push("/metrics");
    }
    Json(IndexResponse {
        service: "tglogger",
        version: env!("CARGO_PKG_VERSION"),
        endpoints,
    })
}

/// GET /health - full health report; 503 when unhealthy, same body.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let report = state.reporter.health().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// GET /stats
pub async fn get_stats(State(state): State<GatewayState>) -> Json<StatsReport> {
    Json(state.reporter.stats())
}

/// GET /metrics - Prometheus text format, or 404 when metrics are disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}

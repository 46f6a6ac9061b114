// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP health server for tglogger.
//!
//! Exposes `/` (endpoint listing), `/health` (200 or 503), `/stats`, and
//! `/metrics` (Prometheus text, when enabled) over axum.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, MetricsRender, ServerConfig, router, start_server};

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics exporter for tglogger.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text through [`PrometheusAdapter::render`], which
//! the health server exposes at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use tglogger_core::{AdapterType, HealthStatus, LoggerError, PluginAdapter};

pub use recording::{
    record_actions_stored, record_backfilled, record_errors, record_messages_stored,
    record_skipped, set_memory_heap, set_memory_resident, set_memory_rss, set_queue_depth,
};

/// Installs the Prometheus recorder and keeps the handle used for rendering.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the recorder globally.
    ///
    /// Only one recorder can exist per process; a second call fails.
    pub fn new() -> Result<Self, LoggerError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            LoggerError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, LoggerError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}

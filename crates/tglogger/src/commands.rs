// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: `backfill`, `status`, `prune`, and `config check`.
//!
//! Each prints a JSON (or TOML, for config) document on stdout so the
//! output can be piped into other tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tglogger_config::LoggerConfig;
use tglogger_core::{Checkpoint, LoggerError};
use tglogger_ingest::{BackfillStatus, shutdown};
use tglogger_storage::{PostgrestClient, PruneReport, SinkStatistics};
use tglogger_telegram::{ConfigAdmissionFilter, TelegramSource};

use crate::services::Services;

/// Output of `tglogger status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub statistics: SinkStatistics,
    pub checkpoints: Vec<Checkpoint>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, LoggerError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| LoggerError::Internal(format!("failed to serialize output: {e}")))
}

fn connect(config: &LoggerConfig, shutdown: &CancellationToken) -> Result<Services, LoggerError> {
    let client = Arc::new(PostgrestClient::new(&config.sink)?);
    let source = Arc::new(TelegramSource::new(config.telegram.clone())?);
    let filter = Arc::new(ConfigAdmissionFilter::new(&config.telegram));
    Ok(Services::assemble(config, client, source, filter, shutdown))
}

/// Run `tglogger backfill --chat <id>...`.
pub async fn run_backfill(config: &LoggerConfig, chats: &[i64]) -> Result<(), LoggerError> {
    let cancel = shutdown::install_signal_handler();
    let services = connect(config, &cancel)?;
    services.adapter.initialize().await?;
    let report = backfill_chats(&services, chats, &cancel).await;
    services.shutdown().await?;
    println!("{}", to_json(&report)?);
    Ok(())
}

/// Backfill `chats` one after another, stopping early once `cancel` fires.
///
/// Runs share the platform's single history cursor, so they never overlap.
/// `cancel` must be the token the services were assembled with so that it
/// also stops the run in flight.
pub async fn backfill_chats(
    services: &Services,
    chats: &[i64],
    cancel: &CancellationToken,
) -> BTreeMap<i64, BackfillStatus> {
    for &chat_id in chats {
        if cancel.is_cancelled() {
            break;
        }
        match services.backfill.run(chat_id).await {
            Ok(status) => info!(chat_id, processed = status.processed, state = ?status.state, "backfill finished"),
            Err(e) => warn!(chat_id, error = %e, "backfill did not run"),
        }
    }
    services.backfill.statuses()
}

/// Run `tglogger status`.
pub async fn run_status(config: &LoggerConfig) -> Result<(), LoggerError> {
    let services = connect(config, &CancellationToken::new())?;
    let report = status_report(&services).await?;
    services.adapter.close().await?;
    println!("{}", to_json(&report)?);
    Ok(())
}

pub async fn status_report(services: &Services) -> Result<StatusReport, LoggerError> {
    services.adapter.initialize().await?;
    Ok(StatusReport {
        statistics: services.adapter.statistics().await?,
        checkpoints: services.checkpoints.list().await?,
    })
}

/// Run `tglogger prune`, defaulting to `maintenance.retention_days`.
pub async fn run_prune(config: &LoggerConfig, days: Option<u32>) -> Result<(), LoggerError> {
    let services = connect(config, &CancellationToken::new())?;
    let report = prune(&services, days.unwrap_or(config.maintenance.retention_days)).await?;
    services.adapter.close().await?;
    println!("{}", to_json(&report)?);
    Ok(())
}

pub async fn prune(services: &Services, days: u32) -> Result<PruneReport, LoggerError> {
    if days == 0 {
        return Err(LoggerError::Config("prune needs at least one day of retention".into()));
    }
    services.adapter.initialize().await?;
    let report = services.adapter.prune_older_than(days).await?;
    info!(
        days,
        messages = report.messages_deleted,
        actions = report.actions_deleted,
        "pruned old records"
    );
    Ok(report)
}

/// Render the effective configuration as TOML with credentials redacted.
pub fn render_config(config: &LoggerConfig) -> Result<String, LoggerError> {
    toml::to_string_pretty(&config.redacted())
        .map_err(|e| LoggerError::Internal(format!("failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tglogger_core::AcceptAll;
    use tglogger_test_utils::fixtures::text_event;
    use tglogger_test_utils::{MockSink, MockSource};

    fn services(sink: Arc<MockSink>, source: Arc<MockSource>) -> Services {
        let mut config = LoggerConfig::default();
        config.backfill.delay_secs = 0.0;
        Services::assemble(&config, sink, source, Arc::new(AcceptAll), &CancellationToken::new())
    }

    #[tokio::test]
    async fn backfill_reports_each_chat() {
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());
        source
            .add_history(vec![text_event(-1, 1), text_event(-1, 2), text_event(-2, 7)])
            .await;
        let services = services(sink.clone(), source);

        let report = backfill_chats(&services, &[-1, -2], &CancellationToken::new()).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report[&-1i64].processed, 2);
        assert_eq!(report[&-2i64].processed, 1);
        assert_eq!(sink.rows("telegram_messages").len(), 3);
    }

    #[tokio::test]
    async fn status_lists_counts_and_checkpoints() {
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());
        source.add_history(vec![text_event(-5, 1)]).await;
        let services = services(sink.clone(), source);
        backfill_chats(&services, &[-5], &CancellationToken::new()).await;

        let report = status_report(&services).await.unwrap();
        assert_eq!(report.statistics.total_messages, 1);
        assert_eq!(report.checkpoints.len(), 1);
        assert_eq!(report.checkpoints[0].checkpoint_id, "backfill_-5");
    }

    #[tokio::test]
    async fn cancelled_backfill_skips_remaining_chats() {
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());
        source.add_history(vec![text_event(-1, 1)]).await;
        let services = services(sink.clone(), source);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = backfill_chats(&services, &[-1], &cancel).await;
        assert!(report.is_empty());
        assert!(sink.rows("telegram_messages").is_empty());
    }

    #[tokio::test]
    async fn prune_rejects_zero_days() {
        let services = services(Arc::new(MockSink::new()), Arc::new(MockSource::new()));
        assert!(matches!(
            prune(&services, 0).await,
            Err(LoggerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn prune_deletes_old_messages() {
        let sink = Arc::new(MockSink::new());
        sink.seed(
            "telegram_messages",
            vec![
                json!({"chat_id": 1, "message_id": 1, "date": "2001-01-01T00:00:00+00:00"}),
                json!({"chat_id": 1, "message_id": 2, "date": "2999-01-01T00:00:00+00:00"}),
            ],
        );
        let services = services(sink.clone(), Arc::new(MockSource::new()));

        let report = prune(&services, 30).await.unwrap();
        assert_eq!(report.messages_deleted, 1);
        assert_eq!(sink.rows("telegram_messages").len(), 1);
    }

    #[test]
    fn rendered_config_hides_credentials() {
        let mut config = LoggerConfig::default();
        config.telegram.bot_token = Some("123:secret".into());
        config.sink.api_key = Some("key-secret".into());

        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("batch_size = 5"));
    }
}

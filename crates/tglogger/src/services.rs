// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring shared by every command.
//!
//! [`Services`] owns one instance of each pipeline component over a sink
//! client and an event source. `serve` uses all of them; the one-shot
//! commands use the adapter, checkpoints, and backfill controller.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tglogger_config::LoggerConfig;
use tglogger_core::{AdmissionFilter, EventSource, LoggerError, SinkClient};
use tglogger_ingest::{
    BackfillController, BackfillDeps, BatchQueue, DedupTracker, HealthReporter, IngestPipeline,
    IngestStats,
};
use tglogger_storage::{CheckpointManager, SinkAdapter};

pub struct Services {
    pub adapter: Arc<SinkAdapter>,
    pub checkpoints: CheckpointManager,
    pub stats: Arc<IngestStats>,
    pub queue: Arc<BatchQueue>,
    pub pipeline: Arc<IngestPipeline>,
    pub backfill: BackfillController,
    pub reporter: HealthReporter,
    pub source: Arc<dyn EventSource>,
}

impl Services {
    /// Wire every component. Backfill runs stop when `shutdown` fires.
    pub fn assemble(
        config: &LoggerConfig,
        client: Arc<dyn SinkClient>,
        source: Arc<dyn EventSource>,
        filter: Arc<dyn AdmissionFilter>,
        shutdown: &CancellationToken,
    ) -> Self {
        let adapter = Arc::new(SinkAdapter::new(client, config));
        let checkpoints = CheckpointManager::new(adapter.clone());
        let stats = Arc::new(IngestStats::new());
        let dedup = Arc::new(DedupTracker::from_config(&config.dedup));
        let queue = Arc::new(BatchQueue::new(
            &config.queue,
            adapter.clone(),
            checkpoints.clone(),
            stats.clone(),
        ));
        let pipeline = Arc::new(IngestPipeline::new(
            dedup.clone(),
            filter.clone(),
            queue.clone(),
            adapter.clone(),
            stats.clone(),
        ));
        let backfill = BackfillController::new(
            config.backfill.clone(),
            BackfillDeps {
                source: source.clone(),
                sink: adapter.clone(),
                checkpoints: checkpoints.clone(),
                dedup,
                filter,
                stats: stats.clone(),
            },
            shutdown,
        );
        let reporter = HealthReporter::new(
            adapter.clone(),
            source.clone(),
            queue.clone(),
            pipeline.clone(),
            backfill.clone(),
            stats.clone(),
        );

        Self {
            adapter,
            checkpoints,
            stats,
            queue,
            pipeline,
            backfill,
            reporter,
            source,
        }
    }

    /// Cancel backfills, drain the queues, stop the source, close the sink.
    ///
    /// Intake must already be stopped. Every step runs even when an
    /// earlier one fails.
    pub async fn shutdown(&self) -> Result<(), LoggerError> {
        self.backfill.shutdown().await;

        let (events, actions) = self.queue.drain().await;
        info!(events, actions, "queues drained");

        if let Err(e) = self.source.shutdown().await {
            warn!(error = %e, "event source shutdown failed");
        }
        self.adapter.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tglogger_core::{AcceptAll, CheckpointKind};
    use tglogger_test_utils::fixtures::{text_event, update};
    use tglogger_test_utils::{MockSink, MockSource};

    fn assemble_with_signal(
        sink: Arc<MockSink>,
        source: Arc<MockSource>,
        signal: &CancellationToken,
    ) -> Services {
        let mut config = LoggerConfig::default();
        config.backfill.delay_secs = 0.0;
        config.backfill.page_size = 1;
        Services::assemble(&config, sink, source, Arc::new(AcceptAll), signal)
    }

    fn assemble(sink: Arc<MockSink>, source: Arc<MockSource>) -> Services {
        assemble_with_signal(sink, source, &CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_a_running_backfill() {
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());
        source
            .add_history((1..=6).map(|id| text_event(-7, id)).collect())
            .await;
        source.set_fetch_delay(Duration::from_secs(5)).await;
        let signal = CancellationToken::new();
        let services = assemble_with_signal(sink.clone(), source, &signal);

        let run = tokio::spawn({
            let backfill = services.backfill.clone();
            async move { backfill.run(-7).await }
        });
        tokio::time::sleep(Duration::from_secs(6)).await;
        signal.cancel();

        let status = run.await.unwrap().unwrap();
        assert!(status.processed < 6);
        assert!(sink.rows("telegram_messages").len() < 6);
        let checkpoint = services
            .checkpoints
            .get(CheckpointKind::Backfill, Some(-7))
            .await
            .unwrap()
            .unwrap();
        assert!(!checkpoint.backfill_in_progress);
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_events_before_closing() {
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());
        let services = assemble(sink.clone(), source.clone());
        services.adapter.initialize().await.unwrap();

        services.pipeline.ingest(update(-100, 1)).await;
        services.pipeline.ingest(update(-100, 2)).await;
        assert!(sink.rows("telegram_messages").is_empty());

        services.shutdown().await.unwrap();

        assert_eq!(sink.rows("telegram_messages").len(), 2);
        assert!(!source.is_connected());
        assert!(!services.adapter.is_connected());
        let checkpoint = services
            .checkpoints
            .get(CheckpointKind::Message, Some(-100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_processed_id, Some(2));
    }

    #[tokio::test]
    async fn shutdown_without_activity_is_clean() {
        let services = assemble(Arc::new(MockSink::new()), Arc::new(MockSource::new()));
        services.shutdown().await.unwrap();
    }
}

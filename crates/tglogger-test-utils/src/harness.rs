// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` wires the real pipeline, queue, backfill controller, and
//! health reporter to a [`MockSink`] and a [`MockSource`]. Retries never
//! sleep and backfill delays default to zero.

use std::sync::Arc;
use std::time::Duration;

use tglogger_config::LoggerConfig;
use tglogger_core::{AcceptAll, AdmissionFilter, Checkpoint, CheckpointKind, EventSource, LoggerError};
use tglogger_ingest::{
    BackfillController, BackfillDeps, BatchQueue, DedupTracker, HealthReporter, IngestPipeline,
    IngestStats,
};
use tglogger_resilience::RetryPolicy;
use tglogger_storage::{CheckpointManager, SinkAdapter};
use tokio_util::sync::CancellationToken;

use crate::mock_sink::MockSink;
use crate::mock_source::MockSource;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: LoggerConfig,
    filter: Arc<dyn AdmissionFilter>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = LoggerConfig::default();
        config.backfill.delay_secs = 0.0;
        Self {
            config,
            filter: Arc::new(AcceptAll),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.queue.batch_size = batch_size;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue.max_queue_size = capacity;
        self
    }

    /// Adjust any part of the configuration.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut LoggerConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn AdmissionFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn build(self) -> TestHarness {
        let config = self.config;
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());

        let adapter = Arc::new(SinkAdapter::with_policy(
            sink.clone(),
            config.sink.tables.clone(),
            RetryPolicy::immediate(config.retry.max_attempts),
            Duration::from_secs(config.maintenance.stats_cache_secs),
        ));
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
            self.filter.clone(),
            queue.clone(),
            adapter.clone(),
            stats.clone(),
        ));
        let source_dyn: Arc<dyn EventSource> = source.clone();
        let shutdown = CancellationToken::new();
        let backfill = BackfillController::new(
            config.backfill.clone(),
            BackfillDeps {
                source: source_dyn.clone(),
                sink: adapter.clone(),
                checkpoints: checkpoints.clone(),
                dedup: dedup.clone(),
                filter: self.filter,
                stats: stats.clone(),
            },
            &shutdown,
        );
        let reporter = HealthReporter::new(
            adapter.clone(),
            source_dyn,
            queue.clone(),
            pipeline.clone(),
            backfill.clone(),
            stats.clone(),
        );

        TestHarness {
            config,
            sink,
            source,
            adapter,
            checkpoints,
            stats,
            dedup,
            queue,
            pipeline,
            backfill,
            reporter,
            shutdown,
        }
    }
}

/// A complete pipeline over mock collaborators.
pub struct TestHarness {
    pub config: LoggerConfig,
    /// In-memory store behind the adapter.
    pub sink: Arc<MockSink>,
    /// Scripted platform.
    pub source: Arc<MockSource>,
    pub adapter: Arc<SinkAdapter>,
    pub checkpoints: CheckpointManager,
    pub stats: Arc<IngestStats>,
    pub dedup: Arc<DedupTracker>,
    pub queue: Arc<BatchQueue>,
    pub pipeline: Arc<IngestPipeline>,
    pub backfill: BackfillController,
    pub reporter: HealthReporter,
    /// Process-wide shutdown signal, as the signal handler would fire it.
    pub shutdown: CancellationToken,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Stored rows of the messages table.
    pub fn stored_messages(&self) -> Vec<serde_json::Value> {
        self.sink.rows(&self.config.sink.tables.messages)
    }

    pub fn stored_actions(&self) -> Vec<serde_json::Value> {
        self.sink.rows(&self.config.sink.tables.actions)
    }

    pub async fn checkpoint(
        &self,
        kind: CheckpointKind,
        scope: i64,
    ) -> Result<Option<Checkpoint>, LoggerError> {
        self.checkpoints.get(kind, Some(scope)).await
    }
}

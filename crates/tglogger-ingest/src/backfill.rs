// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resumable historical ingestion, one task per chat.
//!
//! Each scope moves `Idle -> Running -> {Completed, Failed}` and back to
//! idle bookkeeping when the run ends. At most one run per scope exists at
//! a time. A run resumes after the newest stored message of its scope,
//! writes a `backfill` checkpoint every `chunk_size` stored items, and
//! always clears `backfill_in_progress` when it ends, whatever the reason.
//!
//! Cancellation is observed between pages and during delays, never in the
//! middle of a page fetch.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use tglogger_config::model::BackfillConfig;
use tglogger_core::{
    AdmissionFilter, CheckpointKind, CheckpointUpdate, EventSource, LoggerError,
};
use tglogger_storage::{CheckpointManager, SinkAdapter};

use crate::dedup::DedupTracker;
use crate::stats::IngestStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Last known state of one scope's backfill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillStatus {
    pub state: BackfillState,
    pub processed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl BackfillStatus {
    fn running(now: DateTime<Utc>) -> Self {
        Self {
            state: BackfillState::Running,
            processed: 0,
            started_at: Some(now),
            finished_at: None,
            error: None,
        }
    }
}

/// Why a run's loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    Exhausted,
    Cancelled,
}

/// Collaborators a backfill run needs.
pub struct BackfillDeps {
    pub source: Arc<dyn EventSource>,
    pub sink: Arc<SinkAdapter>,
    pub checkpoints: CheckpointManager,
    pub dedup: Arc<DedupTracker>,
    pub filter: Arc<dyn AdmissionFilter>,
    pub stats: Arc<IngestStats>,
}

struct Inner {
    config: BackfillConfig,
    deps: BackfillDeps,
    cancel: CancellationToken,
    running: Mutex<HashSet<i64>>,
    statuses: Mutex<BTreeMap<i64, BackfillStatus>>,
}

#[derive(Clone)]
pub struct BackfillController {
    inner: Arc<Inner>,
    tracker: TaskTracker,
}

impl BackfillController {
    /// Runs stop when `shutdown` fires or when [`shutdown`](Self::shutdown)
    /// is called, whichever comes first.
    pub fn new(config: BackfillConfig, deps: BackfillDeps, shutdown: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                deps,
                cancel: shutdown.child_token(),
                running: Mutex::new(HashSet::new()),
                statuses: Mutex::new(BTreeMap::new()),
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a run for `scope`. Returns `false` with a warning when one is
    /// already running.
    pub fn start(&self, scope: i64) -> bool {
        self.spawn(scope).is_some()
    }

    /// Start a run for `scope` and wait for it to finish.
    pub async fn run(&self, scope: i64) -> Result<BackfillStatus, LoggerError> {
        let handle = self
            .spawn(scope)
            .ok_or(LoggerError::BackfillRunning { scope })?;
        handle
            .await
            .map_err(|e| LoggerError::Internal(format!("backfill task for chat {scope} panicked: {e}")))
    }

    fn spawn(&self, scope: i64) -> Option<JoinHandle<BackfillStatus>> {
        let Ok(mut running) = self.inner.running.lock() else {
            return None;
        };
        if !running.insert(scope) {
            warn!(chat_id = scope, "backfill already in progress");
            return None;
        }
        self.inner.set_status(scope, BackfillStatus::running(Utc::now()));

        let inner = self.inner.clone();
        Some(self.tracker.spawn(async move { inner.run_scope(scope).await }))
    }

    pub fn is_running(&self, scope: i64) -> bool {
        self.inner
            .running
            .lock()
            .map(|running| running.contains(&scope))
            .unwrap_or(false)
    }

    pub fn running_count(&self) -> usize {
        self.inner.running.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn statuses(&self) -> BTreeMap<i64, BackfillStatus> {
        self.inner
            .statuses
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Cancel every run and wait for all of them to finish their
    /// termination step.
    pub async fn shutdown(&self) {
        let live = self.running_count();
        if live > 0 {
            info!(count = live, "cancelling backfills");
        }
        self.inner.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("all backfill tasks finished");
    }
}

impl Inner {
    fn set_status(&self, scope: i64, status: BackfillStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(scope, status);
        }
    }

    fn set_processed(&self, scope: i64, processed: u64) {
        if let Ok(mut statuses) = self.statuses.lock() {
            if let Some(status) = statuses.get_mut(&scope) {
                status.processed = processed;
            }
        }
    }

    async fn run_scope(&self, scope: i64) -> BackfillStatus {
        info!(chat_id = scope, "starting backfill");
        let mut processed = 0u64;
        let outcome = self.backfill_loop(scope, &mut processed).await;

        let (state, error) = match outcome {
            Ok(LoopEnd::Exhausted) => {
                info!(chat_id = scope, processed, "backfill completed");
                (BackfillState::Completed, None)
            }
            Ok(LoopEnd::Cancelled) => {
                info!(chat_id = scope, processed, "backfill cancelled");
                (BackfillState::Completed, None)
            }
            Err(e) => {
                error!(chat_id = scope, processed, error = %e, "backfill failed");
                self.deps.stats.record_error("backfill");
                (BackfillState::Failed, Some(e.to_string()))
            }
        };

        let finished_at = Utc::now();
        let closing = CheckpointUpdate {
            backfill_in_progress: Some(false),
            last_backfill_completed: Some(finished_at),
            ..CheckpointUpdate::default()
        };
        if let Err(e) = self
            .deps
            .checkpoints
            .update(CheckpointKind::Backfill, Some(scope), closing)
            .await
        {
            error!(chat_id = scope, error = %e, "failed to write final backfill checkpoint");
            self.deps.stats.record_error("checkpoint");
        }

        let started_at = self
            .statuses
            .lock()
            .ok()
            .and_then(|s| s.get(&scope).and_then(|st| st.started_at));
        let status = BackfillStatus {
            state,
            processed,
            started_at,
            finished_at: Some(finished_at),
            error,
        };
        self.set_status(scope, status.clone());
        if let Ok(mut running) = self.running.lock() {
            running.remove(&scope);
        }
        status
    }

    async fn backfill_loop(&self, scope: i64, processed: &mut u64) -> Result<LoopEnd, LoggerError> {
        let deps = &self.deps;
        deps.checkpoints
            .update(
                CheckpointKind::Backfill,
                Some(scope),
                CheckpointUpdate {
                    backfill_in_progress: Some(true),
                    ..CheckpointUpdate::default()
                },
            )
            .await?;

        let mut cursor = deps.sink.last_event_id(scope).await?.unwrap_or(0);
        let cutoff = self
            .config
            .max_age_days
            .map(|days| Utc::now() - chrono::Duration::days(i64::from(days)));
        let chunk_size = self.config.chunk_size.max(1) as u64;
        let delay = Duration::from_secs_f64(self.config.delay_secs.max(0.0));

        debug!(chat_id = scope, cursor, ?cutoff, "backfill resume point");

        loop {
            if self.cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }

            let page = deps
                .source
                .fetch_history(scope, cursor, self.config.page_size.max(1))
                .await?;
            if page.is_empty() {
                return Ok(LoopEnd::Exhausted);
            }

            let page_start = cursor;
            for mut item in page {
                cursor = cursor.max(item.message_id);

                if item.scope() != scope {
                    continue;
                }
                if cutoff.is_some_and(|limit| item.date < limit) {
                    continue;
                }
                let key = item.dedup_key();
                if deps.dedup.seen(&key) {
                    deps.stats.record_duplicate();
                    continue;
                }
                if !deps.filter.should_process(&item) {
                    deps.stats.record_filtered();
                    continue;
                }

                item.is_backfilled = true;
                if let Err(e) = deps.sink.store_event(&item).await {
                    warn!(
                        chat_id = scope,
                        message_id = item.message_id,
                        error = %e,
                        "failed to store backfilled message"
                    );
                    deps.stats.record_error("backfill_store");
                    continue;
                }

                deps.dedup.mark(&key);
                deps.stats.record_backfilled();
                *processed += 1;
                self.set_processed(scope, *processed);

                if *processed % chunk_size == 0 {
                    deps.checkpoints
                        .update(
                            CheckpointKind::Backfill,
                            Some(scope),
                            CheckpointUpdate {
                                last_processed_id: Some(item.message_id),
                                last_processed_timestamp: Some(item.date),
                                total_processed: Some(*processed as i64),
                                ..CheckpointUpdate::default()
                            },
                        )
                        .await?;
                    if self.pause(delay).await {
                        return Ok(LoopEnd::Cancelled);
                    }
                }
            }

            if cursor <= page_start {
                warn!(chat_id = scope, cursor, "history page did not advance the cursor, stopping");
                return Ok(LoopEnd::Exhausted);
            }
            if self.pause(delay).await {
                return Ok(LoopEnd::Cancelled);
            }
        }
    }

    /// Sleep for `delay`. Returns true when cancelled first.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

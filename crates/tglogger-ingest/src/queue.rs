// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two bounded FIFO buffers in front of the sink.
//!
//! Events flush in batches of `batch_size` through one upsert; actions
//! flush one insert per action. Either queue flushes itself when it
//! reaches `batch_size`, and the serve loop flushes both on a timer.
//! A full queue evicts its oldest item to admit the newest.
//!
//! One flush per queue runs at a time. A failed event batch is logged,
//! counted, and dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tglogger_config::model::QueueConfig;
use tglogger_core::{ActionRecord, CheckpointKind, EventRecord};
use tglogger_storage::{CheckpointManager, SinkAdapter};

use crate::stats::IngestStats;

/// Fraction of capacity at which a queue reports itself full.
pub const FULL_THRESHOLD: f64 = 0.9;

pub struct BatchQueue {
    events: StdMutex<VecDeque<EventRecord>>,
    actions: StdMutex<VecDeque<ActionRecord>>,
    event_flush: Mutex<()>,
    action_flush: Mutex<()>,
    batch_size: usize,
    capacity: usize,
    sink: Arc<SinkAdapter>,
    checkpoints: CheckpointManager,
    stats: Arc<IngestStats>,
}

/// Current queue depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepths {
    pub events: usize,
    pub actions: usize,
}

impl BatchQueue {
    pub fn new(
        config: &QueueConfig,
        sink: Arc<SinkAdapter>,
        checkpoints: CheckpointManager,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            events: StdMutex::new(VecDeque::new()),
            actions: StdMutex::new(VecDeque::new()),
            event_flush: Mutex::new(()),
            action_flush: Mutex::new(()),
            batch_size: config.batch_size.max(1),
            capacity: config.max_queue_size.max(1),
            sink,
            checkpoints,
            stats,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            events: self.events.lock().map(|q| q.len()).unwrap_or(0),
            actions: self.actions.lock().map(|q| q.len()).unwrap_or(0),
        }
    }

    /// Whether `len` is at or above 90% of capacity.
    pub fn is_full(&self, len: usize) -> bool {
        len as f64 >= self.capacity as f64 * FULL_THRESHOLD
    }

    /// Queue an event, flushing one batch when the queue reaches `batch_size`.
    pub async fn enqueue_event(&self, record: EventRecord) {
        let len = self.push(&self.events, record, "event");
        if len >= self.batch_size {
            self.flush_events().await;
        }
    }

    /// Queue an action, flushing the action queue when it reaches `batch_size`.
    pub async fn enqueue_action(&self, record: ActionRecord) {
        let len = self.push(&self.actions, record, "action");
        if len >= self.batch_size {
            self.flush_actions().await;
        }
    }

    fn push<T>(&self, queue: &StdMutex<VecDeque<T>>, item: T, kind: &'static str) -> usize {
        let Ok(mut queue) = queue.lock() else {
            self.stats.record_error("enqueue");
            return 0;
        };
        let mut evicted = 0u64;
        while queue.len() >= self.capacity {
            queue.pop_front();
            evicted += 1;
        }
        queue.push_back(item);
        let len = queue.len();
        drop(queue);

        if evicted > 0 {
            self.stats.record_dropped(evicted);
            warn!(kind, evicted, capacity = self.capacity, "queue full, evicted oldest");
        }
        report_depth(kind, len);
        len
    }

    /// Upsert up to `batch_size` queued events in one sink call, then advance
    /// the `message` checkpoint of every scope in the batch. Returns the
    /// number stored.
    pub async fn flush_events(&self) -> usize {
        let _flushing = self.event_flush.lock().await;

        let (batch, remaining): (Vec<EventRecord>, usize) = match self.events.lock() {
            Ok(mut queue) => {
                let take = queue.len().min(self.batch_size);
                let batch = queue.drain(..take).collect();
                (batch, queue.len())
            }
            Err(_) => return 0,
        };
        report_depth("event", remaining);
        if batch.is_empty() {
            return 0;
        }

        debug!(size = batch.len(), "flushing event batch");
        let progress = match self.sink.store_events_with_progress(&batch).await {
            Ok(progress) => progress,
            Err(e) => {
                error!(size = batch.len(), error = %e, "event batch failed, dropping it");
                self.stats.record_error("flush_events");
                return 0;
            }
        };

        self.stats.record_messages(progress.stored);
        self.stats
            .record_errors("convert_event", progress.skipped as u64);

        for (scope, scope_progress) in &progress.scopes {
            if let Err(e) = self
                .checkpoints
                .advance(
                    CheckpointKind::Message,
                    Some(*scope),
                    scope_progress.last_message_id,
                    scope_progress.last_date,
                    scope_progress.stored as i64,
                )
                .await
            {
                warn!(chat_id = scope, error = %e, "failed to advance message checkpoint");
                self.stats.record_error("checkpoint");
            }
        }

        debug!(stored = progress.stored, skipped = progress.skipped, "event batch flushed");
        progress.stored
    }

    /// Insert every queued action individually. Returns the number stored.
    pub async fn flush_actions(&self) -> usize {
        let _flushing = self.action_flush.lock().await;

        let pending: Vec<ActionRecord> = match self.actions.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => return 0,
        };
        report_depth("action", 0);

        let mut stored = 0;
        for action in &pending {
            match self.sink.store_action(action).await {
                Ok(()) => {
                    stored += 1;
                    self.stats.record_action();
                }
                Err(e) => {
                    error!(
                        action_type = %action.action_type,
                        chat_id = action.chat_id,
                        error = %e,
                        "failed to store action"
                    );
                    self.stats.record_error("flush_actions");
                }
            }
        }

        if stored > 0 {
            debug!(stored, "action queue flushed");
        }
        stored
    }

    /// Timer-driven flush: one event batch, then all actions.
    pub async fn flush(&self) -> (usize, usize) {
        let events = self.flush_events().await;
        let actions = self.flush_actions().await;
        (events, actions)
    }

    /// Flush until both queues are empty. Used at shutdown.
    pub async fn drain(&self) -> (usize, usize) {
        let depths = self.depths();
        if depths.events > 0 || depths.actions > 0 {
            info!(events = depths.events, actions = depths.actions, "draining queues");
        }

        let mut events = 0;
        while self.depths().events > 0 {
            events += self.flush_events().await;
        }
        let actions = self.flush_actions().await;
        (events, actions)
    }
}

/// Mirror a queue's depth to the `tglogger_queue_depth` gauge.
fn report_depth(kind: &'static str, len: usize) {
    #[cfg(feature = "prometheus")]
    tglogger_prometheus::recording::set_queue_depth(kind, len as f64);
    #[cfg(not(feature = "prometheus"))]
    let _ = (kind, len);
}

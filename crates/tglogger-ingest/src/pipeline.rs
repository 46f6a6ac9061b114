// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live ingestion path: dedup, admission, identities, then the queue.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use tglogger_core::{AdmissionFilter, InboundUpdate};
use tglogger_storage::SinkAdapter;

use crate::dedup::DedupTracker;
use crate::queue::BatchQueue;
use crate::stats::IngestStats;

/// What happened to one inbound update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Queued,
    Duplicate,
    Filtered,
}

pub struct IngestPipeline {
    dedup: Arc<DedupTracker>,
    filter: Arc<dyn AdmissionFilter>,
    queue: Arc<BatchQueue>,
    sink: Arc<SinkAdapter>,
    stats: Arc<IngestStats>,
    scopes: Mutex<HashSet<i64>>,
}

impl IngestPipeline {
    pub fn new(
        dedup: Arc<DedupTracker>,
        filter: Arc<dyn AdmissionFilter>,
        queue: Arc<BatchQueue>,
        sink: Arc<SinkAdapter>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            dedup,
            filter,
            queue,
            sink,
            stats,
            scopes: Mutex::new(HashSet::new()),
        }
    }

    /// Handle one update from the source.
    pub async fn ingest(&self, update: InboundUpdate) -> IngestOutcome {
        let key = update.event.dedup_key();

        if self.dedup.seen(&key) {
            debug!(key = %key, "duplicate event skipped");
            self.stats.record_duplicate();
            return IngestOutcome::Duplicate;
        }
        if !self.filter.should_process(&update.event) {
            debug!(key = %key, "event rejected by admission filter");
            self.stats.record_filtered();
            return IngestOutcome::Filtered;
        }
        self.dedup.mark(&key);

        if let Ok(mut scopes) = self.scopes.lock() {
            scopes.insert(update.event.scope());
        }

        self.store_identities(&update).await;

        let InboundUpdate { event, actions, .. } = update;
        self.queue.enqueue_event(event).await;
        for action in actions {
            self.queue.enqueue_action(action).await;
        }
        IngestOutcome::Queued
    }

    async fn store_identities(&self, update: &InboundUpdate) {
        if let Err(e) = self.sink.upsert_chat(&update.chat).await {
            warn!(chat_id = update.chat.chat_id, error = %e, "failed to store chat info");
            self.stats.record_error("upsert_chat");
        }
        let Some(user) = &update.sender else {
            return;
        };
        if let Err(e) = self.sink.upsert_user(user).await {
            warn!(user_id = user.user_id, error = %e, "failed to store user info");
            self.stats.record_error("upsert_user");
        }
    }

    /// Number of distinct chats seen since start.
    pub fn chat_count(&self) -> usize {
        self.scopes.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn known_chats(&self) -> Vec<i64> {
        let mut chats: Vec<i64> = self
            .scopes
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        chats.sort_unstable();
        chats
    }
}

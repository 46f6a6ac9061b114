// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide counters shared by the pipeline, queue, and backfill.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[cfg(feature = "prometheus")]
use tglogger_prometheus::recording;

/// Lock-free counters. Every failure path increments `errors`.
#[derive(Debug)]
pub struct IngestStats {
    started: Instant,
    started_at: DateTime<Utc>,
    messages_processed: AtomicU64,
    actions_processed: AtomicU64,
    errors: AtomicU64,
    duplicates_skipped: AtomicU64,
    filtered: AtomicU64,
    dropped_on_overflow: AtomicU64,
    backfilled: AtomicU64,
    memory_usage_bytes: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsCounters {
    pub messages_processed: u64,
    pub actions_processed: u64,
    pub errors: u64,
    pub duplicates_skipped: u64,
    pub filtered: u64,
    pub dropped_on_overflow: u64,
    pub backfilled: u64,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            messages_processed: AtomicU64::new(0),
            actions_processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            duplicates_skipped: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            dropped_on_overflow: AtomicU64::new(0),
            backfilled: AtomicU64::new(0),
            memory_usage_bytes: AtomicU64::new(0),
        }
    }

    pub fn record_messages(&self, count: usize) {
        self.messages_processed.fetch_add(count as u64, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_messages_stored(count as u64);
    }

    pub fn record_action(&self) {
        self.actions_processed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_actions_stored(1);
    }

    /// Count a failure. `stage` labels the metric and nothing else.
    pub fn record_error(&self, stage: &'static str) {
        self.record_errors(stage, 1);
    }

    pub fn record_errors(&self, stage: &'static str, count: u64) {
        if count == 0 {
            return;
        }
        self.errors.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_errors(stage, count);
        #[cfg(not(feature = "prometheus"))]
        let _ = stage;
    }

    pub fn record_duplicate(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_skipped("duplicate", 1);
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_skipped("filtered", 1);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped_on_overflow.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_skipped("overflow", count);
    }

    pub fn record_backfilled(&self) {
        self.backfilled.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        recording::record_backfilled(1);
    }

    pub fn set_memory_usage(&self, bytes: u64) {
        self.memory_usage_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn memory_usage_mb(&self) -> f64 {
        let bytes = self.memory_usage_bytes.load(Ordering::Relaxed) as f64;
        (bytes / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsCounters {
        StatsCounters {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            actions_processed: self.actions_processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            dropped_on_overflow: self.dropped_on_overflow.load(Ordering::Relaxed),
            backfilled: self.backfilled.load(Ordering::Relaxed),
        }
    }
}

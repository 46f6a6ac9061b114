// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Recording goes through the metrics-rs facade. Without an installed
//! recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Register all tglogger metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("tglogger_messages_stored_total", "Messages written to the store");
    describe_counter!("tglogger_actions_stored_total", "Actions written to the store");
    describe_counter!("tglogger_backfilled_total", "Historical messages written by backfill");
    describe_counter!("tglogger_errors_total", "Failures, labelled by pipeline stage");
    describe_counter!(
        "tglogger_skipped_total",
        "Events not stored, labelled by reason (duplicate, filtered, overflow)"
    );
    describe_gauge!("tglogger_queue_depth", "Items waiting in a write queue");
    describe_gauge!("tglogger_memory_heap_bytes", "Bytes allocated by the heap allocator");
    describe_gauge!("tglogger_memory_resident_bytes", "Resident bytes reported by the allocator");
    describe_gauge!("tglogger_memory_rss_bytes", "Process resident set size");
}

pub fn record_messages_stored(count: u64) {
    metrics::counter!("tglogger_messages_stored_total").increment(count);
}

pub fn record_actions_stored(count: u64) {
    metrics::counter!("tglogger_actions_stored_total").increment(count);
}

pub fn record_backfilled(count: u64) {
    metrics::counter!("tglogger_backfilled_total").increment(count);
}

/// Count failures at `stage` (for example `flush_events` or `backfill`).
pub fn record_errors(stage: &'static str, count: u64) {
    metrics::counter!("tglogger_errors_total", "stage" => stage).increment(count);
}

pub fn record_skipped(reason: &'static str, count: u64) {
    metrics::counter!("tglogger_skipped_total", "reason" => reason).increment(count);
}

/// Set the depth of the `event` or `action` queue.
pub fn set_queue_depth(queue: &'static str, depth: f64) {
    metrics::gauge!("tglogger_queue_depth", "queue" => queue).set(depth);
}

pub fn set_memory_heap(bytes: f64) {
    metrics::gauge!("tglogger_memory_heap_bytes").set(bytes);
}

pub fn set_memory_resident(bytes: f64) {
    metrics::gauge!("tglogger_memory_resident_bytes").set(bytes);
}

pub fn set_memory_rss(bytes: f64) {
    metrics::gauge!("tglogger_memory_rss_bytes").set(bytes);
}

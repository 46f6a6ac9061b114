// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink client trait for the remote relational store.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SinkError;
use crate::query::{Filter, SelectQuery};
use crate::traits::adapter::PluginAdapter;

/// Raw table primitives against the remote store.
///
/// Implementations do not retry; callers wrap every call in the retry
/// executor, which uses the returned [`SinkError`] to classify failures.
#[async_trait]
pub trait SinkClient: PluginAdapter {
    /// Cheap read against `table` proving the store is reachable.
    async fn ping(&self, table: &str) -> Result<(), SinkError>;

    /// Insert rows, merging into existing rows that collide on `on_conflict`
    /// (a comma-separated column list).
    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str)
        -> Result<(), SinkError>;

    /// Plain insert.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), SinkError>;

    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>, SinkError>;

    /// Delete matching rows, returning how many were removed.
    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<u64, SinkError>;

    async fn count(&self, table: &str) -> Result<u64, SinkError>;
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable per-scope progress markers.
//!
//! Updates are read-modify-write and not atomic against a concurrent
//! writer of the same key. Live flushing writes `message` checkpoints and
//! backfill writes `backfill` checkpoints, and at most one backfill runs
//! per scope, so each key has a single writer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use tglogger_core::{
    Checkpoint, CheckpointKind, CheckpointUpdate, Filter, LoggerError, SelectQuery,
};

use crate::adapter::SinkAdapter;
use crate::rows;

#[derive(Clone)]
pub struct CheckpointManager {
    sink: Arc<SinkAdapter>,
}

impl CheckpointManager {
    pub fn new(sink: Arc<SinkAdapter>) -> Self {
        Self { sink }
    }

    /// Fetch the checkpoint for `(kind, scope)`, if one was ever written.
    pub async fn get(
        &self,
        kind: CheckpointKind,
        scope: Option<i64>,
    ) -> Result<Option<Checkpoint>, LoggerError> {
        let id = Checkpoint::id_for(kind, scope);
        let table = &self.sink.tables().checkpoints;
        let query = SelectQuery::new()
            .filter(Filter::eq("checkpoint_id", id.as_str()))
            .limit(1);

        let rows = self
            .sink
            .call("get_checkpoint", || self.sink.client().select(table, query.clone()))
            .await?;

        rows.into_iter()
            .next()
            .map(rows::checkpoint_from_row)
            .transpose()
    }

    /// Merge `update` into the stored checkpoint, creating it with defaults
    /// when absent, and write the result back.
    pub async fn update(
        &self,
        kind: CheckpointKind,
        scope: Option<i64>,
        update: CheckpointUpdate,
    ) -> Result<Checkpoint, LoggerError> {
        self.modify(kind, scope, |_| update).await
    }

    /// Move the cursor to `(last_id, last_timestamp)` and add `processed`
    /// to the running total.
    pub async fn advance(
        &self,
        kind: CheckpointKind,
        scope: Option<i64>,
        last_id: i64,
        last_timestamp: DateTime<Utc>,
        processed: i64,
    ) -> Result<Checkpoint, LoggerError> {
        self.modify(kind, scope, |existing| CheckpointUpdate {
            last_processed_id: Some(last_id),
            last_processed_timestamp: Some(last_timestamp),
            total_processed: Some(existing.total_processed + processed),
            ..CheckpointUpdate::default()
        })
        .await
    }

    async fn modify<F>(
        &self,
        kind: CheckpointKind,
        scope: Option<i64>,
        build: F,
    ) -> Result<Checkpoint, LoggerError>
    where
        F: FnOnce(&Checkpoint) -> CheckpointUpdate,
    {
        let now = Utc::now();
        let mut checkpoint = self
            .get(kind, scope)
            .await?
            .unwrap_or_else(|| Checkpoint::new(kind, scope, now));
        build(&checkpoint).apply(&mut checkpoint, now);
        self.write(&checkpoint).await?;

        debug!(
            checkpoint_id = %checkpoint.checkpoint_id,
            last_processed_id = checkpoint.last_processed_id,
            total_processed = checkpoint.total_processed,
            backfill_in_progress = checkpoint.backfill_in_progress,
            "checkpoint updated"
        );
        Ok(checkpoint)
    }

    /// Every stored checkpoint, most recently updated first.
    pub async fn list(&self) -> Result<Vec<Checkpoint>, LoggerError> {
        let table = &self.sink.tables().checkpoints;
        let query = SelectQuery::new().order_desc("updated_at");
        let rows = self
            .sink
            .call("list_checkpoints", || self.sink.client().select(table, query.clone()))
            .await?;
        rows.into_iter().map(rows::checkpoint_from_row).collect()
    }

    async fn write(&self, checkpoint: &Checkpoint) -> Result<(), LoggerError> {
        let row = rows::checkpoint_row(checkpoint)?;
        let table = &self.sink.tables().checkpoints;
        self.sink
            .call("update_checkpoint", || {
                self.sink.client().upsert(table, vec![row.clone()], "checkpoint_id")
            })
            .await
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink adapter: records in, rows out, every call through the retry executor.
//!
//! The adapter wraps a shared [`SinkClient`]. The connection is lazily
//! initialized: the first store operation (or an explicit
//! [`SinkAdapter::initialize`]) probes the store once under an async lock,
//! so concurrent first use does not race.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tglogger_config::LoggerConfig;
use tglogger_config::model::TableNames;
use tglogger_core::{
    ActionRecord, ChatInfo, EventRecord, Filter, LoggerError, SelectQuery, SinkClient, SinkError,
    UserInfo,
};
use tglogger_resilience::{RetryExecutor, RetryPolicy};

use crate::rows;

/// Conflict key for message upserts.
const MESSAGE_CONFLICT: &str = "chat_id,message_id";

/// Store connectivity snapshot for the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseHealth {
    pub database_connected: bool,
    pub tables_accessible: bool,
    pub last_message_timestamp: Option<String>,
    pub error: Option<String>,
}

/// Row counts reported by `status` and the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkStatistics {
    pub total_messages: u64,
    pub total_actions: u64,
    pub total_chats: u64,
    pub collected_at: DateTime<Utc>,
}

/// Rows removed by [`SinkAdapter::prune_older_than`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneReport {
    pub cutoff: DateTime<Utc>,
    pub messages_deleted: u64,
    pub actions_deleted: u64,
}

/// The last stored record of one scope within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeProgress {
    pub last_message_id: i64,
    pub last_date: DateTime<Utc>,
    pub stored: usize,
}

/// Outcome of a batch upsert, broken down per scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProgress {
    pub stored: usize,
    pub skipped: usize,
    pub scopes: BTreeMap<i64, ScopeProgress>,
}

/// Writes pipeline records to the remote store.
pub struct SinkAdapter {
    client: Arc<dyn SinkClient>,
    tables: TableNames,
    retry: RetryExecutor,
    init_lock: Mutex<()>,
    connected: AtomicBool,
    stats_ttl: Duration,
    stats_cache: StdMutex<Option<(Instant, SinkStatistics)>>,
}

impl SinkAdapter {
    /// Build an adapter from the loaded configuration.
    pub fn new(client: Arc<dyn SinkClient>, config: &LoggerConfig) -> Self {
        Self::with_policy(
            client,
            config.sink.tables.clone(),
            RetryPolicy::from(&config.retry),
            Duration::from_secs(config.maintenance.stats_cache_secs),
        )
    }

    pub fn with_policy(
        client: Arc<dyn SinkClient>,
        tables: TableNames,
        policy: RetryPolicy,
        stats_ttl: Duration,
    ) -> Self {
        Self {
            client,
            tables,
            retry: RetryExecutor::new(policy),
            init_lock: Mutex::new(()),
            connected: AtomicBool::new(false),
            stats_ttl,
            stats_cache: StdMutex::new(None),
        }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Probe the store once, retrying transient failures.
    ///
    /// Idempotent once connected. Any failure is reported as
    /// [`LoggerError::Connection`].
    pub async fn initialize(&self) -> Result<(), LoggerError> {
        if self.is_connected() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let table = &self.tables.checkpoints;
        self.retry
            .execute("initialize", || self.client.ping(table))
            .await
            .map_err(|e| LoggerError::Connection {
                message: format!("cannot reach {}: {e}", self.client.name()),
                source: Some(Box::new(e)),
            })?;

        self.connected.store(true, Ordering::Release);
        info!(sink = self.client.name(), "sink connection established");
        Ok(())
    }

    /// Mark the adapter disconnected. The next store call re-initializes.
    pub async fn close(&self) -> Result<(), LoggerError> {
        let _guard = self.init_lock.lock().await;
        if self.connected.swap(false, Ordering::AcqRel) {
            self.client.shutdown().await?;
            info!("sink connection closed");
        }
        Ok(())
    }

    /// Run one sink operation under the retry policy, initializing first.
    pub(crate) async fn call<T, F, Fut>(&self, name: &str, operation: F) -> Result<T, LoggerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SinkError>>,
    {
        self.initialize().await?;
        self.retry.execute(name, operation).await
    }

    pub(crate) fn client(&self) -> &dyn SinkClient {
        self.client.as_ref()
    }

    /// Upsert a batch of events in one call and return how many were stored.
    ///
    /// Records that fail conversion are skipped with a warning; the rest are
    /// written. A batch where nothing converts makes no sink call.
    pub async fn store_events_batch(&self, records: &[EventRecord]) -> Result<usize, LoggerError> {
        Ok(self.store_events_with_progress(records).await?.stored)
    }

    /// Like [`store_events_batch`](Self::store_events_batch), also reporting
    /// the last stored record of every scope in the batch.
    ///
    /// Records sharing a `(chat_id, message_id)` key collapse into one row
    /// holding the last of them, since a single upsert may touch a row only
    /// once. Every collapsed record still counts as stored.
    pub async fn store_events_with_progress(
        &self,
        records: &[EventRecord],
    ) -> Result<BatchProgress, LoggerError> {
        let now = Utc::now();
        let mut progress = BatchProgress::default();
        let mut batch = Vec::with_capacity(records.len());
        let mut slots: HashMap<(i64, i64), usize> = HashMap::with_capacity(records.len());

        for record in records {
            match rows::event_row(record, now) {
                Ok(row) => {
                    match slots.get(&(record.chat.id, record.message_id)) {
                        Some(&slot) => batch[slot] = row,
                        None => {
                            slots.insert((record.chat.id, record.message_id), batch.len());
                            batch.push(row);
                        }
                    }
                    progress.stored += 1;
                    let entry = progress.scopes.entry(record.scope()).or_insert(ScopeProgress {
                        last_message_id: record.message_id,
                        last_date: record.date,
                        stored: 0,
                    });
                    entry.last_message_id = record.message_id;
                    entry.last_date = record.date;
                    entry.stored += 1;
                }
                Err(e) => {
                    warn!(
                        chat_id = record.chat.id,
                        message_id = record.message_id,
                        error = %e,
                        "skipping event that failed conversion"
                    );
                    progress.skipped += 1;
                }
            }
        }

        if batch.is_empty() {
            progress.scopes.clear();
            return Ok(progress);
        }

        let table = &self.tables.messages;
        let rows_sent = batch.len();
        self.call("store_events_batch", || {
            self.client.upsert(table, batch.clone(), MESSAGE_CONFLICT)
        })
        .await?;

        debug!(
            stored = progress.stored,
            rows = rows_sent,
            skipped = progress.skipped,
            "event batch stored"
        );
        Ok(progress)
    }

    /// Upsert a single event. Used by backfill.
    pub async fn store_event(&self, record: &EventRecord) -> Result<(), LoggerError> {
        let row = rows::event_row(record, Utc::now())?;
        let table = &self.tables.messages;
        self.call("store_event", || {
            self.client.upsert(table, vec![row.clone()], MESSAGE_CONFLICT)
        })
        .await
    }

    /// Insert one action. Actions are append-only and never upserted.
    pub async fn store_action(&self, record: &ActionRecord) -> Result<(), LoggerError> {
        let row = rows::action_row(record, Utc::now());
        let table = &self.tables.actions;
        self.call("store_action", || self.client.insert(table, vec![row.clone()]))
            .await
    }

    pub async fn upsert_chat(&self, chat: &ChatInfo) -> Result<(), LoggerError> {
        let row = rows::chat_row(chat, Utc::now());
        let table = &self.tables.chats;
        self.call("upsert_chat", || {
            self.client.upsert(table, vec![row.clone()], "chat_id")
        })
        .await
    }

    pub async fn upsert_user(&self, user: &UserInfo) -> Result<(), LoggerError> {
        let row = rows::user_row(user, Utc::now());
        let table = &self.tables.users;
        self.call("upsert_user", || {
            self.client.upsert(table, vec![row.clone()], "user_id")
        })
        .await
    }

    /// Highest stored message id for a scope, or `None` when nothing is stored.
    pub async fn last_event_id(&self, scope: i64) -> Result<Option<i64>, LoggerError> {
        let table = &self.tables.messages;
        let query = SelectQuery::new()
            .filter(Filter::eq("chat_id", scope))
            .order_desc("date")
            .limit(1);
        let rows = self
            .call("last_event_id", || self.client.select(table, query.clone()))
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("message_id"))
            .and_then(|id| id.as_i64()))
    }

    /// Single un-retried probe of the store.
    pub async fn health_check(&self) -> DatabaseHealth {
        let mut health = DatabaseHealth {
            database_connected: false,
            tables_accessible: false,
            last_message_timestamp: None,
            error: None,
        };

        if let Err(e) = self.client.ping(&self.tables.checkpoints).await {
            health.error = Some(e.to_string());
            return health;
        }
        health.database_connected = true;

        let newest = SelectQuery::new().order_desc("date").limit(1);
        match self.client.select(&self.tables.messages, newest).await {
            Ok(rows) => {
                health.tables_accessible = true;
                health.last_message_timestamp = rows
                    .first()
                    .and_then(|row| row.get("date"))
                    .and_then(|date| date.as_str())
                    .map(str::to_string);
            }
            Err(e) => health.error = Some(e.to_string()),
        }

        health
    }

    /// Row counts for messages, actions, and chats, cached for the
    /// configured TTL.
    pub async fn statistics(&self) -> Result<SinkStatistics, LoggerError> {
        if let Some(cached) = self.cached_statistics() {
            return Ok(cached);
        }

        let tables = &self.tables;
        let total_messages = self
            .call("count_messages", || self.client.count(&tables.messages))
            .await?;
        let total_actions = self
            .call("count_actions", || self.client.count(&tables.actions))
            .await?;
        let total_chats = self
            .call("count_chats", || self.client.count(&tables.chats))
            .await?;

        let stats = SinkStatistics {
            total_messages,
            total_actions,
            total_chats,
            collected_at: Utc::now(),
        };
        if let Ok(mut cache) = self.stats_cache.lock() {
            *cache = Some((Instant::now(), stats.clone()));
        }
        Ok(stats)
    }

    fn cached_statistics(&self) -> Option<SinkStatistics> {
        let cache = self.stats_cache.lock().ok()?;
        let (at, stats) = cache.as_ref()?;
        (at.elapsed() < self.stats_ttl).then(|| stats.clone())
    }

    /// Delete messages and actions older than `days` days. Checkpoints are
    /// left alone.
    pub async fn prune_older_than(&self, days: u32) -> Result<PruneReport, LoggerError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let cutoff_text = cutoff.to_rfc3339();
        let tables = &self.tables;

        let messages_deleted = self
            .call("prune_messages", || {
                self.client
                    .delete(&tables.messages, vec![Filter::lt("date", cutoff_text.as_str())])
            })
            .await?;
        let actions_deleted = self
            .call("prune_actions", || {
                self.client.delete(
                    &tables.actions,
                    vec![Filter::lt("occurred_at", cutoff_text.as_str())],
                )
            })
            .await?;

        if let Ok(mut cache) = self.stats_cache.lock() {
            *cache = None;
        }
        info!(days, messages_deleted, actions_deleted, "pruned old rows");

        Ok(PruneReport {
            cutoff,
            messages_deleted,
            actions_deleted,
        })
    }
}

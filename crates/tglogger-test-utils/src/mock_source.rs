// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock event source for deterministic testing.
//!
//! Live updates injected with [`MockSource::inject`] are returned by
//! `receive()`. History is served from per-chat event lists, paged by id.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use tglogger_core::{
    AdapterType, EventRecord, EventSource, HealthStatus, InboundUpdate, LoggerError,
    PluginAdapter,
};

pub struct MockSource {
    inbound: Arc<Mutex<VecDeque<InboundUpdate>>>,
    notify: Arc<Notify>,
    history: Mutex<HashMap<i64, Vec<EventRecord>>>,
    history_failures: Mutex<VecDeque<LoggerError>>,
    fetch_delay: Mutex<Duration>,
    fetch_calls: AtomicUsize,
    connected: AtomicBool,
    account_id: Option<i64>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            history: Mutex::new(HashMap::new()),
            history_failures: Mutex::new(VecDeque::new()),
            fetch_delay: Mutex::new(Duration::ZERO),
            fetch_calls: AtomicUsize::new(0),
            connected: AtomicBool::new(true),
            account_id: Some(777),
        }
    }

    /// Queue a live update for `receive()`.
    pub async fn inject(&self, update: InboundUpdate) {
        self.inbound.lock().await.push_back(update);
        self.notify.notify_one();
    }

    /// Add historical events for their chats.
    pub async fn add_history(&self, events: Vec<EventRecord>) {
        let mut history = self.history.lock().await;
        for event in events {
            history.entry(event.scope()).or_default().push(event);
        }
    }

    /// Fail the next history fetch with `error`.
    pub async fn fail_next_fetch(&self, error: LoggerError) {
        self.history_failures.lock().await.push_back(error);
    }

    /// Make every history fetch take `delay`.
    pub async fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().await = delay;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, LoggerError> {
        if self.is_connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("disconnected".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), LoggerError> {
        self.set_connected(false);
        Ok(())
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn connect(&self) -> Result<(), LoggerError> {
        self.set_connected(true);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundUpdate, LoggerError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(update) = queue.pop_front() {
                    return Ok(update);
                }
            }
            self.notify.notified().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn account_id(&self) -> Option<i64> {
        self.account_id
    }

    async fn fetch_history(
        &self,
        scope: i64,
        after: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, LoggerError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.history_failures.lock().await.pop_front() {
            return Err(error);
        }

        let history = self.history.lock().await;
        let mut page: Vec<EventRecord> = history
            .get(&scope)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.message_id > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        page.sort_by_key(|e| e.message_id);
        page.truncate(limit);
        Ok(page)
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event source trait for chat platform integrations.

use async_trait::async_trait;

use crate::error::LoggerError;
use crate::record::{EventRecord, InboundUpdate};
use crate::traits::adapter::PluginAdapter;

/// Adapter for the chat platform that produces events.
///
/// Live updates arrive through [`receive`](EventSource::receive); historical
/// pages for backfill through [`fetch_history`](EventSource::fetch_history).
#[async_trait]
pub trait EventSource: PluginAdapter {
    /// Starts live delivery (long polling, webhooks, ...).
    async fn connect(&self) -> Result<(), LoggerError>;

    /// Receives the next live update.
    async fn receive(&self) -> Result<InboundUpdate, LoggerError>;

    /// Whether the last contact with the platform succeeded.
    fn is_connected(&self) -> bool;

    /// The platform's id for the account this source runs as.
    fn account_id(&self) -> Option<i64>;

    /// Fetches up to `limit` historical events of `scope` with ids above
    /// `after`, in ascending id order. An empty page means history is
    /// exhausted.
    async fn fetch_history(
        &self,
        scope: i64,
        after: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, LoggerError>;
}

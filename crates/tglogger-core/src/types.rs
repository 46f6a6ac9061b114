// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by adapters, records, and the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Identifies the role an adapter plays in the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Sink,
    Observability,
}

/// Kind of chat a scope refers to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// The chat an event was observed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl ChatRef {
    pub fn new(id: i64, kind: ChatKind) -> Self {
        Self {
            id,
            kind,
            title: None,
            username: None,
        }
    }

    pub fn is_channel(&self) -> bool {
        self.kind == ChatKind::Channel
    }
}

/// Identity of the user behind an event or action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl Sender {
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }
}

/// Where a forwarded message originally came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardInfo {
    pub from_user_id: Option<i64>,
    pub from_chat_id: Option<i64>,
    pub from_message_id: Option<i64>,
    pub sender_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Denormalized chat metadata, upserted whenever a chat is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub chat_id: i64,
    pub chat_type: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
    pub is_forum: bool,
}

impl From<&ChatRef> for ChatInfo {
    fn from(chat: &ChatRef) -> Self {
        Self {
            chat_id: chat.id,
            chat_type: chat.kind,
            title: chat.title.clone(),
            username: chat.username.clone(),
            first_name: None,
            last_name: None,
            description: None,
            is_forum: false,
        }
    }
}

/// Denormalized user metadata, upserted whenever a sender is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: bool,
}

impl From<&Sender> for UserInfo {
    fn from(sender: &Sender) -> Self {
        Self {
            user_id: sender.id,
            is_bot: sender.is_bot,
            first_name: sender.first_name.clone(),
            last_name: sender.last_name.clone(),
            username: sender.username.clone(),
            language_code: sender.language_code.clone(),
            is_premium: false,
        }
    }
}

/// Namespace a checkpoint belongs to.
///
/// Live flushes and backfill runs write distinct kinds so they never
/// contend for the same checkpoint row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckpointKind {
    Message,
    Backfill,
}

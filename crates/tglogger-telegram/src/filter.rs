// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config-driven admission rules for Telegram events.

use std::collections::HashSet;

use tglogger_config::model::TelegramConfig;
use tglogger_core::{AdmissionFilter, ContentKind, EventRecord};

/// Admission filter built from the `[telegram]` section.
///
/// Rules, in order: bot senders, service content, channel chats, chat id
/// lists, then channel username lists. An ignore list always wins over an
/// allow list, and an empty allow list admits everything.
#[derive(Debug, Clone)]
pub struct ConfigAdmissionFilter {
    process_bot_messages: bool,
    process_system_messages: bool,
    process_channel_messages: bool,
    allowed_chats: HashSet<i64>,
    ignored_chats: HashSet<i64>,
    allowed_channels: HashSet<String>,
    ignored_channels: HashSet<String>,
}

fn normalize_channel(name: &str) -> String {
    name.trim_start_matches('@').to_lowercase()
}

impl ConfigAdmissionFilter {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            process_bot_messages: config.process_bot_messages,
            process_system_messages: config.process_system_messages,
            process_channel_messages: config.process_channel_messages,
            allowed_chats: config.allowed_chats.iter().copied().collect(),
            ignored_chats: config.ignored_chats.iter().copied().collect(),
            allowed_channels: config.allowed_channels.iter().map(|c| normalize_channel(c)).collect(),
            ignored_channels: config.ignored_channels.iter().map(|c| normalize_channel(c)).collect(),
        }
    }

    fn chat_allowed(&self, chat_id: i64) -> bool {
        if self.ignored_chats.contains(&chat_id) {
            return false;
        }
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }

    fn channel_allowed(&self, username: &str) -> bool {
        let name = normalize_channel(username);
        if self.ignored_channels.contains(&name) {
            return false;
        }
        self.allowed_channels.is_empty() || self.allowed_channels.contains(&name)
    }
}

impl AdmissionFilter for ConfigAdmissionFilter {
    fn should_process(&self, event: &EventRecord) -> bool {
        if event.sender_is_bot() && !self.process_bot_messages {
            return false;
        }
        if event.content.kind() == ContentKind::Service && !self.process_system_messages {
            return false;
        }
        let channel = event.chat.is_channel();
        if channel && !self.process_channel_messages {
            return false;
        }
        if !self.chat_allowed(event.chat.id) {
            return false;
        }
        match (&event.chat.username, channel) {
            (Some(username), true) => self.channel_allowed(username),
            _ => true,
        }
    }
}

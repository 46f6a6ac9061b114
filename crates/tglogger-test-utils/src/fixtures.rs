// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record builders for tests.

use chrono::{DateTime, TimeZone, Utc};

use tglogger_core::{ChatKind, ChatRef, EventContent, EventRecord, InboundUpdate, Sender};

/// A fixed timestamp `secs` seconds after 2026-01-01T00:00:00Z.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn sender(id: i64) -> Sender {
    Sender::new(id, format!("user{id}"))
}

/// A text message in a supergroup, sent by user 1, dated `at(message_id)`.
pub fn text_event(chat_id: i64, message_id: i64) -> EventRecord {
    EventRecord::new(
        message_id,
        ChatRef::new(chat_id, ChatKind::Supergroup),
        EventContent::text(format!("message {message_id}")),
        at(message_id),
    )
    .with_sender(sender(1))
}

pub fn update(chat_id: i64, message_id: i64) -> InboundUpdate {
    InboundUpdate::from_event(text_event(chat_id, message_id))
}

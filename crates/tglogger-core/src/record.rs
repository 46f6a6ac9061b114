// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event, action, and checkpoint records flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::{ActionType, EventContent};
use crate::types::{ChatInfo, ChatRef, CheckpointKind, ForwardInfo, Sender, UserInfo};

/// One inbound message or channel post.
///
/// `(chat.id, message_id)` identifies the row in the store; storing the
/// same pair twice overwrites the earlier write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub message_id: i64,
    pub chat: ChatRef,
    pub sender: Option<Sender>,
    pub content: EventContent,
    pub date: DateTime<Utc>,
    pub edit_date: Option<DateTime<Utc>>,
    pub reply_to_message_id: Option<i64>,
    pub forward: Option<ForwardInfo>,
    #[serde(default)]
    pub entities: Vec<Value>,
    #[serde(default)]
    pub is_backfilled: bool,
}

impl EventRecord {
    pub fn new(message_id: i64, chat: ChatRef, content: EventContent, date: DateTime<Utc>) -> Self {
        Self {
            message_id,
            chat,
            sender: None,
            content,
            date,
            edit_date: None,
            reply_to_message_id: None,
            forward: None,
            entities: Vec::new(),
            is_backfilled: false,
        }
    }

    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_edit_date(mut self, edit_date: DateTime<Utc>) -> Self {
        self.edit_date = Some(edit_date);
        self
    }

    /// The scope (chat id) this event is partitioned by.
    pub fn scope(&self) -> i64 {
        self.chat.id
    }

    /// Key used by the dedup tracker.
    ///
    /// Edits carry their edit time so a later edit of an already-seen
    /// message is still admitted and overwrites the stored row.
    pub fn dedup_key(&self) -> String {
        match self.edit_date {
            Some(edited) => format!("{}_{}_e{}", self.chat.id, self.message_id, edited.timestamp()),
            None => format!("{}_{}", self.chat.id, self.message_id),
        }
    }

    pub fn sender_is_bot(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| s.is_bot)
    }
}

/// One derived, append-only fact (membership change, pin, edit, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: Uuid,
    pub action_type: ActionType,
    pub chat_id: Option<i64>,
    pub actor: Option<Sender>,
    pub target_id: Option<i64>,
    pub target_type: Option<String>,
    pub target_name: Option<String>,
    pub action_data: Value,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub is_backfilled: bool,
}

impl ActionRecord {
    pub fn new(action_type: ActionType, chat_id: Option<i64>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            action_type,
            chat_id,
            actor: None,
            target_id: None,
            target_type: None,
            target_name: None,
            action_data: Value::Object(Default::default()),
            before: None,
            after: None,
            occurred_at,
            is_backfilled: false,
        }
    }

    pub fn with_actor(mut self, actor: Sender) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_target(
        mut self,
        id: Option<i64>,
        target_type: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        self.target_id = id;
        self.target_type = Some(target_type.into());
        self.target_name = name;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.action_data = data;
        self
    }

    pub fn with_change(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.before = before;
        self.after = after;
        self
    }
}

/// Everything the source produced for one platform update.
#[derive(Debug, Clone)]
pub struct InboundUpdate {
    pub event: EventRecord,
    pub actions: Vec<ActionRecord>,
    pub chat: ChatInfo,
    pub sender: Option<UserInfo>,
}

impl InboundUpdate {
    /// Wrap a bare event, deriving identities from its chat and sender.
    pub fn from_event(event: EventRecord) -> Self {
        let chat = ChatInfo::from(&event.chat);
        let sender = event.sender.as_ref().map(UserInfo::from);
        Self {
            event,
            actions: Vec::new(),
            chat,
            sender,
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionRecord>) -> Self {
        self.actions = actions;
        self
    }
}

/// Durable progress marker for one `(kind, scope)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub checkpoint_type: CheckpointKind,
    pub chat_id: Option<i64>,
    pub last_processed_id: Option<i64>,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_processed: i64,
    pub last_backfill_completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub backfill_in_progress: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Derived primary key: `{kind}_{chat_id}` or `{kind}_global`.
    pub fn id_for(kind: CheckpointKind, scope: Option<i64>) -> String {
        match scope {
            Some(chat_id) => format!("{kind}_{chat_id}"),
            None => format!("{kind}_global"),
        }
    }

    /// A fresh checkpoint with every progress field at its default.
    pub fn new(kind: CheckpointKind, scope: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            checkpoint_id: Self::id_for(kind, scope),
            checkpoint_type: kind,
            chat_id: scope,
            last_processed_id: None,
            last_processed_timestamp: None,
            total_processed: 0,
            last_backfill_completed: None,
            backfill_in_progress: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields to merge into a checkpoint. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointUpdate {
    pub last_processed_id: Option<i64>,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
    pub total_processed: Option<i64>,
    pub last_backfill_completed: Option<DateTime<Utc>>,
    pub backfill_in_progress: Option<bool>,
}

impl CheckpointUpdate {
    /// Apply the provided fields onto `checkpoint` and bump `updated_at`.
    pub fn apply(&self, checkpoint: &mut Checkpoint, now: DateTime<Utc>) {
        if let Some(id) = self.last_processed_id {
            checkpoint.last_processed_id = Some(id);
        }
        if let Some(ts) = self.last_processed_timestamp {
            checkpoint.last_processed_timestamp = Some(ts);
        }
        if let Some(total) = self.total_processed {
            checkpoint.total_processed = total;
        }
        if let Some(done) = self.last_backfill_completed {
            checkpoint.last_backfill_completed = Some(done);
        }
        if let Some(flag) = self.backfill_in_progress {
            checkpoint.backfill_in_progress = flag;
        }
        checkpoint.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatKind;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn dedup_key_distinguishes_edits() {
        let event = EventRecord::new(
            7,
            ChatRef::new(42, ChatKind::Group),
            EventContent::text("hi"),
            ts(1_700_000_000),
        );
        assert_eq!(event.dedup_key(), "42_7");
        let edited = event.with_edit_date(ts(1_700_000_100));
        assert_eq!(edited.dedup_key(), "42_7_e1700000100");
    }

    #[test]
    fn checkpoint_id_uses_global_without_scope() {
        assert_eq!(Checkpoint::id_for(CheckpointKind::Message, Some(42)), "message_42");
        assert_eq!(Checkpoint::id_for(CheckpointKind::Backfill, Some(-100)), "backfill_-100");
        assert_eq!(Checkpoint::id_for(CheckpointKind::Message, None), "message_global");
    }

    #[test]
    fn update_merges_only_provided_fields() {
        let mut checkpoint = Checkpoint::new(CheckpointKind::Message, Some(1), ts(10));
        checkpoint.last_processed_id = Some(5);
        checkpoint.total_processed = 5;

        let update = CheckpointUpdate {
            backfill_in_progress: Some(true),
            ..Default::default()
        };
        update.apply(&mut checkpoint, ts(20));

        assert_eq!(checkpoint.last_processed_id, Some(5));
        assert_eq!(checkpoint.total_processed, 5);
        assert!(checkpoint.backfill_in_progress);
        assert_eq!(checkpoint.created_at, ts(10));
        assert_eq!(checkpoint.updated_at, ts(20));
    }

    #[test]
    fn inbound_update_derives_identities() {
        let event = EventRecord::new(
            1,
            ChatRef::new(9, ChatKind::Private),
            EventContent::text("yo"),
            ts(0),
        )
        .with_sender(Sender::new(9, "Ann"));
        let update = InboundUpdate::from_event(event);
        assert_eq!(update.chat.chat_id, 9);
        assert_eq!(update.sender.as_ref().map(|u| u.user_id), Some(9));
        assert!(update.actions.is_empty());
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record to row conversion for the five tables.
//!
//! Rows are flat JSON objects whose keys are column names. Timestamps are
//! written as RFC 3339 strings. Event rows always carry the full column
//! set, with null for payload columns that do not apply.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use tglogger_core::{
    ActionRecord, ChatInfo, Checkpoint, ContentKind, EventContent, EventRecord, LoggerError,
    UserInfo,
};

/// Column holding a service message's fields as one JSON object.
pub const SERVICE_COLUMN: &str = "service_data";

fn conversion(message: impl Into<String>) -> LoggerError {
    LoggerError::Conversion {
        message: message.into(),
    }
}

fn ts(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339())
}

fn opt_ts(value: Option<DateTime<Utc>>) -> Value {
    value.map(ts).unwrap_or(Value::Null)
}

/// Convert an event into a `messages` row.
///
/// Fails for records that cannot be stored meaningfully: non-positive
/// message ids, a zero chat id, an edit dated before the message, or a
/// service payload that is not a JSON object.
pub fn event_row(record: &EventRecord, logged_at: DateTime<Utc>) -> Result<Value, LoggerError> {
    if record.message_id <= 0 {
        return Err(conversion(format!(
            "message_id must be positive, got {}",
            record.message_id
        )));
    }
    if record.chat.id == 0 {
        return Err(conversion(format!(
            "message {} has no chat id",
            record.message_id
        )));
    }
    if record.edit_date.is_some_and(|edited| edited < record.date) {
        return Err(conversion(format!(
            "message {} in chat {} was edited before it was sent",
            record.message_id, record.chat.id
        )));
    }

    let sender = record.sender.as_ref();
    let forward = record.forward.as_ref();
    let kind = record.content.kind();

    let mut row = json!({
        "message_id": record.message_id,
        "chat_id": record.chat.id,
        "chat_type": record.chat.kind.to_string(),
        "chat_title": record.chat.title,
        "from_user_id": sender.map(|s| s.id),
        "from_username": sender.and_then(|s| s.username.clone()),
        "from_first_name": sender.map(|s| s.first_name.clone()),
        "from_last_name": sender.and_then(|s| s.last_name.clone()),
        "from_is_bot": sender.map(|s| s.is_bot),
        "text": record.content.body(),
        "caption": record.content.caption(),
        "message_type": kind.to_string(),
        "date": ts(record.date),
        "edit_date": opt_ts(record.edit_date),
        "reply_to_message_id": record.reply_to_message_id,
        "forward_from_user_id": forward.and_then(|f| f.from_user_id),
        "forward_from_chat_id": forward.and_then(|f| f.from_chat_id),
        "forward_from_message_id": forward.and_then(|f| f.from_message_id),
        "forward_sender_name": forward.and_then(|f| f.sender_name.clone()),
        "forward_date": opt_ts(forward.and_then(|f| f.date)),
        "entities": if record.entities.is_empty() {
            Value::Null
        } else {
            Value::Array(record.entities.clone())
        },
        "is_backfilled": record.is_backfilled,
        "logged_at": ts(logged_at),
    });

    let Value::Object(columns) = &mut row else {
        return Err(conversion("event row is not an object"));
    };

    // Every row carries the same keys so rows of mixed kinds share one bulk body.
    for column in ContentKind::payload_columns() {
        columns.insert(column.to_string(), Value::Null);
    }
    columns.insert(SERVICE_COLUMN.to_string(), Value::Null);

    match &record.content {
        EventContent::Service { service } => {
            if !service.is_object() {
                return Err(conversion(format!(
                    "service payload of message {} is not an object",
                    record.message_id
                )));
            }
            columns.insert(SERVICE_COLUMN.to_string(), service.clone());
        }
        content => {
            if let (Some(column), Some(payload)) = (kind.payload_column(), content.payload()) {
                columns.insert(column.to_string(), payload.clone());
            }
        }
    }

    Ok(row)
}

/// Convert an action into an `actions` row.
pub fn action_row(record: &ActionRecord, logged_at: DateTime<Utc>) -> Value {
    let actor = record.actor.as_ref();
    let action_type: &'static str = record.action_type.into();
    json!({
        "action_id": record.action_id.to_string(),
        "action_type": action_type,
        "chat_id": record.chat_id,
        "actor_user_id": actor.map(|a| a.id),
        "actor_username": actor.and_then(|a| a.username.clone()),
        "actor_first_name": actor.map(|a| a.first_name.clone()),
        "target_id": record.target_id,
        "target_type": record.target_type,
        "target_name": record.target_name,
        "action_data": record.action_data,
        "before_state": record.before,
        "after_state": record.after,
        "occurred_at": ts(record.occurred_at),
        "is_backfilled": record.is_backfilled,
        "logged_at": ts(logged_at),
    })
}

pub fn chat_row(chat: &ChatInfo, now: DateTime<Utc>) -> Value {
    json!({
        "chat_id": chat.chat_id,
        "chat_type": chat.chat_type.to_string(),
        "title": chat.title,
        "username": chat.username,
        "first_name": chat.first_name,
        "last_name": chat.last_name,
        "description": chat.description,
        "is_forum": chat.is_forum,
        "last_updated": ts(now),
    })
}

pub fn user_row(user: &UserInfo, now: DateTime<Utc>) -> Value {
    json!({
        "user_id": user.user_id,
        "is_bot": user.is_bot,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "username": user.username,
        "language_code": user.language_code,
        "is_premium": user.is_premium,
        "last_updated": ts(now),
    })
}

pub fn checkpoint_row(checkpoint: &Checkpoint) -> Result<Value, LoggerError> {
    serde_json::to_value(checkpoint)
        .map_err(|e| conversion(format!("checkpoint {}: {e}", checkpoint.checkpoint_id)))
}

/// Parse a stored checkpoint row. Null counters read as zero.
pub fn checkpoint_from_row(mut row: Value) -> Result<Checkpoint, LoggerError> {
    if let Value::Object(columns) = &mut row {
        if columns.get("total_processed").is_some_and(Value::is_null) {
            columns.insert("total_processed".into(), json!(0));
        }
        if columns.get("backfill_in_progress").is_some_and(Value::is_null) {
            columns.insert("backfill_in_progress".into(), json!(false));
        }
    }
    serde_json::from_value(row).map_err(|e| conversion(format!("malformed checkpoint row: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tglogger_core::{
        ActionType, ChatKind, ChatRef, CheckpointKind, ForwardInfo, Sender,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn event(content: EventContent) -> EventRecord {
        EventRecord::new(10, ChatRef::new(-100, ChatKind::Supergroup), content, at(1_700_000_000))
    }

    #[test]
    fn text_event_maps_core_columns() {
        let mut record = event(EventContent::text("hello")).with_sender(Sender::new(7, "Ada"));
        record.reply_to_message_id = Some(9);
        record.forward = Some(ForwardInfo {
            from_user_id: Some(3),
            from_chat_id: None,
            from_message_id: None,
            sender_name: Some("Bob".into()),
            date: Some(at(1_600_000_000)),
        });

        let row = event_row(&record, at(1_700_000_100)).unwrap();
        assert_eq!(row["message_id"], 10);
        assert_eq!(row["chat_id"], -100);
        assert_eq!(row["chat_type"], "supergroup");
        assert_eq!(row["from_user_id"], 7);
        assert_eq!(row["from_first_name"], "Ada");
        assert_eq!(row["text"], "hello");
        assert_eq!(row["message_type"], "text");
        assert_eq!(row["reply_to_message_id"], 9);
        assert_eq!(row["forward_from_user_id"], 3);
        assert_eq!(row["forward_sender_name"], "Bob");
        assert_eq!(row["is_backfilled"], false);
        assert!(row["edit_date"].is_null());
        assert!(row["entities"].is_null());
        assert_eq!(row["date"], at(1_700_000_000).to_rfc3339());
    }

    #[test]
    fn media_payload_lands_in_kind_column() {
        let record = event(EventContent::Photo {
            sizes: json!([{"file_id": "a", "width": 90}]),
            caption: Some("sunset".into()),
        });
        let row = event_row(&record, at(0)).unwrap();
        assert_eq!(row["message_type"], "photo");
        assert_eq!(row["photo"][0]["file_id"], "a");
        assert_eq!(row["caption"], "sunset");
        assert!(row["text"].is_null());
    }

    #[test]
    fn payment_uses_successful_payment_column() {
        let record = event(EventContent::Payment {
            payment: json!({"currency": "EUR", "total_amount": 500}),
        });
        let row = event_row(&record, at(0)).unwrap();
        assert_eq!(row["successful_payment"]["currency"], "EUR");
        assert!(row.get("payment").is_none());
        assert!(row["invoice"].is_null());
    }

    #[test]
    fn service_fields_stay_in_their_own_column() {
        let record = event(EventContent::Service {
            service: json!({"new_chat_title": "Renamed", "chat_id": 1}),
        });
        let row = event_row(&record, at(0)).unwrap();
        assert_eq!(row[SERVICE_COLUMN]["new_chat_title"], "Renamed");
        assert_eq!(row["chat_id"], -100);
        assert_eq!(row["message_type"], "service");
        assert!(row.get("new_chat_title").is_none());
    }

    fn keys(row: &Value) -> Vec<String> {
        let mut keys: Vec<String> = row.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn rows_of_every_kind_share_one_column_set() {
        let text = event_row(&event(EventContent::text("hi")), at(0)).unwrap();
        let photo = event_row(
            &event(EventContent::Photo {
                sizes: json!([{"file_id": "a"}]),
                caption: None,
            }),
            at(0),
        )
        .unwrap();
        let service = event_row(
            &event(EventContent::Service {
                service: json!({"pinned_message": {"message_id": 3}}),
            }),
            at(0),
        )
        .unwrap();

        assert_eq!(keys(&text), keys(&photo));
        assert_eq!(keys(&text), keys(&service));
        assert!(text["photo"].is_null());
        assert!(text[SERVICE_COLUMN].is_null());
        assert!(photo[SERVICE_COLUMN].is_null());
    }

    #[test]
    fn malformed_events_are_rejected() {
        let mut bad_id = event(EventContent::text("x"));
        bad_id.message_id = 0;
        assert!(matches!(
            event_row(&bad_id, at(0)),
            Err(LoggerError::Conversion { .. })
        ));

        let mut no_chat = event(EventContent::text("x"));
        no_chat.chat.id = 0;
        assert!(event_row(&no_chat, at(0)).is_err());

        let early_edit = event(EventContent::text("x")).with_edit_date(at(1));
        assert!(event_row(&early_edit, at(0)).is_err());

        let bad_service = event(EventContent::Service {
            service: json!("left"),
        });
        assert!(event_row(&bad_service, at(0)).is_err());
    }

    #[test]
    fn action_row_uses_snake_case_type() {
        let action = ActionRecord::new(ActionType::MemberJoin, Some(-100), at(5))
            .with_actor(Sender::new(1, "Ada"))
            .with_target(Some(2), "user", Some("Bob".into()));
        let row = action_row(&action, at(6));
        assert_eq!(row["action_type"], "member_join");
        assert_eq!(row["actor_user_id"], 1);
        assert_eq!(row["target_type"], "user");
        assert_eq!(row["action_id"], action.action_id.to_string());
    }

    #[test]
    fn checkpoint_row_reads_back_with_null_counters() {
        let checkpoint = Checkpoint::new(CheckpointKind::Backfill, Some(42), at(100));
        let mut row = checkpoint_row(&checkpoint).unwrap();
        assert_eq!(row["checkpoint_id"], "backfill_42");
        assert_eq!(row["checkpoint_type"], "backfill");

        row["total_processed"] = Value::Null;
        let parsed = checkpoint_from_row(row).unwrap();
        assert_eq!(parsed.total_processed, 0);
        assert_eq!(parsed.chat_id, Some(42));
    }
}

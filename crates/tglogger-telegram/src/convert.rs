// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion from Bot API message objects to pipeline records.
//!
//! Works on the Bot API JSON shape (as teloxide serializes a `Message`),
//! so payload blobs are stored exactly as the platform delivered them.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value, json};

use tglogger_core::{
    ActionRecord, ActionType, ChatInfo, ChatKind, ChatRef, EventContent, EventRecord,
    ForwardInfo, InboundUpdate, LoggerError, Sender, UserInfo,
};

/// Keys that mark a service message. Their values form the service blob.
const SERVICE_KEYS: &[&str] = &[
    "new_chat_members",
    "left_chat_member",
    "new_chat_title",
    "new_chat_photo",
    "delete_chat_photo",
    "group_chat_created",
    "supergroup_chat_created",
    "channel_chat_created",
    "migrate_to_chat_id",
    "migrate_from_chat_id",
    "pinned_message",
    "message_auto_delete_timer_changed",
    "video_chat_scheduled",
    "video_chat_started",
    "video_chat_ended",
    "video_chat_participants_invited",
    "forum_topic_created",
    "forum_topic_edited",
    "forum_topic_closed",
    "forum_topic_reopened",
];

fn conversion(message: impl Into<String>) -> LoggerError {
    LoggerError::Conversion {
        message: message.into(),
    }
}

fn int(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Unix seconds or RFC 3339 text.
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn time_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    value.get(key).and_then(timestamp)
}

fn chat_ref(chat: &Value) -> Result<ChatRef, LoggerError> {
    let id = int(chat, "id").ok_or_else(|| conversion("chat without an id"))?;
    let kind = match chat.get("type").and_then(Value::as_str) {
        Some(name) => ChatKind::from_str(name)
            .map_err(|_| conversion(format!("unknown chat type '{name}' for chat {id}")))?,
        None if id > 0 => ChatKind::Private,
        None => ChatKind::Group,
    };
    Ok(ChatRef {
        id,
        kind,
        title: string(chat, "title"),
        username: string(chat, "username"),
    })
}

fn sender(user: &Value) -> Option<Sender> {
    let id = int(user, "id")?;
    Some(Sender {
        id,
        is_bot: flag(user, "is_bot"),
        first_name: string(user, "first_name").unwrap_or_default(),
        last_name: string(user, "last_name"),
        username: string(user, "username"),
        language_code: string(user, "language_code"),
    })
}

fn chat_info(chat: &Value, reference: &ChatRef) -> ChatInfo {
    ChatInfo {
        chat_id: reference.id,
        chat_type: reference.kind,
        title: reference.title.clone(),
        username: reference.username.clone(),
        first_name: string(chat, "first_name"),
        last_name: string(chat, "last_name"),
        description: string(chat, "description"),
        is_forum: flag(chat, "is_forum"),
    }
}

fn user_info(user: &Value) -> Option<UserInfo> {
    let sender = sender(user)?;
    let mut info = UserInfo::from(&sender);
    info.is_premium = flag(user, "is_premium");
    Some(info)
}

fn display_name(user: &Value) -> Option<String> {
    string(user, "username").or_else(|| string(user, "first_name"))
}

/// Forward origin, from `forward_origin` or the older flat `forward_*` keys.
fn forward_info(message: &Value) -> Option<ForwardInfo> {
    if let Some(origin) = message.get("forward_origin") {
        let mut info = ForwardInfo {
            date: time_field(origin, "date"),
            ..ForwardInfo::default()
        };
        match origin.get("type").and_then(Value::as_str) {
            Some("user") => {
                info.from_user_id = origin.get("sender_user").and_then(|u| int(u, "id"));
            }
            Some("hidden_user") => info.sender_name = string(origin, "sender_user_name"),
            Some("chat") => {
                info.from_chat_id = origin.get("sender_chat").and_then(|c| int(c, "id"));
                info.sender_name = string(origin, "author_signature");
            }
            Some("channel") => {
                info.from_chat_id = origin.get("chat").and_then(|c| int(c, "id"));
                info.from_message_id = int(origin, "message_id");
                info.sender_name = string(origin, "author_signature");
            }
            _ => {}
        }
        return Some(info);
    }

    let date = time_field(message, "forward_date")?;
    Some(ForwardInfo {
        from_user_id: message.get("forward_from").and_then(|u| int(u, "id")),
        from_chat_id: message.get("forward_from_chat").and_then(|c| int(c, "id")),
        from_message_id: int(message, "forward_from_message_id"),
        sender_name: string(message, "forward_sender_name"),
        date: Some(date),
    })
}

fn service_blob(message: &Value) -> Value {
    let mut blob = Map::new();
    for key in SERVICE_KEYS {
        let Some(value) = message.get(*key) else {
            continue;
        };
        // A pinned message is a whole message; keep only its id.
        let value = if *key == "pinned_message" {
            json!({ "message_id": value.get("message_id") })
        } else {
            value.clone()
        };
        blob.insert((*key).to_string(), value);
    }
    Value::Object(blob)
}

/// Pick the one content kind a message carries.
///
/// Animations also carry a `document` and venues a `location`, so those
/// are checked first.
fn content(message: &Value) -> EventContent {
    let caption = string(message, "caption");
    let blob = |key: &str| message.get(key).cloned();

    if let Some(text) = string(message, "text") {
        return EventContent::Text { text };
    }
    if let Some(animation) = blob("animation") {
        return EventContent::Animation { animation, caption };
    }
    if let Some(sizes) = blob("photo") {
        return EventContent::Photo { sizes, caption };
    }
    if let Some(video) = blob("video") {
        return EventContent::Video { video, caption };
    }
    if let Some(video_note) = blob("video_note") {
        return EventContent::VideoNote { video_note };
    }
    if let Some(audio) = blob("audio") {
        return EventContent::Audio { audio, caption };
    }
    if let Some(document) = blob("document") {
        return EventContent::Document { document, caption };
    }
    if let Some(voice) = blob("voice") {
        return EventContent::Voice { voice, caption };
    }
    if let Some(sticker) = blob("sticker") {
        return EventContent::Sticker { sticker };
    }
    if let Some(contact) = blob("contact") {
        return EventContent::Contact { contact };
    }
    if let Some(dice) = blob("dice") {
        return EventContent::Dice { dice };
    }
    if let Some(game) = blob("game") {
        return EventContent::Game { game };
    }
    if let Some(poll) = blob("poll") {
        return EventContent::Poll { poll };
    }
    if let Some(venue) = blob("venue") {
        return EventContent::Venue { venue };
    }
    if let Some(location) = blob("location") {
        return EventContent::Location { location };
    }
    if let Some(invoice) = blob("invoice") {
        return EventContent::Invoice { invoice };
    }
    if let Some(payment) = blob("successful_payment") {
        return EventContent::Payment { payment };
    }
    if let Some(data) = blob("web_app_data") {
        return EventContent::WebAppData { data };
    }
    EventContent::Service {
        service: service_blob(message),
    }
}

/// Convert one Bot API message into an event record.
pub fn event_from_message(message: &Value) -> Result<EventRecord, LoggerError> {
    let message_id = int(message, "message_id").ok_or_else(|| conversion("message without an id"))?;
    let chat = message
        .get("chat")
        .ok_or_else(|| conversion(format!("message {message_id} has no chat")))
        .and_then(chat_ref)?;
    let date = time_field(message, "date")
        .ok_or_else(|| conversion(format!("message {message_id} has no date")))?;

    let entities = message
        .get("entities")
        .or_else(|| message.get("caption_entities"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(EventRecord {
        message_id,
        chat,
        sender: message.get("from").and_then(sender),
        content: content(message),
        date,
        edit_date: time_field(message, "edit_date"),
        reply_to_message_id: message
            .get("reply_to_message")
            .and_then(|reply| int(reply, "message_id")),
        forward: forward_info(message),
        entities,
        is_backfilled: false,
    })
}

fn user_target(action: ActionRecord, user: &Value) -> ActionRecord {
    action
        .with_target(int(user, "id"), "user", display_name(user))
        .with_data(json!({
            "user_id": int(user, "id"),
            "username": string(user, "username"),
            "first_name": string(user, "first_name"),
            "is_bot": flag(user, "is_bot"),
        }))
}

/// Actions implied by a message: service events, edits, polls, and games.
pub fn derive_actions(message: &Value, event: &EventRecord, edited: bool) -> Vec<ActionRecord> {
    let chat_id = Some(event.scope());
    let at = event.date;
    let new_action = |action_type: ActionType| {
        let action = ActionRecord::new(action_type, chat_id, at);
        match &event.sender {
            Some(actor) => action.with_actor(actor.clone()),
            None => action,
        }
    };
    let mut actions = Vec::new();

    if let Some(members) = message.get("new_chat_members").and_then(Value::as_array) {
        for member in members {
            actions.push(user_target(new_action(ActionType::MemberJoin), member));
        }
    }
    if let Some(member) = message.get("left_chat_member") {
        actions.push(user_target(new_action(ActionType::MemberLeave), member));
    }
    if let Some(pinned) = message.get("pinned_message") {
        let pinned_id = int(pinned, "message_id");
        actions.push(
            new_action(ActionType::MessagePin)
                .with_target(pinned_id, "message", None)
                .with_data(json!({ "message_id": pinned_id })),
        );
    }
    if let Some(title) = string(message, "new_chat_title") {
        actions.push(
            new_action(ActionType::ChatUpdate)
                .with_data(json!({ "field": "title" }))
                .with_change(None, Some(json!({ "title": title }))),
        );
    }
    if message.get("new_chat_photo").is_some() || flag(message, "delete_chat_photo") {
        let removed = flag(message, "delete_chat_photo");
        actions.push(
            new_action(ActionType::ChatUpdate).with_data(json!({ "field": "photo", "removed": removed })),
        );
    }
    if ["group_chat_created", "supergroup_chat_created", "channel_chat_created"]
        .iter()
        .any(|key| flag(message, key))
    {
        actions.push(
            new_action(ActionType::ChatCreate)
                .with_data(json!({ "chat_type": event.chat.kind.to_string() })),
        );
    }
    let migrate_to = int(message, "migrate_to_chat_id");
    let migrate_from = int(message, "migrate_from_chat_id");
    if migrate_to.is_some() || migrate_from.is_some() {
        actions.push(
            new_action(ActionType::ChatMigrate)
                .with_target(migrate_to.or(migrate_from), "chat", None)
                .with_data(json!({ "to_chat_id": migrate_to, "from_chat_id": migrate_from })),
        );
    }

    let video_chat = [
        ("video_chat_started", ActionType::VideoChatStarted),
        ("video_chat_ended", ActionType::VideoChatEnded),
        ("video_chat_scheduled", ActionType::VideoChatScheduled),
        ("video_chat_participants_invited", ActionType::VideoChatParticipantsInvited),
    ];
    for (key, action_type) in video_chat {
        if let Some(data) = message.get(key) {
            actions.push(new_action(action_type).with_data(data.clone()));
        }
    }

    if edited {
        let edited_at = event.edit_date.unwrap_or(at);
        let mut action = ActionRecord::new(ActionType::MessageEdit, chat_id, edited_at)
            .with_target(Some(event.message_id), "message", None)
            .with_change(
                None,
                Some(json!({
                    "text": event.content.body(),
                    "caption": event.content.caption(),
                })),
            );
        if let Some(actor) = &event.sender {
            action = action.with_actor(actor.clone());
        }
        actions.push(action);
    } else {
        match &event.content {
            EventContent::Poll { poll } => actions.push(
                new_action(ActionType::PollCreate)
                    .with_target(None, "poll", poll.get("question").and_then(Value::as_str).map(str::to_string))
                    .with_data(json!({ "poll_id": poll.get("id") })),
            ),
            EventContent::Dice { dice } => {
                actions.push(new_action(ActionType::DiceRoll).with_data(dice.clone()))
            }
            EventContent::Game { game } => actions.push(
                new_action(ActionType::GamePlay)
                    .with_target(None, "game", game.get("title").and_then(Value::as_str).map(str::to_string)),
            ),
            _ => {}
        }
    }

    actions
}

/// Convert a message into everything the pipeline needs: the event, its
/// derived actions, and the chat and sender identities.
pub fn update_from_message(message: &Value, edited: bool) -> Result<InboundUpdate, LoggerError> {
    let event = event_from_message(message)?;
    let actions = derive_actions(message, &event, edited);
    let chat = message
        .get("chat")
        .map(|c| chat_info(c, &event.chat))
        .unwrap_or_else(|| ChatInfo::from(&event.chat));
    let sender = message.get("from").and_then(user_info);

    Ok(InboundUpdate {
        event,
        actions,
        chat,
        sender,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tglogger_core::ContentKind;

    fn group_message(extra: Value) -> Value {
        let mut message = json!({
            "message_id": 10,
            "date": 1_700_000_000i64,
            "chat": {"id": -100123i64, "type": "supergroup", "title": "Test Group", "is_forum": true},
            "from": {"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada", "is_premium": true},
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut message, extra) {
            base.extend(extra);
        }
        message
    }

    #[test]
    fn text_message_maps_core_fields() {
        let message = group_message(json!({
            "text": "hello",
            "entities": [{"type": "bold", "offset": 0, "length": 5}],
            "reply_to_message": {"message_id": 7, "date": 1_699_999_000i64, "chat": {"id": -100123i64, "type": "supergroup"}},
        }));
        let event = event_from_message(&message).unwrap();

        assert_eq!(event.message_id, 10);
        assert_eq!(event.scope(), -100123);
        assert_eq!(event.chat.kind, ChatKind::Supergroup);
        assert_eq!(event.chat.title.as_deref(), Some("Test Group"));
        assert_eq!(event.content.body(), Some("hello"));
        assert_eq!(event.date.timestamp(), 1_700_000_000);
        assert_eq!(event.reply_to_message_id, Some(7));
        assert_eq!(event.entities.len(), 1);
        assert_eq!(event.sender.as_ref().map(|s| s.id), Some(42));
    }

    #[test]
    fn animation_wins_over_document_and_venue_over_location() {
        let animation = group_message(json!({
            "animation": {"file_id": "a"},
            "document": {"file_id": "a"},
            "caption": "lol",
        }));
        let event = event_from_message(&animation).unwrap();
        assert_eq!(event.content.kind(), ContentKind::Animation);
        assert_eq!(event.content.caption(), Some("lol"));

        let venue = group_message(json!({
            "venue": {"title": "Cafe"},
            "location": {"latitude": 1.0, "longitude": 2.0},
        }));
        assert_eq!(event_from_message(&venue).unwrap().content.kind(), ContentKind::Venue);
    }

    #[test]
    fn unknown_payload_becomes_service_content() {
        let message = group_message(json!({"new_chat_title": "Renamed"}));
        let event = event_from_message(&message).unwrap();
        match &event.content {
            EventContent::Service { service } => assert_eq!(service["new_chat_title"], "Renamed"),
            other => panic!("expected service content, got {other:?}"),
        }
    }

    #[test]
    fn forward_origin_is_read() {
        let message = group_message(json!({
            "text": "fwd",
            "forward_origin": {
                "type": "channel",
                "date": 1_690_000_000i64,
                "chat": {"id": -100999i64, "type": "channel", "title": "News"},
                "message_id": 55,
            },
        }));
        let forward = event_from_message(&message).unwrap().forward.unwrap();
        assert_eq!(forward.from_chat_id, Some(-100999));
        assert_eq!(forward.from_message_id, Some(55));
        assert_eq!(forward.date.map(|d| d.timestamp()), Some(1_690_000_000));
    }

    #[test]
    fn missing_chat_is_a_conversion_error() {
        let message = json!({"message_id": 1, "date": 1_700_000_000i64, "text": "x"});
        assert!(matches!(
            event_from_message(&message),
            Err(LoggerError::Conversion { .. })
        ));
    }

    #[test]
    fn membership_changes_derive_one_action_per_member() {
        let message = group_message(json!({
            "new_chat_members": [
                {"id": 1, "is_bot": false, "first_name": "A"},
                {"id": 2, "is_bot": true, "first_name": "B", "username": "bee_bot"},
            ],
        }));
        let update = update_from_message(&message, false).unwrap();

        assert_eq!(update.actions.len(), 2);
        assert!(update.actions.iter().all(|a| a.action_type == ActionType::MemberJoin));
        assert_eq!(update.actions[1].target_id, Some(2));
        assert_eq!(update.actions[1].target_name.as_deref(), Some("bee_bot"));
        assert_eq!(update.actions[0].actor.as_ref().map(|a| a.id), Some(42));
    }

    #[test]
    fn pins_titles_and_migrations_are_derived() {
        let message = group_message(json!({
            "pinned_message": {"message_id": 3, "date": 1i64, "chat": {"id": -100123i64, "type": "supergroup"}, "text": "x"},
            "new_chat_title": "New",
            "migrate_from_chat_id": -55,
        }));
        let update = update_from_message(&message, false).unwrap();
        let types: Vec<ActionType> = update.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            types,
            vec![ActionType::MessagePin, ActionType::ChatUpdate, ActionType::ChatMigrate]
        );
        assert_eq!(update.actions[0].target_id, Some(3));
    }

    #[test]
    fn edits_derive_a_message_edit_at_the_edit_time() {
        let message = group_message(json!({"text": "fixed", "edit_date": 1_700_000_600i64}));
        let update = update_from_message(&message, true).unwrap();

        assert_eq!(update.actions.len(), 1);
        let edit = &update.actions[0];
        assert_eq!(edit.action_type, ActionType::MessageEdit);
        assert_eq!(edit.occurred_at.timestamp(), 1_700_000_600);
        assert_eq!(edit.after.as_ref().unwrap()["text"], "fixed");
        assert_eq!(update.event.dedup_key(), "-100123_10_e1700000600");
    }

    #[test]
    fn polls_and_dice_derive_actions() {
        let poll = group_message(json!({"poll": {"id": "p1", "question": "Lunch?"}}));
        let update = update_from_message(&poll, false).unwrap();
        assert_eq!(update.actions[0].action_type, ActionType::PollCreate);
        assert_eq!(update.actions[0].target_name.as_deref(), Some("Lunch?"));

        let dice = group_message(json!({"dice": {"emoji": "🎲", "value": 4}}));
        let update = update_from_message(&dice, false).unwrap();
        assert_eq!(update.actions[0].action_type, ActionType::DiceRoll);
        assert_eq!(update.actions[0].action_data["value"], 4);
    }

    #[test]
    fn identities_carry_forum_and_premium_flags() {
        let update = update_from_message(&group_message(json!({"text": "x"})), false).unwrap();
        assert!(update.chat.is_forum);
        let user = update.sender.unwrap();
        assert_eq!(user.user_id, 42);
        assert!(user.is_premium);
    }

    #[test]
    fn teloxide_messages_convert_through_json() {
        let json = json!({
            "message_id": 1,
            "date": 1_700_000_000i64,
            "chat": {"id": 12345i64, "type": "private", "first_name": "Test"},
            "from": {"id": 12345u64, "is_bot": false, "first_name": "Test"},
            "text": "hello",
        });
        let message: teloxide::types::Message = serde_json::from_value(json).unwrap();
        let value = serde_json::to_value(&message).unwrap();

        let event = event_from_message(&value).unwrap();
        assert_eq!(event.scope(), 12345);
        assert_eq!(event.chat.kind, ChatKind::Private);
        assert_eq!(event.content.body(), Some("hello"));
    }
}

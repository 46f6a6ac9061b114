// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message content as a closed tagged union, plus the action type enumeration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The content-type tag of an event.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    VideoNote,
    Audio,
    Document,
    Voice,
    Sticker,
    Animation,
    Contact,
    Dice,
    Game,
    Poll,
    Venue,
    Location,
    Invoice,
    Payment,
    WebAppData,
    Service,
}

impl ContentKind {
    /// Column holding this kind's payload in the messages table.
    ///
    /// Text lives in the `text` column and service fields in the
    /// `service_data` column, so both return `None`.
    pub fn payload_column(self) -> Option<&'static str> {
        match self {
            ContentKind::Text | ContentKind::Service => None,
            ContentKind::Payment => Some("successful_payment"),
            other => Some(other.into()),
        }
    }

    /// Every payload column, in declaration order.
    pub fn payload_columns() -> impl Iterator<Item = &'static str> {
        Self::iter().filter_map(Self::payload_column)
    }
}

/// Typed content of a single event.
///
/// Each variant is constructed explicitly by the source adapter for the
/// one kind a message carries. Payloads stay opaque JSON because the
/// store keeps them as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventContent {
    Text { text: String },
    Photo { sizes: Value, caption: Option<String> },
    Video { video: Value, caption: Option<String> },
    VideoNote { video_note: Value },
    Audio { audio: Value, caption: Option<String> },
    Document { document: Value, caption: Option<String> },
    Voice { voice: Value, caption: Option<String> },
    Sticker { sticker: Value },
    Animation { animation: Value, caption: Option<String> },
    Contact { contact: Value },
    Dice { dice: Value },
    Game { game: Value },
    Poll { poll: Value },
    Venue { venue: Value },
    Location { location: Value },
    Invoice { invoice: Value },
    Payment { payment: Value },
    WebAppData { data: Value },
    /// Membership changes, pins, title changes and similar. The object's
    /// keys name the service fields that were present.
    Service { service: Value },
}

impl EventContent {
    pub fn text(text: impl Into<String>) -> Self {
        EventContent::Text { text: text.into() }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            EventContent::Text { .. } => ContentKind::Text,
            EventContent::Photo { .. } => ContentKind::Photo,
            EventContent::Video { .. } => ContentKind::Video,
            EventContent::VideoNote { .. } => ContentKind::VideoNote,
            EventContent::Audio { .. } => ContentKind::Audio,
            EventContent::Document { .. } => ContentKind::Document,
            EventContent::Voice { .. } => ContentKind::Voice,
            EventContent::Sticker { .. } => ContentKind::Sticker,
            EventContent::Animation { .. } => ContentKind::Animation,
            EventContent::Contact { .. } => ContentKind::Contact,
            EventContent::Dice { .. } => ContentKind::Dice,
            EventContent::Game { .. } => ContentKind::Game,
            EventContent::Poll { .. } => ContentKind::Poll,
            EventContent::Venue { .. } => ContentKind::Venue,
            EventContent::Location { .. } => ContentKind::Location,
            EventContent::Invoice { .. } => ContentKind::Invoice,
            EventContent::Payment { .. } => ContentKind::Payment,
            EventContent::WebAppData { .. } => ContentKind::WebAppData,
            EventContent::Service { .. } => ContentKind::Service,
        }
    }

    /// Message text, for text events only.
    pub fn body(&self) -> Option<&str> {
        match self {
            EventContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            EventContent::Photo { caption, .. }
            | EventContent::Video { caption, .. }
            | EventContent::Audio { caption, .. }
            | EventContent::Document { caption, .. }
            | EventContent::Voice { caption, .. }
            | EventContent::Animation { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }

    /// The opaque payload blob, for kinds that carry one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            EventContent::Text { .. } => None,
            EventContent::Photo { sizes, .. } => Some(sizes),
            EventContent::Video { video, .. } => Some(video),
            EventContent::VideoNote { video_note } => Some(video_note),
            EventContent::Audio { audio, .. } => Some(audio),
            EventContent::Document { document, .. } => Some(document),
            EventContent::Voice { voice, .. } => Some(voice),
            EventContent::Sticker { sticker } => Some(sticker),
            EventContent::Animation { animation, .. } => Some(animation),
            EventContent::Contact { contact } => Some(contact),
            EventContent::Dice { dice } => Some(dice),
            EventContent::Game { game } => Some(game),
            EventContent::Poll { poll } => Some(poll),
            EventContent::Venue { venue } => Some(venue),
            EventContent::Location { location } => Some(location),
            EventContent::Invoice { invoice } => Some(invoice),
            EventContent::Payment { payment } => Some(payment),
            EventContent::WebAppData { data } => Some(data),
            EventContent::Service { service } => Some(service),
        }
    }
}

/// Closed enumeration of derived actions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    MessageDelete,
    MessageEdit,
    MessagePin,
    MessageUnpin,
    MemberJoin,
    MemberLeave,
    MemberUpdate,
    MemberBan,
    MemberUnban,
    ChatCreate,
    ChatDelete,
    ChatUpdate,
    ChatMigrate,
    VoiceChatStarted,
    VoiceChatEnded,
    VoiceChatParticipantsInvited,
    InviteLinkCreate,
    InviteLinkRevoke,
    StickerSetAdd,
    StickerSetRemove,
    PollCreate,
    PollVote,
    DiceRoll,
    GamePlay,
    VideoChatStarted,
    VideoChatEnded,
    VideoChatParticipantsInvited,
    VideoChatScheduled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn payload_columns_follow_kind_names() {
        assert_eq!(ContentKind::Photo.payload_column(), Some("photo"));
        assert_eq!(ContentKind::VideoNote.payload_column(), Some("video_note"));
        assert_eq!(ContentKind::WebAppData.payload_column(), Some("web_app_data"));
        assert_eq!(ContentKind::Payment.payload_column(), Some("successful_payment"));
        assert_eq!(ContentKind::Text.payload_column(), None);
        assert_eq!(ContentKind::Service.payload_column(), None);
    }

    #[test]
    fn payload_columns_cover_every_media_kind() {
        let columns: Vec<_> = ContentKind::payload_columns().collect();
        assert_eq!(columns.len(), 17);
        assert!(columns.contains(&"photo"));
        assert!(columns.contains(&"successful_payment"));
        assert!(!columns.contains(&"text"));
        assert!(!columns.contains(&"service"));
    }

    #[test]
    fn content_is_tagged_by_kind() {
        let content = EventContent::Photo {
            sizes: serde_json::json!([{"file_id": "a"}]),
            caption: Some("sunset".into()),
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["kind"], "photo");
        assert_eq!(content.kind(), ContentKind::Photo);
        assert_eq!(content.caption(), Some("sunset"));
        assert!(content.body().is_none());
    }

    #[test]
    fn action_type_strings_are_snake_case() {
        assert_eq!(ActionType::VideoChatParticipantsInvited.to_string(), "video_chat_participants_invited");
        assert_eq!(ActionType::from_str("member_join").unwrap(), ActionType::MemberJoin);
        let json = serde_json::to_value(ActionType::MessagePin).unwrap();
        assert_eq!(json, "message_pin");
    }
}

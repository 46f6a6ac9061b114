// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the tglogger ingestion pipeline.
//!
//! This crate provides the records that flow through the pipeline, the
//! error taxonomy, and the trait seams every source and sink adapter
//! implements.

pub mod content;
pub mod error;
pub mod query;
pub mod record;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use content::{ActionType, ContentKind, EventContent};
pub use error::{ErrorClass, LoggerError, SinkError, SinkErrorKind};
pub use query::{Filter, Order, SelectQuery};
pub use record::{ActionRecord, Checkpoint, CheckpointUpdate, EventRecord, InboundUpdate};
pub use types::{
    AdapterType, ChatInfo, ChatKind, ChatRef, CheckpointKind, ForwardInfo, HealthStatus, Sender,
    UserInfo,
};

pub use traits::{AcceptAll, AdmissionFilter, EventSource, PluginAdapter, SinkClient};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_error_has_all_variants() {
        let _config = LoggerError::Config("test".into());
        let _connection = LoggerError::connection("unreachable");
        let _fatal = LoggerError::Fatal {
            operation: "store".into(),
            source: SinkError::http(400, "bad request"),
        };
        let _exhausted = LoggerError::RetryExhausted {
            operation: "store".into(),
            attempts: 3,
            source: SinkError::timeout("timed out"),
        };
        let _conversion = LoggerError::Conversion {
            message: "bad".into(),
        };
        let _source = LoggerError::source_failure("gone");
        let _running = LoggerError::BackfillRunning { scope: 1 };
        let _internal = LoggerError::Internal("test".into());
    }

    #[test]
    fn retry_exhausted_is_distinct_from_fatal() {
        let exhausted = LoggerError::RetryExhausted {
            operation: "insert_action".into(),
            attempts: 3,
            source: SinkError::http(503, "unavailable"),
        };
        assert!(!matches!(exhausted, LoggerError::Fatal { .. }));
        assert_eq!(exhausted.sink_error().and_then(|e| e.status), Some(503));
        assert_eq!(
            exhausted.to_string(),
            "insert_action failed after 3 attempts: unavailable"
        );
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Source, AdapterType::Sink, AdapterType::Observability] {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).unwrap(), variant);
        }
    }

    #[test]
    fn chat_kind_uses_platform_names() {
        assert_eq!(ChatKind::Supergroup.to_string(), "supergroup");
        assert_eq!(serde_json::to_value(ChatKind::Channel).unwrap(), "channel");
    }

    #[test]
    fn accept_all_admits_everything() {
        let event = EventRecord::new(
            1,
            ChatRef::new(1, ChatKind::Private),
            EventContent::text("x"),
            chrono::Utc::now(),
        );
        assert!(AcceptAll.should_process(&event));
    }
}

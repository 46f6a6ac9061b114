// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete tglogger pipeline.
//!
//! Bot API message JSON goes through the Telegram conversion, the
//! config-driven admission filter, the ingest pipeline, and the sink
//! adapter into an in-memory store. Each test builds its own harness.

use std::sync::Arc;

use serde_json::{Value, json};

use tglogger_config::model::TelegramConfig;
use tglogger_core::CheckpointKind;
use tglogger_ingest::{BackfillState, IngestOutcome};
use tglogger_telegram::ConfigAdmissionFilter;
use tglogger_telegram::convert::update_from_message;
use tglogger_test_utils::TestHarness;
use tglogger_test_utils::fixtures::{text_event, update};

const GROUP: i64 = -1001234;

fn bot_api_message(message_id: i64, extra: Value) -> Value {
    let mut message = json!({
        "message_id": message_id,
        "date": 1_767_225_600i64 + message_id,
        "chat": {"id": GROUP, "type": "supergroup", "title": "Ops"},
        "from": {"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada"},
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut message, extra) {
        base.extend(extra);
    }
    message
}

// ---- Live path ----

#[tokio::test]
async fn bot_api_message_is_stored_with_identities() {
    let harness = TestHarness::builder().build();
    let message = bot_api_message(5, json!({"text": "deploy done"}));
    let update = update_from_message(&message, false).unwrap();

    assert_eq!(harness.pipeline.ingest(update).await, IngestOutcome::Queued);
    harness.queue.drain().await;

    let rows = harness.stored_messages();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["chat_id"], GROUP);
    assert_eq!(rows[0]["message_id"], 5);
    assert_eq!(rows[0]["text"], "deploy done");

    let tables = &harness.config.sink.tables;
    assert_eq!(harness.sink.rows(&tables.chats)[0]["title"], "Ops");
    assert_eq!(harness.sink.rows(&tables.users)[0]["username"], "ada");

    let checkpoint = harness
        .checkpoint(CheckpointKind::Message, GROUP)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_id, Some(5));
}

#[tokio::test]
async fn service_message_stores_event_and_actions() {
    let harness = TestHarness::builder().build();
    let message = bot_api_message(
        6,
        json!({"new_chat_members": [
            {"id": 7, "is_bot": false, "first_name": "New"},
            {"id": 8, "is_bot": false, "first_name": "Newer"},
        ]}),
    );

    harness
        .pipeline
        .ingest(update_from_message(&message, false).unwrap())
        .await;
    harness.queue.drain().await;

    assert_eq!(harness.stored_messages().len(), 1);
    let actions = harness.stored_actions();
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| a["action_type"] == "member_join"));
    assert!(actions.iter().all(|a| a["chat_id"] == GROUP));
}

#[tokio::test]
async fn edit_is_stored_over_original_and_logged_as_action() {
    let harness = TestHarness::builder().build();
    let original = bot_api_message(9, json!({"text": "tpyo"}));
    let edited = bot_api_message(9, json!({"text": "typo", "edit_date": 1_767_225_700i64}));

    harness
        .pipeline
        .ingest(update_from_message(&original, false).unwrap())
        .await;
    harness.queue.drain().await;
    let outcome = harness
        .pipeline
        .ingest(update_from_message(&edited, true).unwrap())
        .await;
    harness.queue.drain().await;

    assert_eq!(outcome, IngestOutcome::Queued);
    let rows = harness.stored_messages();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["text"], "typo");
    assert!(
        harness
            .stored_actions()
            .iter()
            .any(|a| a["action_type"] == "message_edit")
    );
}

#[tokio::test]
async fn configured_filter_keeps_ignored_chats_out_of_the_store() {
    let telegram = TelegramConfig {
        ignored_chats: vec![GROUP],
        ..TelegramConfig::default()
    };
    let harness = TestHarness::builder()
        .with_filter(Arc::new(ConfigAdmissionFilter::new(&telegram)))
        .build();

    let ignored = update_from_message(&bot_api_message(1, json!({"text": "x"})), false).unwrap();
    assert_eq!(harness.pipeline.ingest(ignored).await, IngestOutcome::Filtered);
    assert_eq!(harness.pipeline.ingest(update(-5, 1)).await, IngestOutcome::Queued);
    harness.queue.drain().await;

    let rows = harness.stored_messages();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["chat_id"], -5);
    assert_eq!(harness.stats.snapshot().filtered, 1);
}

// ---- Backfill and live together ----

#[tokio::test]
async fn live_messages_after_backfill_skip_what_history_stored() {
    let harness = TestHarness::builder().build();
    harness
        .source
        .add_history((1..=3).map(|id| text_event(-7, id)).collect())
        .await;

    let status = harness.backfill.run(-7).await.unwrap();
    assert_eq!(status.state, BackfillState::Completed);
    assert_eq!(status.processed, 3);

    assert_eq!(
        harness.pipeline.ingest(update(-7, 3)).await,
        IngestOutcome::Duplicate
    );
    assert_eq!(harness.pipeline.ingest(update(-7, 4)).await, IngestOutcome::Queued);
    harness.queue.drain().await;

    assert_eq!(harness.stored_messages().len(), 4);
    let backfill = harness
        .checkpoint(CheckpointKind::Backfill, -7)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backfill.last_processed_id, Some(3));
    assert!(!backfill.backfill_in_progress);
    let live = harness
        .checkpoint(CheckpointKind::Message, -7)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.last_processed_id, Some(4));
}

// ---- Health ----

#[tokio::test]
async fn health_follows_store_reachability() {
    let harness = TestHarness::builder().build();
    harness.adapter.initialize().await.unwrap();
    assert!(harness.reporter.health().await.healthy);

    harness.sink.set_reachable(false);
    let report = harness.reporter.health().await;
    assert!(!report.healthy);
    assert!(!report.database.database_connected);
    assert!(report.database.error.is_some());

    harness.sink.set_reachable(true);
    assert!(harness.reporter.health().await.healthy);
}

#[tokio::test]
async fn health_reports_bot_identity_and_backfill_progress() {
    let harness = TestHarness::builder().build();
    harness.source.add_history(vec![text_event(-8, 1)]).await;
    harness.backfill.run(-8).await.unwrap();
    harness.pipeline.ingest(update(-9, 1)).await;

    let report = harness.reporter.health().await;
    assert_eq!(report.bot.user_id, Some(777));
    assert_eq!(report.bot.chat_count, 1);
    assert_eq!(report.queues.message_queue_size, 1);
    assert_eq!(report.stats.backfill_status[&-8i64].processed, 1);
    assert_eq!(report.stats.counters.backfilled, 1);
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue depth gauge as rendered by the Prometheus exporter.

#![cfg(feature = "prometheus")]

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;

use tglogger_core::{ActionRecord, ActionType};
use tglogger_test_utils::TestHarness;
use tglogger_test_utils::fixtures::text_event;

#[tokio::test]
async fn queue_depth_gauge_drops_to_zero_after_a_flush() {
    // A thread-local recorder; the test runtime polls on this thread only.
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let _recorder = metrics::set_default_local_recorder(&recorder);

    let h = TestHarness::builder().with_batch_size(2).build();

    h.queue.enqueue_event(text_event(42, 1)).await;
    assert!(handle.render().contains("tglogger_queue_depth{queue=\"event\"} 1"));

    h.queue.enqueue_event(text_event(42, 2)).await;
    assert_eq!(h.stored_messages().len(), 2);
    assert!(handle.render().contains("tglogger_queue_depth{queue=\"event\"} 0"));

    h.queue
        .enqueue_action(ActionRecord::new(ActionType::MessagePin, Some(42), Utc::now()))
        .await;
    assert!(handle.render().contains("tglogger_queue_depth{queue=\"action\"} 1"));
    h.queue.flush_actions().await;
    assert!(handle.render().contains("tglogger_queue_depth{queue=\"action\"} 0"));
}

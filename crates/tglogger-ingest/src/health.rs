// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health and stats reports served over HTTP and printed by the CLI.
//!
//! The process is healthy when the store answers, the source is connected,
//! and neither queue is at 90% of its capacity or more.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tglogger_core::EventSource;
use tglogger_storage::{DatabaseHealth, SinkAdapter};

use crate::backfill::{BackfillController, BackfillStatus};
use crate::pipeline::IngestPipeline;
use crate::queue::BatchQueue;
use crate::stats::{IngestStats, StatsCounters};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotHealth {
    pub bot_connected: bool,
    pub chat_count: usize,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueHealth {
    pub message_queue_size: usize,
    pub action_queue_size: usize,
    pub message_queue_full: bool,
    pub action_queue_full: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSizes {
    pub messages: usize,
    pub actions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub counters: StatsCounters,
    pub chats: usize,
    pub memory_usage_mb: f64,
    pub queue_sizes: QueueSizes,
    pub backfill_status: BTreeMap<i64, BackfillStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseHealth,
    pub bot: BotHealth,
    pub queues: QueueHealth,
    pub stats: StatsReport,
}

/// Builds reports from the live components.
#[derive(Clone)]
pub struct HealthReporter {
    sink: Arc<SinkAdapter>,
    source: Arc<dyn EventSource>,
    queue: Arc<BatchQueue>,
    pipeline: Arc<IngestPipeline>,
    backfill: BackfillController,
    stats: Arc<IngestStats>,
}

impl HealthReporter {
    pub fn new(
        sink: Arc<SinkAdapter>,
        source: Arc<dyn EventSource>,
        queue: Arc<BatchQueue>,
        pipeline: Arc<IngestPipeline>,
        backfill: BackfillController,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            sink,
            source,
            queue,
            pipeline,
            backfill,
            stats,
        }
    }

    pub fn stats(&self) -> StatsReport {
        let depths = self.queue.depths();
        StatsReport {
            uptime_seconds: self.stats.uptime().as_secs(),
            started_at: self.stats.started_at(),
            counters: self.stats.snapshot(),
            chats: self.pipeline.chat_count(),
            memory_usage_mb: self.stats.memory_usage_mb(),
            queue_sizes: QueueSizes {
                messages: depths.events,
                actions: depths.actions,
            },
            backfill_status: self.backfill.statuses(),
        }
    }

    pub async fn health(&self) -> HealthReport {
        let database = self.sink.health_check().await;
        let bot = BotHealth {
            bot_connected: self.source.is_connected(),
            chat_count: self.pipeline.chat_count(),
            user_id: self.source.account_id(),
        };
        let depths = self.queue.depths();
        let queues = QueueHealth {
            message_queue_size: depths.events,
            action_queue_size: depths.actions,
            message_queue_full: self.queue.is_full(depths.events),
            action_queue_full: self.queue.is_full(depths.actions),
        };

        let healthy = database.database_connected
            && bot.bot_connected
            && !queues.message_queue_full
            && !queues.action_queue_full;

        HealthReport {
            healthy,
            timestamp: Utc::now(),
            database,
            bot,
            queues,
            stats: self.stats(),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion core for tglogger.
//!
//! Live updates pass through [`IngestPipeline`] (dedup, admission,
//! identities) into the [`BatchQueue`], which flushes to the sink adapter
//! and advances `message` checkpoints. [`BackfillController`] drives the
//! same sink for historical pages under its own `backfill` checkpoints.

pub mod backfill;
pub mod dedup;
pub mod health;
pub mod pipeline;
pub mod queue;
pub mod shutdown;
pub mod stats;

pub use backfill::{BackfillController, BackfillDeps, BackfillState, BackfillStatus};
pub use dedup::DedupTracker;
pub use health::{BotHealth, HealthReport, HealthReporter, QueueHealth, QueueSizes, StatsReport};
pub use pipeline::{IngestOutcome, IngestPipeline};
pub use queue::{BatchQueue, QueueDepths};
pub use stats::{IngestStats, StatsCounters};

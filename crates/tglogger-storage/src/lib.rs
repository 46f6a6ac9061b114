// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the tglogger pipeline.
//!
//! [`SinkAdapter`] converts records to rows and writes them through the
//! retry executor, [`CheckpointManager`] keeps per-scope progress markers,
//! and [`PostgrestClient`] is the production [`SinkClient`](tglogger_core::SinkClient)
//! speaking to a Supabase/PostgREST endpoint.

pub mod adapter;
pub mod checkpoint;
pub mod postgrest;
pub mod rows;

pub use adapter::{BatchProgress, DatabaseHealth, PruneReport, ScopeProgress, SinkAdapter, SinkStatistics};
pub use checkpoint::CheckpointManager;
pub use postgrest::PostgrestClient;

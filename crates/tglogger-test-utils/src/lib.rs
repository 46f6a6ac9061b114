// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for tglogger integration tests.
//!
//! Provides mock adapters and a harness for fast, deterministic tests
//! without a network or a real store.
//!
//! # Components
//!
//! - [`MockSink`] - In-memory tables with call capture and failure injection
//! - [`MockSource`] - Scripted live updates and paged history
//! - [`TestHarness`] - The full pipeline wired to both mocks

pub mod fixtures;
pub mod harness;
pub mod mock_sink;
pub mod mock_source;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_sink::{MockSink, SinkCall, SinkOp};
pub use mock_source::MockSource;

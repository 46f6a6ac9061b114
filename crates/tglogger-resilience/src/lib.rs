// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure classification and retry for calls into the remote store.

pub mod classifier;
pub mod retry;

pub use classifier::{classify, classify_message, classify_status};
pub use retry::{RetryExecutor, RetryPolicy};

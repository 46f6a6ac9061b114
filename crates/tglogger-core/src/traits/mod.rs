// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pipeline's external collaborators.
//!
//! Sink and source adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod filter;
pub mod sink;
pub mod source;

pub use adapter::PluginAdapter;
pub use filter::{AcceptAll, AdmissionFilter};
pub use sink::SinkClient;
pub use source::EventSource;

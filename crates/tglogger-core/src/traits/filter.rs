// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission filter consulted by live ingestion and backfill alike.

use crate::record::EventRecord;

pub trait AdmissionFilter: Send + Sync + 'static {
    fn should_process(&self, event: &EventRecord) -> bool;
}

/// Admits every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AdmissionFilter for AcceptAll {
    fn should_process(&self, _event: &EventRecord) -> bool {
        true
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded set of recently seen event keys.
//!
//! When the set grows past `max_tracked` it keeps only the `retain` most
//! recently inserted keys. Forgetting an old key is harmless: events are
//! upserted, so a re-admitted duplicate overwrites its own row.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use tglogger_config::model::DedupConfig;

#[derive(Debug, Default)]
struct DedupState {
    order: VecDeque<String>,
    keys: HashSet<String>,
}

#[derive(Debug)]
pub struct DedupTracker {
    state: Mutex<DedupState>,
    max_tracked: usize,
    retain: usize,
}

impl DedupTracker {
    pub fn new(max_tracked: usize, retain: usize) -> Self {
        let max_tracked = max_tracked.max(1);
        Self {
            state: Mutex::new(DedupState::default()),
            max_tracked,
            retain: retain.min(max_tracked),
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.max_tracked, config.retain)
    }

    pub fn seen(&self, key: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.keys.contains(key))
            .unwrap_or(false)
    }

    pub fn mark(&self, key: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if !state.keys.insert(key.to_string()) {
            return;
        }
        state.order.push_back(key.to_string());

        if state.order.len() > self.max_tracked {
            let before = state.order.len();
            while state.order.len() > self.retain {
                if let Some(oldest) = state.order.pop_front() {
                    state.keys.remove(&oldest);
                }
            }
            debug!(before, after = state.order.len(), "dedup tracker trimmed");
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

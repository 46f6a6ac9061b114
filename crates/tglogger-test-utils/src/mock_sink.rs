// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory sink client for deterministic testing.
//!
//! `MockSink` implements `SinkClient` over JSON rows kept per table. It
//! honors upsert conflict keys, evaluates filters, ordering, and limits,
//! records every call for assertions, and can be told to fail. Bulk bodies
//! are checked the way PostgREST checks them: every object must carry the
//! same keys, and one upsert may not name the same conflict key twice.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use tglogger_core::{
    AdapterType, Filter, HealthStatus, LoggerError, PluginAdapter, SelectQuery, SinkClient,
    SinkError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOp {
    Ping,
    Upsert,
    Insert,
    Select,
    Delete,
    Count,
}

/// One captured call. `rows` is the number of rows written, or zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkCall {
    pub op: SinkOp,
    pub table: String,
    pub rows: usize,
}

pub struct MockSink {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<SinkCall>>,
    failures: Mutex<VecDeque<SinkError>>,
    reachable: AtomicBool,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSink {
    /// A reachable sink with empty tables.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            reachable: AtomicBool::new(true),
        }
    }

    /// When unreachable, every call fails with a network error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, AtomicOrdering::SeqCst);
    }

    /// Fail the next call (of any kind) with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, error: SinkError) {
        locked(&self.failures).push_back(error);
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        locked(&self.tables)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        locked(&self.tables).get(table).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        locked(&self.calls).clone()
    }

    /// Captured calls of one kind against one table.
    pub fn calls_for(&self, op: SinkOp, table: &str) -> Vec<SinkCall> {
        locked(&self.calls)
            .iter()
            .filter(|c| c.op == op && c.table == table)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        locked(&self.calls).clear();
    }

    fn begin(&self, op: SinkOp, table: &str, rows: usize) -> Result<(), SinkError> {
        locked(&self.calls).push(SinkCall {
            op,
            table: table.to_string(),
            rows,
        });
        if !self.reachable.load(AtomicOrdering::SeqCst) {
            return Err(SinkError::network("connection refused"));
        }
        match locked(&self.failures).pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders JSON scalars: numbers numerically, strings lexically, nulls last.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq(_, value) => compare(cell, value) == Ordering::Equal && !cell.is_null(),
        Filter::Lt(_, value) => !cell.is_null() && compare(cell, value) == Ordering::Less,
        Filter::IsNull(_) => cell.is_null(),
    }
}

fn same_key(existing: &Value, incoming: &Value, columns: &[&str]) -> bool {
    columns
        .iter()
        .all(|column| existing.get(*column) == incoming.get(*column))
}

fn check_uniform_keys(rows: &[Value]) -> Result<(), SinkError> {
    let keys = |row: &Value| {
        row.as_object()
            .map(|columns| columns.keys().cloned().collect::<BTreeSet<_>>())
    };
    let Some(first) = rows.first().map(keys) else {
        return Ok(());
    };
    if rows.iter().skip(1).any(|row| keys(row) != first) {
        return Err(SinkError::http(400, "All object keys must match"));
    }
    Ok(())
}

fn check_distinct_conflict_keys(rows: &[Value], columns: &[&str]) -> Result<(), SinkError> {
    for (i, row) in rows.iter().enumerate() {
        if rows[..i].iter().any(|earlier| same_key(earlier, row, columns)) {
            return Err(SinkError::http(
                500,
                "ON CONFLICT DO UPDATE command cannot affect row a second time",
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl PluginAdapter for MockSink {
    fn name(&self) -> &str {
        "mock-sink"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, LoggerError> {
        if self.reachable.load(AtomicOrdering::SeqCst) {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("unreachable".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}

#[async_trait]
impl SinkClient for MockSink {
    async fn ping(&self, table: &str) -> Result<(), SinkError> {
        self.begin(SinkOp::Ping, table, 0)
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str) -> Result<(), SinkError> {
        self.begin(SinkOp::Upsert, table, rows.len())?;
        let columns: Vec<&str> = on_conflict.split(',').map(str::trim).collect();
        check_uniform_keys(&rows)?;
        check_distinct_conflict_keys(&rows, &columns)?;
        let mut tables = locked(&self.tables);
        let stored = tables.entry(table.to_string()).or_default();

        for row in rows {
            match stored.iter_mut().find(|existing| same_key(existing, &row, &columns)) {
                Some(existing) => {
                    if let (Value::Object(target), Value::Object(source)) = (existing, row) {
                        target.extend(source);
                    }
                }
                None => stored.push(row),
            }
        }
        Ok(())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), SinkError> {
        self.begin(SinkOp::Insert, table, rows.len())?;
        check_uniform_keys(&rows)?;
        locked(&self.tables)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>, SinkError> {
        self.begin(SinkOp::Select, table, 0)?;
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let a = a.get(&order.column).unwrap_or(&Value::Null);
                let b = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = compare(a, b);
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<u64, SinkError> {
        self.begin(SinkOp::Delete, table, 0)?;
        let mut tables = locked(&self.tables);
        let Some(stored) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|row| !filters.iter().all(|f| matches(row, f)));
        Ok((before - stored.len()) as u64)
    }

    async fn count(&self, table: &str) -> Result<u64, SinkError> {
        self.begin(SinkOp::Count, table, 0)?;
        Ok(self.rows(table).len() as u64)
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a Supabase/PostgREST endpoint.
//!
//! Provides [`PostgrestClient`], the production [`SinkClient`]. Every table
//! lives under `{url}/rest/v1/{table}`. The client does not retry: failures
//! are mapped to a [`SinkError`] whose kind and status drive the retry
//! executor's classification.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::debug;

use tglogger_config::model::SinkConfig;
use tglogger_core::{
    AdapterType, Filter, HealthStatus, LoggerError, PluginAdapter, SelectQuery, SinkClient,
    SinkError, SinkErrorKind,
};

/// PostgREST-backed sink client.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    client: reqwest::Client,
    base_url: String,
    health_table: String,
}

impl PostgrestClient {
    /// Creates a client from the sink configuration.
    ///
    /// Requires `sink.url` and an API key (the service role key wins when
    /// both are set).
    pub fn new(config: &SinkConfig) -> Result<Self, LoggerError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| LoggerError::Config("sink.url is not set".into()))?;
        let key = config
            .effective_key()
            .ok_or_else(|| LoggerError::Config("sink.api_key is not set".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key)
                .map_err(|e| LoggerError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| LoggerError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.connection_timeout_secs.max(1)))
            .build()
            .map_err(|e| LoggerError::Connection {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            health_table: config.tables.checkpoints.clone(),
        })
    }

    fn table_url(&self, table: &str, params: &[(String, String)]) -> Result<Url, SinkError> {
        let raw = format!("{}/rest/v1/{table}", self.base_url);
        Url::parse_with_params(&raw, params)
            .map_err(|e| SinkError::other(format!("invalid sink URL {raw}: {e}")))
    }

    fn request(
        &self,
        method: Method,
        table: &str,
        params: &[(String, String)],
    ) -> Result<RequestBuilder, SinkError> {
        Ok(self.client.request(method, self.table_url(table, params)?))
    }

    async fn send(&self, operation: &str, table: &str, request: RequestBuilder) -> Result<Response, SinkError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        debug!(operation, table, status = %status, "sink response received");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::http(
            status.as_u16(),
            format!("{operation} on {table} returned {status}: {body}"),
        ))
    }
}

/// Maps transport failures onto sink error kinds.
fn map_reqwest_error(e: reqwest::Error) -> SinkError {
    if e.is_timeout() {
        SinkError::timeout(format!("request timed out: {e}"))
    } else if e.is_connect() || e.is_request() {
        SinkError::network(format!("HTTP request failed: {e}"))
    } else if e.is_decode() || e.is_body() {
        SinkError::new(SinkErrorKind::Decode, format!("failed to read response: {e}"))
    } else if let Some(status) = e.status() {
        SinkError::http(status.as_u16(), e.to_string())
    } else {
        SinkError::other(e.to_string())
    }
}

/// Renders a filter value the way PostgREST expects it in a query string.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", render_value(value))),
            Filter::Lt(column, value) => (column.clone(), format!("lt.{}", render_value(value))),
            Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
        })
        .collect()
}

fn select_params(query: &SelectQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Parses the total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl PluginAdapter for PostgrestClient {
    fn name(&self) -> &str {
        "postgrest"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, LoggerError> {
        match self.ping(&self.health_table).await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}

/// Names the columns of a bulk body so PostgREST reads every key of every
/// object rather than only those of the first. Single rows need no list.
fn columns_param(rows: &[Value]) -> Option<(String, String)> {
    if rows.len() < 2 {
        return None;
    }
    let columns: BTreeSet<&str> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    let list: Vec<&str> = columns.into_iter().collect();
    Some(("columns".to_string(), list.join(",")))
}

#[async_trait]
impl SinkClient for PostgrestClient {
    async fn ping(&self, table: &str) -> Result<(), SinkError> {
        let params = [
            ("select".to_string(), "*".to_string()),
            ("limit".to_string(), "1".to_string()),
        ];
        let request = self.request(Method::GET, table, &params)?;
        self.send("ping", table, request).await?;
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>, on_conflict: &str) -> Result<(), SinkError> {
        let mut params = vec![("on_conflict".to_string(), on_conflict.to_string())];
        params.extend(columns_param(&rows));
        let request = self
            .request(Method::POST, table, &params)?
            .header("prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);
        self.send("upsert", table, request).await?;
        Ok(())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), SinkError> {
        let params: Vec<_> = columns_param(&rows).into_iter().collect();
        let request = self
            .request(Method::POST, table, &params)?
            .header("prefer", "return=minimal")
            .json(&rows);
        self.send("insert", table, request).await?;
        Ok(())
    }

    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>, SinkError> {
        let request = self.request(Method::GET, table, &select_params(&query))?;
        let response = self.send("select", table, request).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| SinkError::new(SinkErrorKind::Decode, format!("failed to parse rows from {table}: {e}")))
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<u64, SinkError> {
        let request = self
            .request(Method::DELETE, table, &filter_params(&filters))?
            .header("prefer", "return=representation");
        let response = self.send("delete", table, request).await?;
        let removed = response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| SinkError::new(SinkErrorKind::Decode, format!("failed to parse deleted rows from {table}: {e}")))?;
        Ok(removed.len() as u64)
    }

    async fn count(&self, table: &str) -> Result<u64, SinkError> {
        let params = [("select".to_string(), "*".to_string())];
        let request = self
            .request(Method::HEAD, table, &params)?
            .header("prefer", "count=exact");
        let response = self.send("count", table, request).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                SinkError::new(
                    SinkErrorKind::Decode,
                    format!("count on {table} returned no usable Content-Range header"),
                )
            })
    }
}

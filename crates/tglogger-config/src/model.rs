// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the tglogger daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level tglogger configuration.
///
/// Built once at process start and handed to every component constructor.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// Telegram source and admission rules.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Remote store connection.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Retry policy for sink calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch queue sizing and flush cadence.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Dedup tracker bounds.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Historical backfill behavior.
    #[serde(default)]
    pub backfill: BackfillConfig,

    /// Health HTTP endpoint.
    #[serde(default)]
    pub health: HealthConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Periodic housekeeping and retention.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl LoggerConfig {
    /// A copy with every credential replaced, for printing.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.telegram.bot_token = copy.telegram.bot_token.as_ref().map(|_| REDACTED.into());
        copy.sink.api_key = copy.sink.api_key.as_ref().map(|_| REDACTED.into());
        copy.sink.service_role_key = copy.sink.service_role_key.as_ref().map(|_| REDACTED.into());
        copy
    }
}

const REDACTED: &str = "[REDACTED]";

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| REDACTED)
}

/// Telegram source configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. Required by `serve` and `backfill`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Store messages sent by bots.
    #[serde(default = "default_true")]
    pub process_bot_messages: bool,

    /// Store service messages (joins, pins, title changes).
    #[serde(default = "default_true")]
    pub process_system_messages: bool,

    /// Store channel posts.
    #[serde(default = "default_true")]
    pub process_channel_messages: bool,

    /// Chat ids to log. Empty means all chats.
    #[serde(default)]
    pub allowed_chats: Vec<i64>,

    /// Chat ids never logged. Wins over `allowed_chats`.
    #[serde(default)]
    pub ignored_chats: Vec<i64>,

    /// Channel usernames to log. Empty means all channels.
    #[serde(default)]
    pub allowed_channels: Vec<String>,

    /// Channel usernames never logged.
    #[serde(default)]
    pub ignored_channels: Vec<String>,

    /// Long polling timeout in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            process_bot_messages: true,
            process_system_messages: true,
            process_channel_messages: true,
            allowed_chats: Vec::new(),
            ignored_chats: Vec::new(),
            allowed_channels: Vec::new(),
            ignored_channels: Vec::new(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("process_bot_messages", &self.process_bot_messages)
            .field("process_system_messages", &self.process_system_messages)
            .field("process_channel_messages", &self.process_channel_messages)
            .field("allowed_chats", &self.allowed_chats)
            .field("ignored_chats", &self.ignored_chats)
            .field("allowed_channels", &self.allowed_channels)
            .field("ignored_channels", &self.ignored_channels)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_timeout_secs() -> u32 {
    30
}

/// Remote store (Supabase/PostgREST) configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Base URL of the project, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: Option<String>,

    /// Anonymous API key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Service role key. Used instead of `api_key` when set.
    #[serde(default)]
    pub service_role_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Table names.
    #[serde(default)]
    pub tables: TableNames,
}

impl SinkConfig {
    /// The key requests authenticate with.
    pub fn effective_key(&self) -> Option<&str> {
        self.service_role_key
            .as_deref()
            .or(self.api_key.as_deref())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            service_role_key: None,
            connection_timeout_secs: default_connection_timeout_secs(),
            tables: TableNames::default(),
        }
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("service_role_key", &redact(&self.service_role_key))
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("tables", &self.tables)
            .finish()
    }
}

fn default_connection_timeout_secs() -> u64 {
    30
}

/// Names of the five tables the pipeline writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableNames {
    #[serde(default = "default_messages_table")]
    pub messages: String,
    #[serde(default = "default_actions_table")]
    pub actions: String,
    #[serde(default = "default_checkpoints_table")]
    pub checkpoints: String,
    #[serde(default = "default_chats_table")]
    pub chats: String,
    #[serde(default = "default_users_table")]
    pub users: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            messages: default_messages_table(),
            actions: default_actions_table(),
            checkpoints: default_checkpoints_table(),
            chats: default_chats_table(),
            users: default_users_table(),
        }
    }
}

fn default_messages_table() -> String {
    "telegram_messages".to_string()
}

fn default_actions_table() -> String {
    "telegram_actions".to_string()
}

fn default_checkpoints_table() -> String {
    "telegram_checkpoints".to_string()
}

fn default_chats_table() -> String {
    "telegram_chats".to_string()
}

fn default_users_table() -> String {
    "telegram_users".to_string()
}

/// Retry policy for sink calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempt ceiling, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds. Doubles per attempt.
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: f64,

    /// Upper bound on any single delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,

    /// Random spread applied to each delay, as a fraction (0.1 = ±10%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_delay_secs() -> f64 {
    4.0
}

fn default_max_delay_secs() -> f64 {
    10.0
}

fn default_jitter() -> f64 {
    0.1
}

/// Batch queue sizing and flush cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Events per batch write; reaching it triggers a flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between background flushes.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Capacity of each queue. The oldest item is evicted on overflow.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_secs: default_flush_interval_secs(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_flush_interval_secs() -> u64 {
    30
}

fn default_max_queue_size() -> usize {
    10_000
}

/// Dedup tracker bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Hard cap on tracked keys.
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,

    /// Most recent keys kept when the cap is exceeded.
    #[serde(default = "default_retain")]
    pub retain: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_tracked: default_max_tracked(),
            retain: default_retain(),
        }
    }
}

fn default_max_tracked() -> usize {
    100_000
}

fn default_retain() -> usize {
    50_000
}

/// Historical backfill configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackfillConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Items stored between intermediate checkpoints.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause after each chunk and each page, in seconds.
    #[serde(default = "default_backfill_delay_secs")]
    pub delay_secs: f64,

    /// Items requested per history page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Skip items older than this many days.
    #[serde(default)]
    pub max_age_days: Option<u32>,

    /// Run backfill for `chats` when `serve` starts.
    #[serde(default = "default_true")]
    pub on_startup: bool,

    /// Chats to backfill at startup.
    #[serde(default)]
    pub chats: Vec<i64>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: default_chunk_size(),
            delay_secs: default_backfill_delay_secs(),
            page_size: default_page_size(),
            max_age_days: None,
            on_startup: true,
            chats: Vec::new(),
        }
    }
}

fn default_chunk_size() -> usize {
    100
}

fn default_backfill_delay_secs() -> f64 {
    1.0
}

fn default_page_size() -> usize {
    100
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_health_host")]
    pub host: String,

    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

fn default_health_host() -> String {
    "0.0.0.0".to_string()
}

fn default_health_port() -> u16 {
    8080
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Force debug verbosity regardless of `level`.
    #[serde(default)]
    pub debug: bool,
}

impl LoggingConfig {
    pub fn effective_level(&self) -> &str {
        if self.debug { "debug" } else { self.level.as_str() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            debug: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Housekeeping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Seconds between housekeeping passes.
    #[serde(default = "default_maintenance_interval_secs")]
    pub interval_secs: u64,

    /// Age in days beyond which `prune` deletes messages and actions.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// How long sink row counts are cached, in seconds.
    #[serde(default = "default_stats_cache_secs")]
    pub stats_cache_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_maintenance_interval_secs(),
            retention_days: default_retention_days(),
            stats_cache_secs: default_stats_cache_secs(),
        }
    }
}

fn default_maintenance_interval_secs() -> u64 {
    600
}

fn default_retention_days() -> u32 {
    90
}

fn default_stats_cache_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_credentials() {
        let mut config = LoggerConfig::default();
        config.telegram.bot_token = Some("123456:secret-token".into());
        config.sink.api_key = Some("anon-key".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("anon-key"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn service_role_key_takes_precedence() {
        let sink = SinkConfig {
            api_key: Some("anon".into()),
            service_role_key: Some("service".into()),
            ..SinkConfig::default()
        };
        assert_eq!(sink.effective_key(), Some("service"));
    }

    #[test]
    fn debug_flag_overrides_level() {
        let logging = LoggingConfig {
            level: "warn".into(),
            debug: true,
        };
        assert_eq!(logging.effective_level(), "debug");
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as numeric ranges, URL schemes, and credential shapes.

use crate::diagnostic::ConfigError;
use crate::model::LoggerConfig;

const MIN_BOT_TOKEN_LEN: usize = 40;
const MIN_API_KEY_LEN: usize = 100;
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LoggerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let malformed_token = config
        .telegram
        .bot_token
        .as_deref()
        .is_some_and(|token| token.len() < MIN_BOT_TOKEN_LEN || !token.contains(':'));
    if malformed_token {
        fail(format!(
            "telegram.bot_token must be at least {MIN_BOT_TOKEN_LEN} characters in `<id>:<secret>` form"
        ));
    }

    if let Some(url) = config
        .sink
        .url
        .as_deref()
        .filter(|url| !(url.starts_with("http://") || url.starts_with("https://")))
    {
        fail(format!("sink.url `{url}` must start with http:// or https://"));
    }

    for (name, key) in [
        ("sink.api_key", &config.sink.api_key),
        ("sink.service_role_key", &config.sink.service_role_key),
    ] {
        if key.as_deref().is_some_and(|key| key.len() < MIN_API_KEY_LEN) {
            fail(format!("{name} looks truncated (expected at least {MIN_API_KEY_LEN} characters)"));
        }
    }

    if config.sink.connection_timeout_secs == 0 {
        fail("sink.connection_timeout_secs must be greater than 0".to_string());
    }

    let tables = &config.sink.tables;
    for (name, value) in [
        ("messages", &tables.messages),
        ("actions", &tables.actions),
        ("checkpoints", &tables.checkpoints),
        ("chats", &tables.chats),
        ("users", &tables.users),
    ] {
        if value.trim().is_empty() {
            fail(format!("sink.tables.{name} must not be empty"));
        }
    }

    let retry = &config.retry;
    if !(1..=10).contains(&retry.max_attempts) {
        fail(format!(
            "retry.max_attempts must be between 1 and 10, got {}",
            retry.max_attempts
        ));
    }
    if !(0.1..=60.0).contains(&retry.min_delay_secs) {
        fail(format!(
            "retry.min_delay_secs must be between 0.1 and 60, got {}",
            retry.min_delay_secs
        ));
    }
    if retry.max_delay_secs < retry.min_delay_secs {
        fail(format!(
            "retry.max_delay_secs ({}) must not be below retry.min_delay_secs ({})",
            retry.max_delay_secs, retry.min_delay_secs
        ));
    }
    if !(0.0..=0.3).contains(&retry.jitter) {
        fail(format!("retry.jitter must be between 0.0 and 0.3, got {}", retry.jitter));
    }

    let queue = &config.queue;
    if !(1..=500).contains(&queue.batch_size) {
        fail(format!(
            "queue.batch_size must be between 1 and 500, got {}",
            queue.batch_size
        ));
    }
    if queue.flush_interval_secs == 0 {
        fail("queue.flush_interval_secs must be at least 1".to_string());
    }
    if queue.max_queue_size < queue.batch_size {
        fail(format!(
            "queue.max_queue_size ({}) must be at least queue.batch_size ({})",
            queue.max_queue_size, queue.batch_size
        ));
    }

    if config.dedup.max_tracked == 0 {
        fail("dedup.max_tracked must be at least 1".to_string());
    }
    if config.dedup.retain >= config.dedup.max_tracked {
        fail(format!(
            "dedup.retain ({}) must be below dedup.max_tracked ({})",
            config.dedup.retain, config.dedup.max_tracked
        ));
    }

    let backfill = &config.backfill;
    if !(1..=1000).contains(&backfill.chunk_size) {
        fail(format!(
            "backfill.chunk_size must be between 1 and 1000, got {}",
            backfill.chunk_size
        ));
    }
    if !(1..=100).contains(&backfill.page_size) {
        fail(format!(
            "backfill.page_size must be between 1 and 100, got {}",
            backfill.page_size
        ));
    }
    if backfill.delay_secs < 0.0 || !backfill.delay_secs.is_finite() {
        fail(format!(
            "backfill.delay_secs must be a non-negative number, got {}",
            backfill.delay_secs
        ));
    }
    if backfill.max_age_days == Some(0) {
        fail("backfill.max_age_days must be at least 1 when set".to_string());
    }

    if config.health.port < 1024 {
        fail(format!(
            "health.port must be between 1024 and 65535, got {}",
            config.health.port
        ));
    }
    if config.health.host.trim().is_empty() {
        fail("health.host must not be empty".to_string());
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.maintenance.interval_secs == 0 {
        fail("maintenance.interval_secs must be at least 1".to_string());
    }
    if config.maintenance.retention_days == 0 {
        fail("maintenance.retention_days must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the settings `serve` and `backfill` cannot run without.
///
/// Kept separate from [`validate_config`] so `config check` and defaults
/// still validate on a machine with no credentials.
pub fn require_runtime_credentials(config: &LoggerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    if config.telegram.bot_token.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "telegram.bot_token".to_string(),
        });
    }
    if config.sink.url.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "sink.url".to_string(),
        });
    }
    if config.sink.effective_key().is_none() {
        errors.push(ConfigError::MissingKey {
            key: "sink.api_key".to_string(),
        });
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tglogger.toml` > `~/.config/tglogger/tglogger.toml`
//! > `/etc/tglogger/tglogger.toml`, with environment variable overrides via
//! the `TGLOGGER_` prefix and the platform-provided `PORT` variable.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LoggerConfig;

/// Section prefixes for env var mapping, longest first so nested tables win.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("sink_tables_", "sink.tables."),
    ("telegram_", "telegram."),
    ("sink_", "sink."),
    ("retry_", "retry."),
    ("queue_", "queue."),
    ("dedup_", "dedup."),
    ("backfill_", "backfill."),
    ("health_", "health."),
    ("metrics_", "metrics."),
    ("logging_", "logging."),
    ("maintenance_", "maintenance."),
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/tglogger/tglogger.toml";
pub(crate) const LOCAL_CONFIG: &str = "tglogger.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("tglogger/tglogger.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tglogger/tglogger.toml` (system-wide)
/// 3. `~/.config/tglogger/tglogger.toml` (user XDG config)
/// 4. `./tglogger.toml` (local directory)
/// 5. `TGLOGGER_*` environment variables, then `PORT`
pub fn load_config() -> Result<LoggerConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LoggerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LoggerConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LoggerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LoggerConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(port_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LoggerConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
        .merge(port_provider())
}

/// Map a prefix-stripped, lowercased env var name to its dotted config path.
///
/// Uses explicit section prefixes rather than splitting on `_`, since key
/// names contain underscores: `telegram_bot_token` must become
/// `telegram.bot_token`, not `telegram.bot.token`.
pub fn map_env_key(key: &str) -> String {
    for (prefix, section) in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{section}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("TGLOGGER_").map(|key| map_env_key(key.as_str()).into())
}

/// Hosting platforms announce the port to listen on through `PORT`.
fn port_provider() -> Env {
    Env::raw().only(&["PORT"]).map(|_| "health.port".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("telegram_bot_token"), "telegram.bot_token");
        assert_eq!(map_env_key("sink_tables_messages"), "sink.tables.messages");
        assert_eq!(map_env_key("sink_service_role_key"), "sink.service_role_key");
        assert_eq!(map_env_key("queue_batch_size"), "queue.batch_size");
        assert_eq!(
            map_env_key("telegram_process_bot_messages"),
            "telegram.process_bot_messages"
        );
        assert_eq!(map_env_key("unknown"), "unknown");
    }

    #[test]
    fn env_overrides_are_applied() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TGLOGGER_QUEUE_BATCH_SIZE", "25");
            jail.set_env("TGLOGGER_SINK_URL", "https://example.supabase.co");
            jail.set_env("PORT", "9000");
            let config = load_config().expect("config should load");
            assert_eq!(config.queue.batch_size, 25);
            assert_eq!(config.sink.url.as_deref(), Some("https://example.supabase.co"));
            assert_eq!(config.health.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tglogger.toml",
                r#"
[backfill]
chunk_size = 50
chats = [-1001, 42]
"#,
            )?;
            let config = load_config().expect("config should load");
            assert_eq!(config.backfill.chunk_size, 50);
            assert_eq!(config.backfill.chats, vec![-1001, 42]);
            Ok(())
        });
    }
}

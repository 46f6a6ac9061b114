// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! tglogger - Telegram message logging daemon.
//!
//! This is the binary entry point for tglogger.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tglogger_config::{ConfigError, LoggerConfig};

/// tglogger - Telegram message logging daemon.
#[derive(Parser, Debug)]
#[command(name = "tglogger", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Log live messages until interrupted.
    Serve,
    /// Backfill history for the given chats and print a JSON report.
    Backfill {
        /// Chat id to backfill. Repeat for several chats.
        #[arg(long = "chat", required = true, allow_negative_numbers = true)]
        chats: Vec<i64>,
    },
    /// Print store statistics and checkpoints as JSON.
    Status,
    /// Delete messages and actions older than the retention period.
    Prune {
        /// Retention in days (defaults to maintenance.retention_days).
        #[arg(long)]
        days: Option<u32>,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate and print the effective configuration, secrets redacted.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<LoggerConfig, Vec<ConfigError>> {
    match path {
        Some(path) => tglogger_config::load_and_validate_path(path),
        None => tglogger_config::load_and_validate(),
    }
}

fn load_or_exit(path: Option<&PathBuf>, needs_credentials: bool) -> LoggerConfig {
    let loaded = load(path).and_then(|config| {
        if needs_credentials {
            tglogger_config::require_runtime_credentials(&config)?;
        }
        Ok(config)
    });
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            tglogger_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let needs_credentials = !matches!(cli.command, Commands::Config { .. });
    let config = load_or_exit(cli.config.as_ref(), needs_credentials);
    serve::init_tracing(config.logging.effective_level());

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Backfill { chats } => commands::run_backfill(&config, &chats).await,
        Commands::Status => commands::run_status(&config).await,
        Commands::Prune { days } => commands::run_prune(&config, days).await,
        Commands::Config {
            action: ConfigCommands::Check,
        } => commands::render_config(&config).map(|rendered| {
            eprintln!("tglogger: configuration is valid");
            print!("{rendered}");
        }),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_repeated_chats() {
        let cli = Cli::try_parse_from(["tglogger", "backfill", "--chat", "-100", "--chat", "42"])
            .unwrap();
        match cli.command {
            Commands::Backfill { chats } => assert_eq!(chats, vec![-100, 42]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_backfill_requires_a_chat() {
        assert!(Cli::try_parse_from(["tglogger", "backfill"]).is_err());
    }

    #[test]
    fn cli_accepts_global_config_path() {
        let cli = Cli::try_parse_from(["tglogger", "prune", "--days", "30", "--config", "/tmp/t.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
        assert!(matches!(cli.command, Commands::Prune { days: Some(30) }));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tglogger.toml");
        std::fs::write(&path, "[queue]\nbatch_size = 7\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.queue.batch_size, 7);
    }

    #[test]
    fn explicit_config_file_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tglogger.toml");
        std::fs::write(&path, "[queue]\nbatch_sise = 7\n").unwrap();

        assert!(load(Some(&path)).is_err());
    }
}

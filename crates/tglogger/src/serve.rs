// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tglogger serve` command implementation.
//!
//! Wires the Telegram source, the PostgREST sink, and the ingest pipeline
//! together, runs the background loops, and shuts everything down in order
//! when SIGINT or SIGTERM arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tglogger_config::LoggerConfig;
use tglogger_core::{EventSource, LoggerError};
use tglogger_gateway::{GatewayState, MetricsRender, ServerConfig};
use tglogger_ingest::{BatchQueue, IngestPipeline, IngestStats, shutdown};
use tglogger_storage::PostgrestClient;
use tglogger_telegram::{ConfigAdmissionFilter, TelegramSource};

use crate::services::Services;

/// Pause after a failed `receive()` before trying again.
const RECEIVE_RETRY: Duration = Duration::from_secs(1);

/// Runs the `tglogger serve` command until a shutdown signal.
pub async fn run_serve(config: LoggerConfig) -> Result<(), LoggerError> {
    info!("starting tglogger serve");

    let client = Arc::new(PostgrestClient::new(&config.sink)?);
    let source = Arc::new(TelegramSource::new(config.telegram.clone())?);
    let filter = Arc::new(ConfigAdmissionFilter::new(&config.telegram));
    let cancel = shutdown::install_signal_handler();
    let services = Services::assemble(&config, client, source.clone(), filter, &cancel);

    services.adapter.initialize().await?;

    #[cfg(feature = "prometheus")]
    let metrics_render = install_metrics(&config)?;
    #[cfg(not(feature = "prometheus"))]
    let metrics_render: Option<MetricsRender> = None;

    // History must be read before long polling owns getUpdates.
    if config.backfill.enabled && config.backfill.on_startup {
        for &chat_id in &config.backfill.chats {
            if cancel.is_cancelled() {
                break;
            }
            match services.backfill.run(chat_id).await {
                Ok(status) => info!(chat_id, processed = status.processed, state = ?status.state, "startup backfill finished"),
                Err(e) => warn!(chat_id, error = %e, "startup backfill failed"),
            }
        }
    }

    if let Err(e) = source.connect().await {
        error!(error = %e, "failed to start Telegram polling");
        services.shutdown().await?;
        return Err(e);
    }

    let mut tasks = JoinSet::new();
    {
        let queue = services.queue.clone();
        let period = Duration::from_secs(config.queue.flush_interval_secs);
        let cancel = cancel.clone();
        tasks.spawn(async move { flush_loop(queue, period, cancel).await });
    }
    {
        let stats = services.stats.clone();
        let period = Duration::from_secs(config.maintenance.interval_secs);
        let cancel = cancel.clone();
        tasks.spawn(async move { maintenance_loop(stats, period, cancel).await });
    }
    if config.health.enabled {
        let server_config = ServerConfig {
            host: config.health.host.clone(),
            port: config.health.port,
        };
        let state = GatewayState {
            reporter: services.reporter.clone(),
            prometheus_render: metrics_render,
        };
        let cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(e) = tglogger_gateway::start_server(&server_config, state, cancel).await {
                error!(error = %e, "health server failed");
            }
        });
    }

    info!("tglogger is logging messages");
    receive_loop(services.source.clone(), services.pipeline.clone(), cancel.clone()).await;

    info!("shutting down");
    cancel.cancel();
    while tasks.join_next().await.is_some() {}
    services.shutdown().await?;

    info!("tglogger serve shutdown complete");
    Ok(())
}

#[cfg(feature = "prometheus")]
fn install_metrics(config: &LoggerConfig) -> Result<Option<MetricsRender>, LoggerError> {
    if !config.metrics.enabled {
        return Ok(None);
    }
    let exporter = Arc::new(tglogger_prometheus::PrometheusAdapter::new()?);
    let render: MetricsRender = Arc::new(move || exporter.render());
    Ok(Some(render))
}

/// Feed updates into the pipeline until `cancel` fires.
pub async fn receive_loop(
    source: Arc<dyn EventSource>,
    pipeline: Arc<IngestPipeline>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = source.receive() => match received {
                Ok(update) => {
                    let outcome = pipeline.ingest(update).await;
                    debug!(?outcome, "update ingested");
                }
                Err(e) => {
                    warn!(error = %e, "receive failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_RETRY) => {}
                    }
                }
            },
        }
    }
    debug!("receive loop stopped");
}

/// Flush whatever is queued every `period`.
pub async fn flush_loop(queue: Arc<BatchQueue>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let (events, actions) = queue.flush().await;
                if events + actions > 0 {
                    debug!(events, actions, "periodic flush");
                }
            }
            _ = cancel.cancelled() => {
                debug!("flush loop shutting down");
                break;
            }
        }
    }
}

/// Sample memory into the stats every `period` and log a summary.
pub async fn maintenance_loop(stats: Arc<IngestStats>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let memory = sample_memory();
                stats.set_memory_usage(memory.reported());

                #[cfg(feature = "prometheus")]
                {
                    tglogger_prometheus::set_memory_heap(memory.heap as f64);
                    tglogger_prometheus::set_memory_resident(memory.resident as f64);
                    tglogger_prometheus::set_memory_rss(memory.rss as f64);
                }

                let counters = stats.snapshot();
                info!(
                    messages = counters.messages_processed,
                    actions = counters.actions_processed,
                    errors = counters.errors,
                    duplicates = counters.duplicates_skipped,
                    memory_mb = stats.memory_usage_mb(),
                    uptime_secs = stats.uptime().as_secs(),
                    "maintenance"
                );
            }
            _ = cancel.cancelled() => {
                debug!("maintenance loop shutting down");
                break;
            }
        }
    }
}

/// Process memory in bytes. Unavailable readings are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub heap: u64,
    pub resident: u64,
    pub rss: u64,
}

impl MemorySample {
    /// RSS when the OS reports it, jemalloc resident bytes otherwise.
    pub fn reported(&self) -> u64 {
        if self.rss > 0 { self.rss } else { self.resident }
    }
}

#[cfg(not(target_env = "msvc"))]
pub fn sample_memory() -> MemorySample {
    // Stats are cached until the epoch advances.
    let _ = tikv_jemalloc_ctl::epoch::advance();
    MemorySample {
        heap: tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0) as u64,
        resident: tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0) as u64,
        rss: read_rss_bytes().unwrap_or(0),
    }
}

#[cfg(target_env = "msvc")]
pub fn sample_memory() -> MemorySample {
    MemorySample {
        rss: read_rss_bytes().unwrap_or(0),
        ..MemorySample::default()
    }
}

/// Read the process RSS in bytes from /proc/self/statm (Linux only).
fn read_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let rss_pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
        Some(rss_pages * 4096)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tglogger={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tglogger_core::AcceptAll;
    use tglogger_test_utils::fixtures::update;
    use tglogger_test_utils::{MockSink, MockSource};

    fn services(sink: Arc<MockSink>, source: Arc<MockSource>) -> Services {
        let mut config = LoggerConfig::default();
        config.queue.batch_size = 2;
        Services::assemble(&config, sink, source, Arc::new(AcceptAll), &CancellationToken::new())
    }

    #[tokio::test]
    async fn receive_loop_feeds_pipeline_until_cancelled() {
        let sink = Arc::new(MockSink::new());
        let source = Arc::new(MockSource::new());
        let services = services(sink.clone(), source.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(receive_loop(
            services.source.clone(),
            services.pipeline.clone(),
            cancel.clone(),
        ));

        source.inject(update(-100, 1)).await;
        source.inject(update(-100, 2)).await;
        for _ in 0..100 {
            if sink.rows("telegram_messages").len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.rows("telegram_messages").len(), 2);
        assert_eq!(services.stats.snapshot().messages_processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_loop_flushes_partial_batches_on_each_tick() {
        let sink = Arc::new(MockSink::new());
        let services = services(sink.clone(), Arc::new(MockSource::new()));
        let cancel = CancellationToken::new();

        services.pipeline.ingest(update(-100, 1)).await;
        let handle = tokio::spawn(flush_loop(
            services.queue.clone(),
            Duration::from_secs(30),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(31)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.rows("telegram_messages").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_loop_records_memory_usage() {
        let stats = Arc::new(IngestStats::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(maintenance_loop(
            stats.clone(),
            Duration::from_secs(600),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        handle.await.unwrap();

        if cfg!(target_os = "linux") {
            assert!(stats.memory_usage_mb() > 0.0);
        }
    }

    #[test]
    fn reported_memory_prefers_rss() {
        let sample = MemorySample {
            heap: 10,
            resident: 20,
            rss: 30,
        };
        assert_eq!(sample.reported(), 30);
        let no_rss = MemorySample { rss: 0, ..sample };
        assert_eq!(no_rss.reported(), 20);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn rss_is_readable_on_linux() {
        assert!(read_rss_bytes().unwrap_or(0) > 0);
    }
}

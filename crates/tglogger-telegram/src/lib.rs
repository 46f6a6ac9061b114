// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram event source for the tglogger pipeline.
//!
//! Implements [`EventSource`] for the Telegram Bot API via teloxide:
//! long polling for live messages, edits, and channel posts, plus paged
//! history read from pending updates.

pub mod convert;
pub mod filter;

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::dispatching::ShutdownToken;
use teloxide::dptree;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, UpdateKind};
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tglogger_config::model::TelegramConfig;
use tglogger_core::{
    AdapterType, EventRecord, EventSource, HealthStatus, InboundUpdate, LoggerError,
    PluginAdapter,
};

pub use filter::ConfigAdmissionFilter;

/// Capacity of the channel between the dispatcher and `receive()`.
const INBOUND_CAPACITY: usize = 1000;

/// Most updates the Bot API returns from one `getUpdates` call.
const MAX_UPDATES: u8 = 100;

/// `account_id` value before the first successful `getMe`.
const UNKNOWN_ACCOUNT: i64 = 0;

struct PollingTask {
    handle: JoinHandle<()>,
    token: ShutdownToken,
}

/// Telegram source implementing [`EventSource`].
pub struct TelegramSource {
    bot: Bot,
    config: TelegramConfig,
    inbound_tx: mpsc::Sender<InboundUpdate>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundUpdate>>,
    polling: StdMutex<Option<PollingTask>>,
    connected: AtomicBool,
    account_id: AtomicI64,
}

fn source_error(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> LoggerError {
    LoggerError::Source {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

impl TelegramSource {
    /// Creates a new Telegram source.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: TelegramConfig) -> Result<Self, LoggerError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            LoggerError::Config("telegram.bot_token is required for the Telegram source".into())
        })?;
        if token.is_empty() {
            return Err(LoggerError::Config("telegram.bot_token cannot be empty".into()));
        }

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        Ok(Self {
            bot,
            config,
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            polling: StdMutex::new(None),
            connected: AtomicBool::new(false),
            account_id: AtomicI64::new(UNKNOWN_ACCOUNT),
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Call `getMe`, recording the outcome and the bot's user id.
    pub async fn verify(&self) -> Result<i64, LoggerError> {
        match self.bot.get_me().await {
            Ok(me) => {
                let id = me.user.id.0 as i64;
                self.account_id.store(id, Ordering::Relaxed);
                self.connected.store(true, Ordering::Relaxed);
                Ok(id)
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                Err(source_error("getMe failed", e))
            }
        }
    }

    fn is_polling(&self) -> bool {
        self.polling.lock().map(|p| p.is_some()).unwrap_or(false)
    }
}

/// Convert one message and hand it to `receive()`.
async fn forward(tx: mpsc::Sender<InboundUpdate>, msg: Message, edited: bool) -> ResponseResult<()> {
    let converted = serde_json::to_value(&msg)
        .map_err(|e| LoggerError::Conversion {
            message: e.to_string(),
        })
        .and_then(|value| convert::update_from_message(&value, edited));

    match converted {
        Ok(update) => {
            if tx.send(update).await.is_err() {
                warn!("inbound channel closed, dropping update");
            }
        }
        Err(e) => warn!(
            chat_id = msg.chat.id.0,
            message_id = msg.id.0,
            error = %e,
            "failed to convert message"
        ),
    }
    respond(())
}

#[async_trait]
impl PluginAdapter for TelegramSource {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, LoggerError> {
        match self.verify().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("Telegram bot unreachable: {e}"))),
        }
    }

    /// Stop long polling, waiting for in-flight handlers.
    async fn shutdown(&self) -> Result<(), LoggerError> {
        let task = self.polling.lock().ok().and_then(|mut p| p.take());
        let Some(task) = task else {
            return Ok(());
        };

        match task.token.shutdown() {
            Ok(stopped) => stopped.await,
            Err(_) => debug!("dispatcher was idle at shutdown"),
        }
        task.handle.abort();
        self.connected.store(false, Ordering::Relaxed);
        info!("Telegram polling stopped");
        Ok(())
    }
}

#[async_trait]
impl EventSource for TelegramSource {
    async fn connect(&self) -> Result<(), LoggerError> {
        if self.is_polling() {
            return Ok(());
        }
        let account = self.verify().await?;

        let tx = self.inbound_tx.clone();
        let endpoint = |edited: bool| {
            let tx = tx.clone();
            move |msg: Message| forward(tx.clone(), msg, edited)
        };
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(endpoint(false)))
            .branch(Update::filter_edited_message().endpoint(endpoint(true)))
            .branch(Update::filter_channel_post().endpoint(endpoint(false)))
            .branch(Update::filter_edited_channel_post().endpoint(endpoint(true)));

        let listener = Polling::builder(self.bot.clone())
            .timeout(Duration::from_secs(u64::from(self.config.poll_timeout_secs)))
            .allowed_updates(vec![
                AllowedUpdate::Message,
                AllowedUpdate::EditedMessage,
                AllowedUpdate::ChannelPost,
                AllowedUpdate::EditedChannelPost,
            ])
            .build();

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build();
        let token = dispatcher.shutdown_token();

        let handle = tokio::spawn(async move {
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("Telegram update listener error"),
                )
                .await;
        });

        if let Ok(mut polling) = self.polling.lock() {
            *polling = Some(PollingTask { handle, token });
        }
        info!(bot_id = account, "started Telegram long polling");
        Ok(())
    }

    async fn receive(&self) -> Result<InboundUpdate, LoggerError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| LoggerError::source_failure("Telegram inbound channel closed"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn account_id(&self) -> Option<i64> {
        match self.account_id.load(Ordering::Relaxed) {
            UNKNOWN_ACCOUNT => None,
            id => Some(id),
        }
    }

    /// Read pending updates without acknowledging them, keeping messages of
    /// `scope` newer than `after`.
    ///
    /// The Bot API forbids `getUpdates` while long polling runs, so this is
    /// only called before [`connect`](EventSource::connect).
    async fn fetch_history(
        &self,
        scope: i64,
        after: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, LoggerError> {
        let updates = self
            .bot
            .get_updates()
            .limit(MAX_UPDATES)
            .timeout(0)
            .await
            .map_err(|e| source_error("getUpdates failed", e))?;
        self.connected.store(true, Ordering::Relaxed);

        let mut page = Vec::new();
        for update in updates {
            let msg = match update.kind {
                UpdateKind::Message(m)
                | UpdateKind::EditedMessage(m)
                | UpdateKind::ChannelPost(m)
                | UpdateKind::EditedChannelPost(m) => m,
                _ => continue,
            };
            if msg.chat.id.0 != scope || i64::from(msg.id.0) <= after {
                continue;
            }
            let converted = serde_json::to_value(&msg)
                .map_err(|e| LoggerError::Conversion {
                    message: e.to_string(),
                })
                .and_then(|value| convert::event_from_message(&value));
            match converted {
                Ok(event) => page.push(event),
                Err(e) => warn!(chat_id = scope, message_id = msg.id.0, error = %e, "skipping history item"),
            }
        }

        page.sort_by_key(|e| e.message_id);
        page.truncate(limit);
        debug!(chat_id = scope, after, count = page.len(), "fetched history page");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(matches!(
            TelegramSource::new(config(None)),
            Err(LoggerError::Config(_))
        ));
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramSource::new(config(Some(""))).is_err());
    }

    #[tokio::test]
    async fn fresh_source_is_disconnected_without_account() {
        let source =
            TelegramSource::new(config(Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11"))).unwrap();
        assert!(!source.is_connected());
        assert_eq!(source.account_id(), None);
        assert_eq!(source.name(), "telegram");
        assert_eq!(source.adapter_type(), AdapterType::Source);
        // Not polling yet, so shutdown has nothing to stop.
        source.shutdown().await.unwrap();
    }
}

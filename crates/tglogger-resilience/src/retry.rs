// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff for sink calls.
//!
//! # Usage
//!
//! ```rust,ignore
//! let executor = RetryExecutor::new(RetryPolicy::from(&config.retry));
//! let rows = executor
//!     .execute("select_checkpoint", || client.select(table, query.clone()))
//!     .await?;
//! ```
//!
//! Every attempt is logged at `debug`, every transient failure at `warn`
//! with the delay chosen, and the final failure at `error`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use tglogger_config::model::RetryConfig;
use tglogger_core::{ErrorClass, LoggerError, SinkError};

use crate::classifier::classify;

/// Backoff schedule and attempt ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_factor: f64,
    /// Random spread as a fraction of the delay (0.1 = ±10%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_delay: Duration::from_secs_f64(config.min_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(config.max_delay_secs.max(config.min_delay_secs).max(0.0)),
            backoff_factor: 2.0,
            jitter: config.jitter.clamp(0.0, 0.3),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and one-shot probes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 2.0,
            jitter: 0.0,
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    ///
    /// Jitter is applied before capping, so no delay exceeds `max_delay`
    /// and, with jitter up to 0.3, each delay is strictly longer than the
    /// previous one until the cap is reached.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let min = self.min_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let base = min * self.backoff_factor.powi(retry.min(31) as i32);

        let spread = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };

        Duration::from_secs_f64((base * (1.0 + spread)).clamp(0.0, max))
    }
}

/// Runs sink operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `operation` until it succeeds, fails fatally, or the attempt
    /// ceiling is reached.
    ///
    /// Fatal failures surface as [`LoggerError::Fatal`] after exactly one
    /// attempt. Transient failures that outlive the ceiling surface as
    /// [`LoggerError::RetryExhausted`].
    pub async fn execute<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, LoggerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SinkError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(operation = name, attempt, "sink call attempt");

            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = name, attempt, "sink call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            match classify(&err) {
                ErrorClass::Fatal => {
                    error!(
                        operation = name,
                        attempt,
                        status = err.status,
                        error = %err,
                        "sink call failed (not retryable)"
                    );
                    return Err(LoggerError::Fatal {
                        operation: name.to_string(),
                        source: err,
                    });
                }
                ErrorClass::Transient if attempt >= self.policy.max_attempts => {
                    error!(
                        operation = name,
                        attempts = attempt,
                        error = %err,
                        "sink call failed, retries exhausted"
                    );
                    return Err(LoggerError::RetryExhausted {
                        operation: name.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
                ErrorClass::Transient => {
                    let delay = self.policy.delay_for_retry(attempt - 1);
                    warn!(
                        operation = name,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient sink failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            jitter,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn defaults_match_documented_schedule() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.min_delay, Duration::from_secs(4));
        assert_eq!(p.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn delays_double_then_cap() {
        let p = RetryPolicy {
            max_attempts: 5,
            ..policy(0.0)
        };
        assert_eq!(p.delay_for_retry(0), Duration::from_secs(4));
        assert_eq!(p.delay_for_retry(1), Duration::from_secs(8));
        assert_eq!(p.delay_for_retry(2), Duration::from_secs(10));
        assert_eq!(p.delay_for_retry(30), Duration::from_secs(10));
    }

    #[test]
    fn jittered_delays_strictly_increase_below_cap() {
        let p = RetryPolicy {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            ..policy(0.3)
        };
        for _ in 0..200 {
            let d0 = p.delay_for_retry(0);
            let d1 = p.delay_for_retry(1);
            let d2 = p.delay_for_retry(2);
            assert!(d0 < d1 && d1 < d2, "{d0:?} {d1:?} {d2:?}");
            assert!(d2 <= p.max_delay);
        }
    }

    #[tokio::test]
    async fn fatal_error_is_attempted_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(0.0));

        let c = calls.clone();
        let result: Result<(), _> = executor
            .execute("store_action", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SinkError::http(400, "invalid input syntax"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(LoggerError::Fatal { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_exhausts_with_increasing_delays() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let executor = RetryExecutor::new(policy(0.0));

        let s = stamps.clone();
        let result: Result<(), _> = executor
            .execute("store_events_batch", || {
                let s = s.clone();
                async move {
                    s.lock().unwrap().push(Instant::now());
                    Err(SinkError::http(503, "service unavailable"))
                }
            })
            .await;

        match result {
            Err(LoggerError::RetryExhausted { attempts, operation, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(operation, "store_events_batch");
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 3);
        let first_gap = stamps[1] - stamps[0];
        let second_gap = stamps[2] - stamps[1];
        assert_eq!(first_gap, Duration::from_secs(4));
        assert_eq!(second_gap, Duration::from_secs(8));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success_returns_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(0.1));

        let c = calls.clone();
        let value = executor
            .execute("select", || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SinkError::network("connection reset"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_attempt_policy_reports_exhaustion() {
        let executor = RetryExecutor::new(RetryPolicy::immediate(1));
        let result: Result<(), _> = executor
            .execute("ping", || async { Err(SinkError::timeout("deadline elapsed")) })
            .await;
        assert!(matches!(
            result,
            Err(LoggerError::RetryExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn retries_are_logged_with_operation_name() {
        let executor = RetryExecutor::new(policy(0.0));
        let _: Result<(), _> = executor
            .execute("upsert_chat", || async { Err(SinkError::network("refused")) })
            .await;
        assert!(logs_contain("transient sink failure, retrying"));
        assert!(logs_contain("upsert_chat"));
    }
}

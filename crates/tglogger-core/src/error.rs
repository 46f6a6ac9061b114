// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the tglogger ingestion pipeline.

use thiserror::Error;

/// Coarse category of a failed sink call, as reported by the sink client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// The request never reached the store (DNS, refused, reset).
    Network,
    /// The request or connection timed out.
    Timeout,
    /// The store answered with a non-success HTTP status.
    Http,
    /// The response could not be decoded.
    Decode,
    /// Anything the client could not categorize.
    Other,
}

/// A failure value returned by a [`SinkClient`](crate::traits::SinkClient).
///
/// Carries a structured kind and, for HTTP failures, the status code, so
/// the classifier does not have to guess from the message text.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SinkError {
    pub kind: SinkErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl SinkError {
    pub fn new(kind: SinkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// An HTTP failure with the given status code.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: SinkErrorKind::Http,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SinkErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SinkErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SinkErrorKind::Other, message)
    }
}

/// Retry eligibility of a sink failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure, timeout, or server-side 5xx. Worth retrying.
    Transient,
    /// Bad data, constraint violation, auth. Retrying cannot help.
    Fatal,
}

/// The primary error type used across the ingestion pipeline.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Configuration errors (missing token, malformed URL, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The sink is not initialized or could not be reached.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A non-retryable sink failure.
    #[error("{operation} failed: {source}")]
    Fatal {
        operation: String,
        source: SinkError,
    },

    /// A transient sink failure that outlived the retry budget.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        source: SinkError,
    },

    /// A record could not be converted to its wire representation.
    #[error("conversion error: {message}")]
    Conversion { message: String },

    /// The chat platform client failed.
    #[error("source error: {message}")]
    Source {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A backfill for this scope is already running.
    #[error("backfill already running for chat {scope}")]
    BackfillRunning { scope: i64 },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoggerError {
    /// Shorthand for a connection error without an underlying cause.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a source error without an underlying cause.
    pub fn source_failure(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            source: None,
        }
    }

    /// The sink failure behind this error, if it came from a sink call.
    pub fn sink_error(&self) -> Option<&SinkError> {
        match self {
            Self::Fatal { source, .. } | Self::RetryExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}

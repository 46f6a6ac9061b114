// SPDX-FileCopyrightText: 2026 Tglogger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides whether a failed sink call is worth retrying.
//!
//! Structured information (error kind, HTTP status) wins. Message text is
//! only consulted when the client could not categorize the failure.

use tglogger_core::{ErrorClass, SinkError, SinkErrorKind};

/// Lowercase substrings that mark an uncategorized failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "network",
    "500",
    "502",
    "503",
    "504",
];

/// Classify a sink failure as [`ErrorClass::Transient`] or [`ErrorClass::Fatal`].
pub fn classify(err: &SinkError) -> ErrorClass {
    match err.kind {
        SinkErrorKind::Network | SinkErrorKind::Timeout => ErrorClass::Transient,
        SinkErrorKind::Decode => ErrorClass::Fatal,
        SinkErrorKind::Http => match err.status {
            Some(status) => classify_status(status),
            None => classify_message(&err.message),
        },
        SinkErrorKind::Other => classify_message(&err.message),
    }
}

/// 5xx and 408 Request Timeout are transient; every other status is fatal.
pub fn classify_status(status: u16) -> ErrorClass {
    if (500..600).contains(&status) || status == 408 {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

/// Last-resort substring match on the error text.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_timeout_kinds_are_transient() {
        assert_eq!(classify(&SinkError::network("refused")), ErrorClass::Transient);
        assert_eq!(classify(&SinkError::timeout("deadline")), ErrorClass::Transient);
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [500, 502, 503, 504, 599] {
            assert_eq!(classify(&SinkError::http(status, "oops")), ErrorClass::Transient);
        }
        assert_eq!(classify(&SinkError::http(408, "slow")), ErrorClass::Transient);
    }

    #[test]
    fn client_errors_are_fatal_even_with_misleading_text() {
        // Status wins over text: a 409 mentioning "connection" stays fatal.
        let err = SinkError::http(409, "duplicate key violates constraint on connection_id");
        assert_eq!(classify(&err), ErrorClass::Fatal);
        assert_eq!(classify(&SinkError::http(401, "invalid JWT")), ErrorClass::Fatal);
        assert_eq!(classify(&SinkError::http(400, "bad payload")), ErrorClass::Fatal);
    }

    #[test]
    fn decode_failures_are_fatal() {
        let err = SinkError::new(SinkErrorKind::Decode, "network garbage");
        assert_eq!(classify(&err), ErrorClass::Fatal);
    }

    #[test]
    fn uncategorized_errors_fall_back_to_text() {
        assert_eq!(
            classify(&SinkError::other("Connection reset by peer")),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&SinkError::other("upstream returned 502 Bad Gateway")),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&SinkError::other("Request Timed Out")),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&SinkError::other("null value in column \"chat_id\"")),
            ErrorClass::Fatal
        );
    }
}

//! Category/severity/recovery-action mapping (spec §4.10).

use std::time::Duration;

use hydrogen_transport::TransportError;

use crate::registry::dispatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Connection,
    Timeout,
    Protocol,
    Handshake,
    Internal,
    RemoteClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    None,
    Retry,
    Reconnect,
    Fail,
}

#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub action: RecoveryAction,
    pub message: String,
}

fn looks_like_disconnect(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("eof")
        || lower.contains("reset")
        || lower.contains("broken pipe")
        || lower.contains("connection closed")
        || lower.contains("not connected")
        || lower.contains("disconnected")
}

fn looks_like_handshake(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("handshake") || lower.contains("upgrade") || lower.contains("invalid url")
}

/// Classify a [`TransportError`] per spec §4.10's category table. Dispatches
/// the result to any globally registered handler (logging/aggregate stats)
/// before returning it to the caller.
pub fn classify(err: &TransportError) -> ClassifiedError {
    let text = err.to_string();
    let classified = match err {
        TransportError::Timeout => ClassifiedError {
            category: ErrorCategory::Timeout,
            severity: ErrorSeverity::Warning,
            action: RecoveryAction::Retry,
            message: text,
        },
        TransportError::Codec(_) => ClassifiedError {
            category: ErrorCategory::Protocol,
            severity: ErrorSeverity::Error,
            action: RecoveryAction::Fail,
            message: text,
        },
        TransportError::Connect(_) if looks_like_handshake(&text) => ClassifiedError {
            category: ErrorCategory::Handshake,
            severity: ErrorSeverity::Error,
            action: RecoveryAction::Fail,
            message: text,
        },
        TransportError::Connect(_) | TransportError::NotConnected => ClassifiedError {
            category: ErrorCategory::Connection,
            severity: ErrorSeverity::Warning,
            action: RecoveryAction::Reconnect,
            message: text,
        },
        TransportError::Send(_) | TransportError::Receive(_) if looks_like_disconnect(&text) => {
            ClassifiedError {
                category: ErrorCategory::RemoteClosed,
                severity: ErrorSeverity::Warning,
                action: RecoveryAction::Reconnect,
                message: text,
            }
        }
        TransportError::Send(_) | TransportError::Receive(_) => ClassifiedError {
            category: ErrorCategory::Internal,
            severity: ErrorSeverity::Warning,
            action: RecoveryAction::Retry,
            message: text,
        },
        TransportError::Unsupported(_) => ClassifiedError {
            category: ErrorCategory::Internal,
            severity: ErrorSeverity::Error,
            action: RecoveryAction::Fail,
            message: text,
        },
    };

    dispatch(&classified);
    classified
}

/// Exponential backoff, capped at 30s, scaled by category: TIMEOUT/INTERNAL
/// retries ramp gently, CONNECTION/RECONNECT ramps faster since the peer is
/// known to be down.
pub fn retry_delay(err: &ClassifiedError, attempt: u32) -> Duration {
    let base_ms: u64 = match err.category {
        ErrorCategory::Connection | ErrorCategory::RemoteClosed => 250,
        ErrorCategory::Timeout => 500,
        ErrorCategory::Internal => 1000,
        ErrorCategory::Protocol | ErrorCategory::Handshake => 0,
    };
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let factor = 1u64 << attempt.min(6);
    Duration::from_millis((base_ms * factor).min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_timeout_retry() {
        let c = classify(&TransportError::Timeout);
        assert_eq!(c.category, ErrorCategory::Timeout);
        assert_eq!(c.action, RecoveryAction::Retry);
    }

    #[test]
    fn broken_pipe_on_send_maps_to_remote_closed_reconnect() {
        let c = classify(&TransportError::Send("broken pipe".into()));
        assert_eq!(c.category, ErrorCategory::RemoteClosed);
        assert_eq!(c.action, RecoveryAction::Reconnect);
    }

    #[test]
    fn handshake_failure_maps_to_handshake_fail() {
        let c = classify(&TransportError::Connect("handshake failed: 401".into()));
        assert_eq!(c.category, ErrorCategory::Handshake);
        assert_eq!(c.action, RecoveryAction::Fail);
    }

    #[test]
    fn plain_connect_failure_maps_to_connection_reconnect() {
        let c = classify(&TransportError::Connect("refused".into()));
        assert_eq!(c.category, ErrorCategory::Connection);
        assert_eq!(c.action, RecoveryAction::Reconnect);
    }

    #[test]
    fn unsupported_operation_maps_to_internal_fail() {
        let c = classify(&TransportError::Unsupported("no correlation".into()));
        assert_eq!(c.category, ErrorCategory::Internal);
        assert_eq!(c.action, RecoveryAction::Fail);
    }

    #[test]
    fn retry_delay_grows_with_attempt_and_is_capped() {
        let c = ClassifiedError {
            category: ErrorCategory::Connection,
            severity: ErrorSeverity::Warning,
            action: RecoveryAction::Reconnect,
            message: String::new(),
        };
        assert!(retry_delay(&c, 0) < retry_delay(&c, 3));
        assert!(retry_delay(&c, 20) <= Duration::from_millis(30_000));
    }
}

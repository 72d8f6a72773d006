//! Error types for the main-thread request bridge.

use std::time::Duration;

use thiserror::Error;

use super::request::Token;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors reported to callers waiting on the bridge.
///
/// Host-call failures are never reported through this type: they are
/// converted into error-shaped results on the main thread and delivered
/// like any other result.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No result arrived before the caller's deadline.
    #[error("Timeout waiting for main thread execution (waited {}ms)", .waited.as_millis())]
    Timeout {
        /// Token of the abandoned request.
        token: Token,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The token has no registered waiter (never submitted, or already collected).
    #[error("No pending request for token {token}")]
    UnknownToken {
        /// The token that was looked up.
        token: Token,
    },

    /// The main thread could not be woken up.
    #[error("Failed to wake main thread: {source}")]
    WakeFailed {
        /// Why the notification was refused.
        #[source]
        source: WakeError,
    },
}

impl BridgeError {
    /// Returns `true` if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors raised by a wake signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WakeError {
    /// The main-thread loop has shut down.
    #[error("wake signal is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_is_distinct_from_wake_failure() {
        let timeout = BridgeError::Timeout {
            token: Token::fresh(),
            waited: Duration::from_millis(50),
        };
        let wake = BridgeError::WakeFailed {
            source: WakeError::Closed,
        };

        assert!(timeout.is_timeout());
        assert!(!wake.is_timeout());
        assert!(timeout.to_string().starts_with("Timeout waiting"));
        assert!(timeout.to_string().contains("50ms"));
        assert_eq!(
            wake.to_string(),
            "Failed to wake main thread: wake signal is closed"
        );
    }
}

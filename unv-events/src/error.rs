//! Error types for the unv-events crate.

use callback_server::ReceiverError;
use lapi_client::TransportError;

use crate::subscription::SubscriptionState;

/// Errors from subscribe and renew operations.
///
/// Transport and protocol failures are handled the same way by the lease
/// state machine (the lease is dropped) but are kept apart for logging.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// No response from the device after all retries
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The device answered but rejected the request
    #[error("Device rejected request (HTTP {status}, code {code:?}): {message}")]
    Protocol {
        /// HTTP status of the response
        status: u16,
        /// LAPI status or response code, when present
        code: Option<i64>,
        /// Reason given by the device, or the raw body
        message: String,
    },

    /// The device accepted the subscribe request but returned no lease id
    #[error("Subscribe response carried no subscription ID")]
    MissingSubscriptionId,

    /// Renew was requested without an active lease
    #[error("No active subscription to renew (state: {0})")]
    NotActive(SubscriptionState),

    /// The lease ran out before it could be renewed
    #[error("Subscription expired")]
    Expired,
}

impl SubscriptionError {
    /// Short category name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SubscriptionError::Transport(_) => "transport",
            SubscriptionError::Protocol { .. } | SubscriptionError::MissingSubscriptionId => {
                "protocol"
            }
            SubscriptionError::NotActive(_) | SubscriptionError::Expired => "state",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SubscriptionError::Transport(_))
    }
}

/// Errors from configuration parsing and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Errors from session setup and teardown.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The device client could not be built
    #[error("Device client error: {0}")]
    Client(#[from] TransportError),

    #[error(transparent)]
    Receiver(#[from] ReceiverError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// The session was used after it was shut down or before it was started
    #[error("Session not running: {0}")]
    NotRunning(String),

    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for subscription results.
pub type SubscriptionResult<T> = std::result::Result<T, SubscriptionError>;

/// Convenience type alias for session results.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_display() {
        let error = SubscriptionError::Protocol {
            status: 401,
            code: None,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Device rejected request (HTTP 401, code None): Unauthorized"
        );

        let error = SubscriptionError::NotActive(SubscriptionState::Unsubscribed);
        assert_eq!(
            error.to_string(),
            "No active subscription to renew (state: Unsubscribed)"
        );

        assert_eq!(
            SubscriptionError::Expired.to_string(),
            "Subscription expired"
        );
    }

    #[test]
    fn test_error_kinds() {
        let transport = SubscriptionError::from(TransportError::Unreachable {
            attempts: 3,
            message: "timed out".to_string(),
        });
        assert_eq!(transport.kind(), "transport");
        assert!(transport.is_transport());

        assert_eq!(SubscriptionError::MissingSubscriptionId.kind(), "protocol");
        assert_eq!(SubscriptionError::Expired.kind(), "state");
        assert!(!SubscriptionError::Expired.is_transport());
    }

    #[test]
    fn test_session_error_conversion() {
        let error: SessionError = ConfigError::MissingEnv("UNV_HOST").into();
        assert_eq!(error.to_string(), "Missing environment variable: UNV_HOST");

        let error: SessionError = SubscriptionError::Expired.into();
        assert!(matches!(error, SessionError::Subscription(_)));
    }
}

//! Error types for the LAPI client

use thiserror::Error;

/// Errors that can occur while talking to a LAPI device.
///
/// HTTP error statuses are not errors at this layer: any response the device
/// sends back is returned to the caller as a [`crate::DeviceResponse`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response was obtained after every attempt failed at the connection level
    #[error("No response from device after {attempts} attempt(s): {message}")]
    Unreachable {
        /// Number of attempts made
        attempts: u32,
        /// Description of the last connection-level failure
        message: String,
    },

    /// The request could not be built (bad host, unserializable body, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TransportError {
    /// Number of attempts made before giving up, if any were made.
    pub fn attempts(&self) -> u32 {
        match self {
            TransportError::Unreachable { attempts, .. } => *attempts,
            TransportError::InvalidRequest(_) | TransportError::Configuration(_) => 0,
        }
    }
}

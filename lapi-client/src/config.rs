//! Connection settings for a LAPI device.

use std::time::Duration;

use crate::error::TransportError;

/// Configuration for a [`crate::LapiClient`].
///
/// The values are fixed for the lifetime of a client; changing the host or
/// credentials means building a new client.
#[derive(Debug, Clone)]
pub struct LapiConfig {
    /// Device host, optionally with a port (`192.168.1.105` or `10.0.0.2:8080`)
    pub host: String,

    /// Digest username
    pub username: String,

    /// Digest password
    pub password: String,

    /// Use `https` instead of `http`
    /// Default: false
    pub use_https: bool,

    /// Per-request timeout, applied to each attempt
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Total number of attempts on connection-level failure
    /// Default: 3
    pub retry_attempts: u32,

    /// Base backoff between attempts; attempt `n` waits `n * retry_backoff`
    /// Default: 3 seconds
    pub retry_backoff: Duration,
}

impl LapiConfig {
    /// Root of every LAPI resource path.
    pub const API_ROOT: &'static str = "/LAPI/V1.0/";

    /// Create a configuration with default timing for the given device.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            use_https: false,
            request_timeout: Duration::from_secs(15),
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(3),
        }
    }

    pub fn with_https(mut self, enabled: bool) -> Self {
        self.use_https = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }

    /// Base URL of the LAPI root, e.g. `http://192.168.1.105/LAPI/V1.0/`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{scheme}://{}{}", self.host, Self::API_ROOT)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.trim().is_empty() {
            return Err(TransportError::Configuration(
                "Device host must not be empty".to_string(),
            ));
        }

        if self.username.trim().is_empty() {
            return Err(TransportError::Configuration(
                "Username must not be empty".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(TransportError::Configuration(
                "Retry attempts must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout == Duration::ZERO {
            return Err(TransportError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

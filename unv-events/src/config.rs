//! Configuration types for the unv-events crate
//!
//! A [`SessionConfig`] is built once per session and never mutated afterwards.
//! Changing the device, credentials or callback address means shutting the
//! session down and starting a new one.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use lapi_client::LapiConfig;

use crate::error::ConfigError;

/// Configuration for an [`crate::EventSession`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device host, optionally with a port
    pub device_host: String,

    /// Device username
    pub username: String,

    /// Device password
    pub password: String,

    /// Talk to the device over https
    /// Default: false
    pub use_https: bool,

    /// Address the device is told to push events to
    pub callback_host: String,

    /// Port the device is told to push events to.
    /// 0 means "whatever port the receiver ended up bound to".
    /// Default: 9000
    pub callback_port: u16,

    /// Local address the push receiver binds to
    /// Default: 0.0.0.0:9000
    pub listen_addr: SocketAddr,

    /// Lease length requested on subscribe and renew
    /// Default: 3000 seconds
    pub lease_duration: Duration,

    /// Sleep between keepalive cycles; must be shorter than the lease
    /// Default: 2400 seconds
    pub renewal_interval: Duration,

    /// Per-request timeout for device calls
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Attempts per device call on connection-level failure
    /// Default: 3
    pub retry_attempts: u32,

    /// Linear backoff base between attempts
    /// Default: 3 seconds
    pub retry_backoff: Duration,

    /// Consecutive unreachable subscribe attempts before the lease is `Failed`
    /// Default: 3
    pub failure_threshold: u32,
}

impl SessionConfig {
    /// Default port for both the receiver and the callback address.
    pub const DEFAULT_CALLBACK_PORT: u16 = 9000;

    /// Create a configuration with default timing.
    pub fn new(
        device_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        callback_host: impl Into<String>,
    ) -> Self {
        Self {
            device_host: device_host.into(),
            username: username.into(),
            password: password.into(),
            use_https: false,
            callback_host: callback_host.into(),
            callback_port: Self::DEFAULT_CALLBACK_PORT,
            listen_addr: Self::wildcard_listen_addr(Self::DEFAULT_CALLBACK_PORT),
            lease_duration: Duration::from_secs(3000),
            renewal_interval: Duration::from_secs(2400),
            request_timeout: Duration::from_secs(15),
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(3),
            failure_threshold: 3,
        }
    }

    fn wildcard_listen_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    /// Build a configuration from `UNV_*` environment variables.
    ///
    /// Required: `UNV_HOST`, `UNV_USERNAME`, `UNV_PASSWORD`, `UNV_CALLBACK_HOST`.
    /// Optional: `UNV_CALLBACK_PORT`, `UNV_LISTEN_ADDR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(
            required_env("UNV_HOST")?,
            required_env("UNV_USERNAME")?,
            required_env("UNV_PASSWORD")?,
            required_env("UNV_CALLBACK_HOST")?,
        );

        if let Ok(value) = std::env::var("UNV_CALLBACK_PORT") {
            let port = value.parse::<u16>().map_err(|_| ConfigError::InvalidEnv {
                name: "UNV_CALLBACK_PORT",
                value: value.clone(),
            })?;
            config = config.with_callback_port(port);
        }

        if let Ok(value) = std::env::var("UNV_LISTEN_ADDR") {
            let addr = value
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: "UNV_LISTEN_ADDR",
                    value: value.clone(),
                })?;
            config = config.with_listen_addr(addr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Device host must not be empty".to_string(),
            ));
        }

        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ConfigError::Invalid(
                "Username and password are required".to_string(),
            ));
        }

        if self.callback_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Callback host must not be empty".to_string(),
            ));
        }

        if self.lease_duration < Duration::from_secs(1) {
            return Err(ConfigError::Invalid(
                "Lease duration must be at least one second".to_string(),
            ));
        }

        if self.renewal_interval.is_zero() || self.renewal_interval >= self.lease_duration {
            return Err(ConfigError::Invalid(
                "Renewal interval must be greater than 0 and shorter than the lease".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "Retry attempts must be greater than 0".to_string(),
            ));
        }

        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "Failure threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings for the device client derived from this configuration.
    pub fn lapi_config(&self) -> LapiConfig {
        LapiConfig::new(&self.device_host, &self.username, &self.password)
            .with_https(self.use_https)
            .with_request_timeout(self.request_timeout)
            .with_retry(self.retry_attempts, self.retry_backoff)
    }

    /// Builder pattern methods for fluent configuration

    /// Set the port the device is told to push events to.
    ///
    /// While the receiver still listens on all interfaces at the callback
    /// port, it follows the new port too. A listen address set with
    /// [`SessionConfig::with_listen_addr`] is left alone, whichever order the
    /// two builders are called in.
    pub fn with_callback_port(mut self, port: u16) -> Self {
        if self.listen_addr == Self::wildcard_listen_addr(self.callback_port) {
            self.listen_addr = Self::wildcard_listen_addr(port);
        }
        self.callback_port = port;
        self
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set the lease length and wake at 80% of it.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease_duration = lease;
        self.renewal_interval = lease.mul_f64(0.8);
        self
    }

    pub fn with_renewal_interval(mut self, interval: Duration) -> Self {
        self.renewal_interval = interval;
        self
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_https(mut self, enabled: bool) -> Self {
        self.use_https = enabled;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

//! Private LAPI client for UNV device communication
//!
//! This crate provides a minimal JSON-over-HTTP client for the LAPI surface
//! exposed by UNV recorders and cameras. Every call opens fresh connections
//! and re-runs the digest challenge, because the embedded web servers on
//! these devices misbehave with persistent connections.

mod config;
mod error;
mod response;

pub use config::LapiConfig;
pub use error::TransportError;
pub use reqwest::Method;
pub use response::{DeviceResponse, LapiEnvelope};

use async_trait::async_trait;
use digest_auth::{AuthContext, HttpMethod};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

/// Something that can deliver a LAPI request and hand back the raw response.
///
/// [`LapiClient`] is the real implementation; the seam exists so callers can
/// substitute a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return whatever response the device produced.
    ///
    /// `path` is resolved against the LAPI root: `System/Event/Subscription`
    /// and `/LAPI/V1.0/System/Event/Subscription` address the same resource.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<DeviceResponse, TransportError>;
}

/// A minimal LAPI client with digest authentication and retry
#[derive(Debug, Clone)]
pub struct LapiClient {
    config: LapiConfig,
    base_url: Url,
}

impl LapiClient {
    /// Create a client for the configured device.
    pub fn new(config: LapiConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url()).map_err(|e| {
            TransportError::Configuration(format!("Invalid device host {}: {e}", config.host))
        })?;
        Ok(Self { config, base_url })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &LapiConfig {
        &self.config
    }

    /// Resolve a resource path against the LAPI root.
    pub fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::InvalidRequest(format!("Invalid path {path}: {e}")))
    }

    /// One attempt: unauthenticated request, then the digest answer if challenged.
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
    ) -> Result<DeviceResponse, reqwest::Error> {
        // No idle pooling: each request below gets its own connection.
        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(true)
            .build()?;

        let first = Self::request(&client, method, url, payload, None)
            .send()
            .await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Self::read(first).await;
        }

        let challenge = first
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let Some(authorization) = challenge.and_then(|c| self.answer_challenge(&c, method, url))
        else {
            return Self::read(first).await;
        };

        let second = Self::request(&client, method, url, payload, Some(&authorization))
            .send()
            .await?;
        Self::read(second).await
    }

    /// Compute the `Authorization` header for a digest challenge.
    fn answer_challenge(&self, challenge: &str, method: &Method, url: &Url) -> Option<String> {
        let mut prompt = match digest_auth::parse(challenge) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(%url, "Unusable authentication challenge: {}", e);
                return None;
            }
        };

        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let context = AuthContext::new_with_method(
            self.config.username.as_str(),
            self.config.password.as_str(),
            uri.as_str(),
            None::<&[u8]>,
            HttpMethod::from(method.as_str()),
        );

        match prompt.respond(&context) {
            Ok(answer) => Some(answer.to_header_string()),
            Err(e) => {
                tracing::warn!(%url, "Failed to answer authentication challenge: {}", e);
                None
            }
        }
    }

    fn request(
        client: &reqwest::Client,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
        authorization: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut builder = client
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(bytes) = payload {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder
    }

    async fn read(response: reqwest::Response) -> Result<DeviceResponse, reqwest::Error> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(DeviceResponse { status, body })
    }
}

#[async_trait]
impl Transport for LapiClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<DeviceResponse, TransportError> {
        let url = self.url_for(path)?;
        let payload = body
            .map(|value| serde_json::to_vec(&value))
            .transpose()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let attempts = self.config.retry_attempts;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.send_once(&method, &url, payload.as_deref()).await {
                Ok(response) => {
                    tracing::debug!(
                        %method,
                        %url,
                        status = response.status,
                        attempt,
                        "LAPI request answered"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(
                        %method,
                        %url,
                        "LAPI request failed (attempt {}/{}): {}",
                        attempt,
                        attempts,
                        e
                    );
                    last_error = e.to_string();

                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    }
                }
            }
        }

        Err(TransportError::Unreachable {
            attempts,
            message: last_error,
        })
    }
}

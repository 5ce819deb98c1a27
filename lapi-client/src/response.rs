//! Raw device responses and the LAPI response envelope.

use serde::Deserialize;
use serde_json::Value;

/// An HTTP response received from the device, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl DeviceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the HTTP status is in the 2xx range.
    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as JSON, or `None` if it is not valid JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// The `Response` envelope every LAPI reply is wrapped in.
    pub fn envelope(&self) -> Option<LapiEnvelope> {
        let value = self.json()?;
        let inner = value.get("Response")?.clone();
        serde_json::from_value(inner).ok()
    }

    /// Whether the device accepted the request.
    ///
    /// Requires a 2xx status, and a zero `ResponseCode` when the envelope
    /// carries one.
    pub fn is_success(&self) -> bool {
        if !self.is_http_success() {
            return false;
        }
        match self.envelope().and_then(|e| e.response_code) {
            Some(code) => code == 0,
            None => true,
        }
    }
}

/// The `Response` object of a LAPI reply.
///
/// ```json
/// {"Response": {"ResponseURL": "/LAPI/V1.0/System/Event/Subscription",
///   "CreatedID": -1, "ResponseCode": 0, "SubResponseCode": 0,
///   "ResponseString": "Succeed", "StatusCode": 0, "StatusString": "Succeed",
///   "Data": {"ID": 7, "Reference": "..."}}}
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct LapiEnvelope {
    #[serde(rename = "ResponseURL")]
    pub response_url: Option<String>,
    pub response_code: Option<i64>,
    pub sub_response_code: Option<i64>,
    pub response_string: Option<String>,
    pub status_code: Option<i64>,
    pub status_string: Option<String>,
    pub data: Option<Value>,
}

impl LapiEnvelope {
    /// Human-readable reason, preferring the status string.
    pub fn reason(&self) -> Option<&str> {
        self.status_string
            .as_deref()
            .or(self.response_string.as_deref())
    }
}

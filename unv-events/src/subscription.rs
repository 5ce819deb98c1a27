//! Event subscription lease and its state machine.
//!
//! The device grants a lease identified by an opaque id. While the lease is
//! alive the device pushes events to the callback address; the lease must be
//! renewed (same id) before it runs out, or abandoned and subscribed again
//! (new id).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lapi_client::{DeviceResponse, Method, Transport};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::{SubscriptionError, SubscriptionResult};

/// Resource path for creating a lease.
pub const SUBSCRIPTION_PATH: &str = "System/Event/Subscription";

/// Lifecycle state of the lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// No lease; the next cycle subscribes
    Unsubscribed,
    /// A subscribe request is in flight
    Subscribing,
    /// The device granted a lease
    Active,
    /// A renew request is in flight; the lease keeps its id
    Renewing,
    /// The lease ran out before it was renewed
    Expired,
    /// Repeated subscribe attempts could not reach the device
    Failed,
}

impl SubscriptionState {
    /// Whether a lease id is held in this state.
    pub fn holds_id(&self) -> bool {
        matches!(self, SubscriptionState::Active | SubscriptionState::Renewing)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionState::Unsubscribed => "Unsubscribed",
            SubscriptionState::Subscribing => "Subscribing",
            SubscriptionState::Active => "Active",
            SubscriptionState::Renewing => "Renewing",
            SubscriptionState::Expired => "Expired",
            SubscriptionState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Device-assigned lease id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the id from `Data.ID`, which devices send as a number or a string.
    fn from_data(data: &Value) -> Option<Self> {
        let id = match data.get("ID")? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the device should push events, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRequest {
    pub callback_host: String,
    pub callback_port: u16,
    pub duration: Duration,
}

impl LeaseRequest {
    pub fn new(callback_host: impl Into<String>, callback_port: u16, duration: Duration) -> Self {
        Self {
            callback_host: callback_host.into(),
            callback_port,
            duration,
        }
    }

    fn body(&self) -> Value {
        json!({
            "AddressType": 0,
            "IPAddress": self.callback_host,
            "Port": self.callback_port,
            "Duration": self.duration.as_secs(),
        })
    }
}

/// Point-in-time view of the lease.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: Option<SubscriptionId>,
    pub callback_host: String,
    pub callback_port: u16,
    pub duration_seconds: u64,
    pub state: SubscriptionState,
    pub granted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Successful renewals of the current id
    pub renewals: u32,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.state == SubscriptionState::Active && self.id.is_some()
    }
}

#[derive(Debug)]
struct LeaseState {
    state: SubscriptionState,
    id: Option<SubscriptionId>,
    request: Option<LeaseRequest>,
    granted_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    renewals: u32,
    consecutive_failures: u32,
}

impl LeaseState {
    fn empty() -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            id: None,
            request: None,
            granted_at: None,
            expires_at: None,
            renewals: 0,
            consecutive_failures: 0,
        }
    }

    /// Move to a state that holds no id.
    fn drop_lease(&mut self, state: SubscriptionState) {
        self.state = state;
        self.id = None;
        self.granted_at = None;
        self.expires_at = None;
        self.renewals = 0;
    }

    /// An `Active` lease past its local expiry is observed as `Expired`.
    fn refresh_expiry(&mut self, now: DateTime<Utc>) {
        if self.state == SubscriptionState::Active
            && self.expires_at.is_some_and(|expires| expires <= now)
        {
            tracing::warn!(id = ?self.id, "Subscription lease expired before renewal");
            self.drop_lease(SubscriptionState::Expired);
        }
    }

    fn snapshot(&self) -> Subscription {
        let request = self.request.as_ref();
        Subscription {
            id: self.id.clone(),
            callback_host: request.map(|r| r.callback_host.clone()).unwrap_or_default(),
            callback_port: request.map(|r| r.callback_port).unwrap_or_default(),
            duration_seconds: request.map(|r| r.duration.as_secs()).unwrap_or_default(),
            state: self.state,
            granted_at: self.granted_at,
            expires_at: self.expires_at,
            renewals: self.renewals,
        }
    }
}

/// Drops the lease if a subscribe or renew future is cancelled mid-request.
///
/// Without it an aborted call would leave the lease in `Subscribing` or
/// `Renewing` with nothing left to move it on.
struct InFlight<'a> {
    lease: &'a Mutex<LeaseState>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(lease: &'a Mutex<LeaseState>) -> Self {
        Self { lease, armed: true }
    }

    fn finish(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut lease = self.lease.lock();
        if matches!(
            lease.state,
            SubscriptionState::Subscribing | SubscriptionState::Renewing
        ) {
            tracing::debug!(id = ?lease.id, state = %lease.state, "Lease operation cancelled");
            lease.drop_lease(SubscriptionState::Unsubscribed);
        }
    }
}

/// Owner of the lease state machine.
///
/// Subscribe and renew are serialized by an async operation lock, so an
/// interactive resubscribe and the keepalive loop never interleave their
/// device calls. The lease itself sits behind a short-held lock that readers
/// (for example an event handler displaying the id) can take at any time.
pub struct SubscriptionManager {
    transport: Arc<dyn Transport>,
    failure_threshold: u32,
    lease: Mutex<LeaseState>,
    operation: tokio::sync::Mutex<()>,
}

impl SubscriptionManager {
    /// Create a manager with no lease.
    ///
    /// After `failure_threshold` consecutive subscribe attempts fail to reach
    /// the device the lease is reported as [`SubscriptionState::Failed`].
    pub fn new(transport: Arc<dyn Transport>, failure_threshold: u32) -> Self {
        Self {
            transport,
            failure_threshold: failure_threshold.max(1),
            lease: Mutex::new(LeaseState::empty()),
            operation: tokio::sync::Mutex::new(()),
        }
    }

    /// Ask the device to push events to `callback_host:callback_port` for `duration`.
    ///
    /// Any lease already held is abandoned first; the device hands out a new id.
    pub async fn subscribe(
        &self,
        callback_host: &str,
        callback_port: u16,
        duration: Duration,
    ) -> SubscriptionResult<Subscription> {
        let request = LeaseRequest::new(callback_host, callback_port, duration);
        let _guard = self.operation.lock().await;
        self.subscribe_locked(request).await
    }

    /// Subscribe with a prepared [`LeaseRequest`].
    pub async fn subscribe_with(&self, request: &LeaseRequest) -> SubscriptionResult<Subscription> {
        let _guard = self.operation.lock().await;
        self.subscribe_locked(request.clone()).await
    }

    async fn subscribe_locked(&self, request: LeaseRequest) -> SubscriptionResult<Subscription> {
        {
            let mut lease = self.lease.lock();
            if let Some(old) = lease.id.as_ref() {
                tracing::debug!(id = %old, "Abandoning current lease");
            }
            lease.drop_lease(SubscriptionState::Subscribing);
            lease.request = Some(request.clone());
        }

        tracing::debug!(
            callback = %format!("{}:{}", request.callback_host, request.callback_port),
            duration = request.duration.as_secs(),
            "Subscribing to device events"
        );

        let in_flight = InFlight::new(&self.lease);
        let result = match self
            .transport
            .send(Method::POST, SUBSCRIPTION_PATH, Some(request.body()))
            .await
        {
            Ok(response) => Self::granted_id(&response),
            Err(e) => Err(SubscriptionError::Transport(e)),
        };
        in_flight.finish();

        let mut lease = self.lease.lock();
        match result {
            Ok(id) => {
                let now = Utc::now();
                tracing::info!(%id, "Subscription granted");
                lease.state = SubscriptionState::Active;
                lease.id = Some(id);
                lease.granted_at = Some(now);
                lease.expires_at = Some(now + lease_length(request.duration));
                lease.renewals = 0;
                lease.consecutive_failures = 0;
                Ok(lease.snapshot())
            }
            Err(e) => {
                let next = if e.is_transport() {
                    lease.consecutive_failures += 1;
                    if lease.consecutive_failures >= self.failure_threshold {
                        SubscriptionState::Failed
                    } else {
                        SubscriptionState::Unsubscribed
                    }
                } else {
                    lease.consecutive_failures = 0;
                    SubscriptionState::Unsubscribed
                };
                tracing::warn!(kind = e.kind(), state = %next, "Subscribe failed: {}", e);
                lease.drop_lease(next);
                Err(e)
            }
        }
    }

    /// Extend the current lease by `duration` without changing its id.
    ///
    /// Requires an `Active` lease. On any failure the lease is dropped and the
    /// manager returns to `Unsubscribed`; the caller is expected to subscribe.
    pub async fn renew(&self, duration: Duration) -> SubscriptionResult<()> {
        let _guard = self.operation.lock().await;

        let id = {
            let mut lease = self.lease.lock();
            lease.refresh_expiry(Utc::now());
            match (lease.state, lease.id.clone()) {
                (SubscriptionState::Active, Some(id)) => {
                    lease.state = SubscriptionState::Renewing;
                    id
                }
                (SubscriptionState::Expired, _) => return Err(SubscriptionError::Expired),
                (state, _) => return Err(SubscriptionError::NotActive(state)),
            }
        };

        tracing::debug!(%id, duration = duration.as_secs(), "Renewing subscription");

        let path = format!("{SUBSCRIPTION_PATH}{id}");
        let body = json!({ "Duration": duration.as_secs() });
        let in_flight = InFlight::new(&self.lease);
        let result = match self.transport.send(Method::PUT, &path, Some(body)).await {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => Err(Self::rejection(&response)),
            Err(e) => Err(SubscriptionError::Transport(e)),
        };
        in_flight.finish();

        let mut lease = self.lease.lock();
        match result {
            Ok(()) => {
                lease.state = SubscriptionState::Active;
                lease.expires_at = Some(Utc::now() + lease_length(duration));
                lease.renewals += 1;
                if let Some(request) = lease.request.as_mut() {
                    request.duration = duration;
                }
                tracing::info!(%id, renewals = lease.renewals, "Subscription renewed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%id, kind = e.kind(), "Renew failed, dropping lease: {}", e);
                lease.drop_lease(SubscriptionState::Unsubscribed);
                Err(e)
            }
        }
    }

    /// Current view of the lease.
    pub fn snapshot(&self) -> Subscription {
        let mut lease = self.lease.lock();
        lease.refresh_expiry(Utc::now());
        lease.snapshot()
    }

    pub fn state(&self) -> SubscriptionState {
        self.snapshot().state
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.snapshot().id
    }

    /// Whether there is a lease that can be renewed.
    pub fn has_active_lease(&self) -> bool {
        self.snapshot().is_active()
    }

    /// Parse the lease id out of a subscribe response.
    fn granted_id(response: &DeviceResponse) -> SubscriptionResult<SubscriptionId> {
        if !response.is_success() {
            return Err(Self::rejection(response));
        }

        response
            .envelope()
            .and_then(|envelope| envelope.data)
            .and_then(|data| SubscriptionId::from_data(&data))
            .ok_or(SubscriptionError::MissingSubscriptionId)
    }

    fn rejection(response: &DeviceResponse) -> SubscriptionError {
        let envelope = response.envelope();
        let code = envelope
            .as_ref()
            .and_then(|e| e.status_code.or(e.response_code));
        let message = envelope
            .as_ref()
            .and_then(|e| e.reason().map(str::to_owned))
            .unwrap_or_else(|| response.body.trim().to_string());

        SubscriptionError::Protocol {
            status: response.status,
            code,
            message,
        }
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("failure_threshold", &self.failure_threshold)
            .field("lease", &*self.lease.lock())
            .finish()
    }
}

fn lease_length(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration)
        .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lapi_client::TransportError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays canned results and records every request.
    struct Scripted {
        replies: Mutex<VecDeque<Result<DeviceResponse, TransportError>>>,
        requests: Mutex<Vec<(Method, String, Option<Value>)>>,
    }

    impl Scripted {
        fn with(replies: Vec<Result<DeviceResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(Method, String, Option<Value>)> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(
            &self,
            method: Method,
            path: &str,
            body: Option<Value>,
        ) -> Result<DeviceResponse, TransportError> {
            self.requests.lock().push((method, path.to_string(), body));
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(unreachable_device()))
        }
    }

    fn granted(id: &str) -> Result<DeviceResponse, TransportError> {
        Ok(DeviceResponse::new(
            200,
            format!(
                r#"{{"Response":{{"ResponseCode":0,"StatusCode":0,"StatusString":"Succeed","Data":{{"ID":{id}}}}}}}"#
            ),
        ))
    }

    fn renewed() -> Result<DeviceResponse, TransportError> {
        Ok(DeviceResponse::new(
            200,
            r#"{"Response":{"ResponseCode":0,"StatusCode":0,"StatusString":"Succeed"}}"#,
        ))
    }

    fn unreachable_device() -> TransportError {
        TransportError::Unreachable {
            attempts: 3,
            message: "connection refused".to_string(),
        }
    }

    const LEASE: Duration = Duration::from_secs(3000);

    /// Grants the first `grants` subscribes, then never answers again.
    struct Stalling {
        grants: AtomicU32,
    }

    #[async_trait]
    impl Transport for Stalling {
        async fn send(
            &self,
            _method: Method,
            _path: &str,
            _body: Option<Value>,
        ) -> Result<DeviceResponse, TransportError> {
            let remaining = self.grants.load(Ordering::SeqCst);
            if remaining == 0 {
                return std::future::pending().await;
            }
            self.grants.store(remaining - 1, Ordering::SeqCst);
            granted("7")
        }
    }

    #[tokio::test]
    async fn test_subscribe_grants_active_lease() {
        let transport = Scripted::with(vec![granted("7")]);
        let manager = SubscriptionManager::new(transport.clone(), 3);
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);

        let subscription = manager.subscribe("192.168.1.50", 9000, LEASE).await.unwrap();

        assert_eq!(subscription.state, SubscriptionState::Active);
        assert_eq!(subscription.id, Some(SubscriptionId::new("7")));
        assert_eq!(subscription.callback_port, 9000);
        assert_eq!(subscription.duration_seconds, 3000);
        assert!(subscription.expires_at > subscription.granted_at);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let (method, path, body) = &requests[0];
        assert_eq!(*method, Method::POST);
        assert_eq!(path, SUBSCRIPTION_PATH);
        assert_eq!(
            body.clone().unwrap(),
            json!({"AddressType": 0, "IPAddress": "192.168.1.50", "Port": 9000, "Duration": 3000})
        );
    }

    #[tokio::test]
    async fn test_string_ids_are_accepted() {
        let transport = Scripted::with(vec![granted("\"sub-12\"")]);
        let manager = SubscriptionManager::new(transport, 3);

        let subscription = manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();
        assert_eq!(subscription.id.unwrap().as_str(), "sub-12");
    }

    #[tokio::test]
    async fn test_subscribe_without_id_is_protocol_error() {
        let transport = Scripted::with(vec![renewed()]);
        let manager = SubscriptionManager::new(transport, 3);

        let err = manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingSubscriptionId));
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
        assert!(manager.subscription_id().is_none());
    }

    #[tokio::test]
    async fn test_rejected_subscribe_reports_device_reason() {
        let transport = Scripted::with(vec![Ok(DeviceResponse::new(
            200,
            r#"{"Response":{"ResponseCode":4,"StatusCode":50808,"StatusString":"Invalid Param"}}"#,
        ))]);
        let manager = SubscriptionManager::new(transport, 3);

        let err = manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap_err();
        match err {
            SubscriptionError::Protocol {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 200);
                assert_eq!(code, Some(50808));
                assert_eq!(message, "Invalid Param");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn test_renew_keeps_id() {
        let transport = Scripted::with(vec![granted("7"), renewed(), renewed(), renewed()]);
        let manager = SubscriptionManager::new(transport.clone(), 3);
        manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();

        for _ in 0..3 {
            manager.renew(LEASE).await.unwrap();
            assert_eq!(manager.state(), SubscriptionState::Active);
            assert_eq!(manager.subscription_id(), Some(SubscriptionId::new("7")));
        }
        assert_eq!(manager.snapshot().renewals, 3);

        let requests = transport.requests();
        let (method, path, body) = &requests[1];
        assert_eq!(*method, Method::PUT);
        assert_eq!(path, "System/Event/Subscription7");
        assert_eq!(body.clone().unwrap(), json!({"Duration": 3000}));
    }

    #[tokio::test]
    async fn test_renew_failure_drops_lease() {
        let transport = Scripted::with(vec![granted("7"), Err(unreachable_device())]);
        let manager = SubscriptionManager::new(transport, 3);
        manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();

        let err = manager.renew(LEASE).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
        assert!(manager.subscription_id().is_none());
    }

    #[tokio::test]
    async fn test_renew_rejection_drops_lease() {
        let transport = Scripted::with(vec![
            granted("7"),
            Ok(DeviceResponse::new(404, "Not Found")),
        ]);
        let manager = SubscriptionManager::new(transport, 3);
        manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();

        let err = manager.renew(LEASE).await.unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::Protocol { status: 404, .. }
        ));
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn test_renew_requires_active_lease() {
        let transport = Scripted::with(vec![]);
        let manager = SubscriptionManager::new(transport.clone(), 3);

        let err = manager.renew(LEASE).await.unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::NotActive(SubscriptionState::Unsubscribed)
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_lapsed_lease_is_observed_as_expired() {
        let transport = Scripted::with(vec![granted("7")]);
        let manager = SubscriptionManager::new(transport.clone(), 3);
        manager
            .subscribe("10.0.0.2", 9000, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(manager.state(), SubscriptionState::Expired);
        assert!(!manager.has_active_lease());
        assert!(matches!(
            manager.renew(LEASE).await,
            Err(SubscriptionError::Expired)
        ));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_unreachable_subscribes_fail() {
        let transport = Scripted::with(vec![
            Err(unreachable_device()),
            Err(unreachable_device()),
            Err(unreachable_device()),
            granted("9"),
        ]);
        let manager = SubscriptionManager::new(transport, 3);

        for expected in [
            SubscriptionState::Unsubscribed,
            SubscriptionState::Unsubscribed,
            SubscriptionState::Failed,
        ] {
            assert!(manager.subscribe("10.0.0.2", 9000, LEASE).await.is_err());
            assert_eq!(manager.state(), expected);
        }

        let subscription = manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();
        assert_eq!(subscription.state, SubscriptionState::Active);
        assert_eq!(subscription.id, Some(SubscriptionId::new("9")));
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_id() {
        let transport = Scripted::with(vec![granted("7"), granted("8")]);
        let manager = SubscriptionManager::new(transport, 3);

        manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();
        let second = manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();

        assert_eq!(second.id, Some(SubscriptionId::new("8")));
        assert_eq!(second.renewals, 0);
    }

    #[tokio::test]
    async fn test_cancelled_subscribe_leaves_no_lease_in_flight() {
        let manager = SubscriptionManager::new(
            Arc::new(Stalling {
                grants: AtomicU32::new(0),
            }),
            3,
        );

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            manager.subscribe("10.0.0.2", 9000, LEASE),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
        assert!(manager.subscription_id().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_renew_drops_lease() {
        let manager = SubscriptionManager::new(
            Arc::new(Stalling {
                grants: AtomicU32::new(1),
            }),
            3,
        );
        manager.subscribe("10.0.0.2", 9000, LEASE).await.unwrap();

        let renew = manager.renew(LEASE);
        let cancelled = tokio::time::timeout(Duration::from_millis(50), renew).await;

        assert!(cancelled.is_err());
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
        assert!(manager.subscription_id().is_none());

        // The operation lock was released with the cancelled future
        let err = manager.renew(LEASE).await.unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::NotActive(SubscriptionState::Unsubscribed)
        ));
    }

    #[test]
    fn test_id_invariant_per_state() {
        assert!(SubscriptionState::Active.holds_id());
        assert!(SubscriptionState::Renewing.holds_id());
        for state in [
            SubscriptionState::Unsubscribed,
            SubscriptionState::Subscribing,
            SubscriptionState::Expired,
            SubscriptionState::Failed,
        ] {
            assert!(!state.holds_id());
        }
    }
}

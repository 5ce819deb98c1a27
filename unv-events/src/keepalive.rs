//! Background lease keepalive.
//!
//! One task sleeps for the renewal interval, then renews the lease (or
//! subscribes when there is none). A failed renew falls back to exactly one
//! subscribe in the same cycle. Failures are reported, never raised; the loop
//! only ends through its stop signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{Result, SessionError};
use crate::status::{SessionStatus, StatusReporter};
use crate::subscription::{LeaseRequest, SubscriptionId, SubscriptionManager};

/// What a single keepalive cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// There was no lease; a new one was granted
    Subscribed(SubscriptionId),
    /// The current lease was extended
    Renewed(SubscriptionId),
    /// Renew failed and the fallback subscribe was granted
    Resubscribed(SubscriptionId),
    /// No lease could be obtained this cycle
    SubscribeFailed(String),
}

/// Handle to the keepalive task.
///
/// Dropping the handle signals the task to stop; [`KeepaliveScheduler::shutdown`]
/// also waits for it.
pub struct KeepaliveScheduler {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl KeepaliveScheduler {
    /// Spawn the keepalive loop.
    ///
    /// The first cycle runs after one `interval`; callers normally subscribe
    /// once themselves before starting the scheduler.
    pub fn start(
        manager: Arc<SubscriptionManager>,
        reporter: StatusReporter,
        lease: LeaseRequest,
        interval: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::debug!(
            interval_secs = interval.as_secs_f64(),
            "Starting keepalive loop"
        );
        let task = tokio::spawn(Self::keepalive_task(
            manager, reporter, lease, interval, stop_rx,
        ));

        Self {
            stop_tx,
            task: Some(task),
        }
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait up to 5 seconds for it; the task is aborted
    /// if it does not finish in time.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.stop_tx.send(true);

        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match timeout(Duration::from_secs(5), &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Shutdown(format!(
                "Keepalive task panicked: {e}"
            ))),
            Err(_) => {
                task.abort();
                Err(SessionError::Shutdown(
                    "Keepalive task shutdown timed out after 5 seconds".to_string(),
                ))
            }
        }
    }

    async fn keepalive_task(
        manager: Arc<SubscriptionManager>,
        reporter: StatusReporter,
        lease: LeaseRequest,
        interval: Duration,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        loop {
            if *stop_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop_rx.changed() => {
                    // Sender dropped
                    if changed.is_err() {
                        break;
                    }
                }
            }

            if *stop_rx.borrow() {
                break;
            }

            // A cycle in flight is dropped on stop; the manager cleans up its lease.
            tokio::select! {
                outcome = Self::run_cycle(&manager, &reporter, &lease) => {
                    tracing::debug!(?outcome, "Keepalive cycle finished");
                }
                _ = stop_rx.changed() => {
                    tracing::debug!("Keepalive cycle cancelled by shutdown");
                    break;
                }
            }
        }

        tracing::debug!("Keepalive loop stopped");
    }

    /// Run one keepalive cycle: renew if a lease is held, otherwise subscribe.
    pub async fn run_cycle(
        manager: &SubscriptionManager,
        reporter: &StatusReporter,
        lease: &LeaseRequest,
    ) -> CycleOutcome {
        let current = manager.snapshot();

        let held = if current.is_active() { current.id } else { None };
        let Some(id) = held else {
            reporter.report(SessionStatus::Resubscribing);
            return match Self::subscribe(manager, reporter, lease).await {
                Ok(id) => CycleOutcome::Subscribed(id),
                Err(reason) => CycleOutcome::SubscribeFailed(reason),
            };
        };

        match manager.renew(lease.duration).await {
            Ok(()) => {
                // An interactive resubscribe may have replaced the lease before renew ran
                let renewed = manager.subscription_id().unwrap_or(id);
                reporter.report(SessionStatus::Renewed(renewed.clone()));
                CycleOutcome::Renewed(renewed)
            }
            Err(e) => {
                tracing::warn!(%id, kind = e.kind(), "Renew failed: {}", e);
                reporter.report(SessionStatus::RenewFailed);
                match Self::subscribe(manager, reporter, lease).await {
                    Ok(id) => CycleOutcome::Resubscribed(id),
                    Err(reason) => CycleOutcome::SubscribeFailed(reason),
                }
            }
        }
    }

    async fn subscribe(
        manager: &SubscriptionManager,
        reporter: &StatusReporter,
        lease: &LeaseRequest,
    ) -> std::result::Result<SubscriptionId, String> {
        let granted = manager
            .subscribe_with(lease)
            .await
            .map_err(|e| e.to_string())
            .and_then(|subscription| {
                subscription
                    .id
                    .ok_or_else(|| "Subscribe response carried no subscription ID".to_string())
            });

        match &granted {
            Ok(id) => reporter.report(SessionStatus::Subscribed(id.clone())),
            Err(reason) => reporter.report(SessionStatus::SubscribeFailed(reason.clone())),
        }
        granted
    }
}

impl Drop for KeepaliveScheduler {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionState;
    use async_trait::async_trait;
    use lapi_client::{DeviceResponse, Method, Transport, TransportError};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Grants ids 1, 2, 3... and renews according to a switch.
    struct FakeDevice {
        next_id: AtomicU32,
        subscribes: AtomicU32,
        renews: AtomicU32,
        renew_fails: Mutex<bool>,
        stalled: Mutex<bool>,
    }

    impl FakeDevice {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                next_id: AtomicU32::new(1),
                subscribes: AtomicU32::new(0),
                renews: AtomicU32::new(0),
                renew_fails: Mutex::new(false),
                stalled: Mutex::new(false),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeDevice {
        async fn send(
            &self,
            method: Method,
            _path: &str,
            _body: Option<Value>,
        ) -> std::result::Result<DeviceResponse, TransportError> {
            let stalled = *self.stalled.lock();
            if stalled {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }

            if method == Method::POST {
                self.subscribes.fetch_add(1, Ordering::SeqCst);
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                return Ok(DeviceResponse::new(
                    200,
                    format!(r#"{{"Response":{{"ResponseCode":0,"Data":{{"ID":{id}}}}}}}"#),
                ));
            }

            self.renews.fetch_add(1, Ordering::SeqCst);
            if *self.renew_fails.lock() {
                Err(TransportError::Unreachable {
                    attempts: 3,
                    message: "timed out".to_string(),
                })
            } else {
                Ok(DeviceResponse::new(200, r#"{"Response":{"ResponseCode":0}}"#))
            }
        }
    }

    fn lease() -> LeaseRequest {
        LeaseRequest::new("10.0.0.2", 9000, Duration::from_secs(3000))
    }

    #[tokio::test]
    async fn test_cycle_subscribes_without_lease() {
        let device = FakeDevice::new();
        let manager = SubscriptionManager::new(device.clone(), 3);
        let reporter = StatusReporter::new();

        let outcome = KeepaliveScheduler::run_cycle(&manager, &reporter, &lease()).await;

        assert_eq!(outcome, CycleOutcome::Subscribed(SubscriptionId::new("1")));
        assert_eq!(
            reporter.history(),
            vec![
                SessionStatus::Idle,
                SessionStatus::Resubscribing,
                SessionStatus::Subscribed(SubscriptionId::new("1")),
            ]
        );
    }

    #[tokio::test]
    async fn test_cycle_renews_existing_lease() {
        let device = FakeDevice::new();
        let manager = SubscriptionManager::new(device.clone(), 3);
        let reporter = StatusReporter::new();
        manager.subscribe_with(&lease()).await.unwrap();

        let outcome = KeepaliveScheduler::run_cycle(&manager, &reporter, &lease()).await;

        assert_eq!(outcome, CycleOutcome::Renewed(SubscriptionId::new("1")));
        assert_eq!(manager.subscription_id(), Some(SubscriptionId::new("1")));
        assert_eq!(device.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(device.renews.load(Ordering::SeqCst), 1);
        assert_eq!(
            reporter.current(),
            SessionStatus::Renewed(SubscriptionId::new("1"))
        );
    }

    #[tokio::test]
    async fn test_failed_renew_falls_back_to_one_subscribe() {
        let device = FakeDevice::new();
        let manager = SubscriptionManager::new(device.clone(), 3);
        let reporter = StatusReporter::new();
        manager.subscribe_with(&lease()).await.unwrap();
        *device.renew_fails.lock() = true;

        let outcome = KeepaliveScheduler::run_cycle(&manager, &reporter, &lease()).await;

        assert_eq!(outcome, CycleOutcome::Resubscribed(SubscriptionId::new("2")));
        assert_eq!(device.renews.load(Ordering::SeqCst), 1);
        assert_eq!(device.subscribes.load(Ordering::SeqCst), 2);
        assert!(reporter.history().contains(&SessionStatus::RenewFailed));
    }

    #[tokio::test]
    async fn test_loop_runs_until_stopped() {
        let device = FakeDevice::new();
        let manager = Arc::new(SubscriptionManager::new(device.clone(), 3));
        manager.subscribe_with(&lease()).await.unwrap();

        let scheduler = KeepaliveScheduler::start(
            manager.clone(),
            StatusReporter::new(),
            lease(),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.is_running());
        scheduler.shutdown().await.unwrap();

        let renews = device.renews.load(Ordering::SeqCst);
        assert!(renews >= 2, "expected several renewals, got {renews}");
        assert_eq!(manager.subscription_id(), Some(SubscriptionId::new("1")));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(device.renews.load(Ordering::SeqCst), renews);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_long_sleep() {
        let device = FakeDevice::new();
        let manager = Arc::new(SubscriptionManager::new(device, 3));

        let scheduler = KeepaliveScheduler::start(
            manager,
            StatusReporter::new(),
            lease(),
            Duration::from_secs(2400),
        );

        let started = std::time::Instant::now();
        scheduler.shutdown().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_in_flight_cycle() {
        let device = FakeDevice::new();
        *device.stalled.lock() = true;
        let manager = Arc::new(SubscriptionManager::new(device.clone(), 3));

        let scheduler = KeepaliveScheduler::start(
            manager.clone(),
            StatusReporter::new(),
            lease(),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.state(), SubscriptionState::Subscribing);

        let started = std::time::Instant::now();
        scheduler.shutdown().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
        assert_eq!(device.subscribes.load(Ordering::SeqCst), 0);
    }
}

//! One device, one lease, one receiver.

use std::net::SocketAddr;
use std::sync::Arc;

use callback_server::{EventDispatcher, HandlerError, InboundEvent, PushReceiver};
use lapi_client::{LapiClient, Transport};
use tokio::sync::watch;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::keepalive::KeepaliveScheduler;
use crate::notification::{
    AlarmNotification, PersonMatchNotification, ALARM_PATH_SUFFIX, PERSON_INFO_PATH_SUFFIX,
};
use crate::status::{SessionStatus, StatusReporter};
use crate::subscription::{LeaseRequest, Subscription, SubscriptionManager};

/// Event session with a single device.
///
/// Owns the push receiver, the subscription lease and the keepalive loop.
/// Handlers can be registered before or after [`EventSession::start`].
///
/// # Example
///
/// ```no_run
/// use unv_events::{EventSession, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SessionConfig::new("192.168.1.105", "admin", "secret", "192.168.1.50");
///     let mut session = EventSession::new(config)?;
///
///     session.on_alarm(|alarm| {
///         println!("{:?} on {:?}", alarm.alarm_type, alarm.alarm_src_id);
///     });
///
///     let subscription = session.start().await?;
///     println!("Subscribed with id {:?}", subscription.id);
///
///     tokio::signal::ctrl_c().await?;
///     session.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct EventSession {
    config: SessionConfig,
    manager: Arc<SubscriptionManager>,
    dispatcher: EventDispatcher,
    reporter: StatusReporter,
    receiver: Option<PushReceiver>,
    scheduler: Option<KeepaliveScheduler>,
    lease: Option<LeaseRequest>,
}

impl EventSession {
    /// Create a session that talks to the device over LAPI.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let client = LapiClient::new(config.lapi_config())?;
        Self::with_transport(config, Arc::new(client))
    }

    /// Create a session from `UNV_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SessionConfig::from_env()?)
    }

    /// Create a session over a caller-supplied transport.
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let manager = Arc::new(SubscriptionManager::new(
            transport,
            config.failure_threshold,
        ));

        Ok(Self {
            config,
            manager,
            dispatcher: EventDispatcher::new(),
            reporter: StatusReporter::new(),
            receiver: None,
            scheduler: None,
            lease: None,
        })
    }

    /// Call `handler` for every alarm notification.
    pub fn on_alarm<F>(&self, handler: F)
    where
        F: Fn(AlarmNotification) + Send + Sync + 'static,
    {
        self.dispatcher.register(
            ALARM_PATH_SUFFIX,
            move |event: &InboundEvent| -> std::result::Result<(), HandlerError> {
                handler(AlarmNotification::from_event(event));
                Ok(())
            },
        );
    }

    /// Call `handler` for every face-match notification.
    pub fn on_person_match<F>(&self, handler: F)
    where
        F: Fn(PersonMatchNotification) + Send + Sync + 'static,
    {
        self.dispatcher.register(
            PERSON_INFO_PATH_SUFFIX,
            move |event: &InboundEvent| -> std::result::Result<(), HandlerError> {
                handler(PersonMatchNotification::from_event(event));
                Ok(())
            },
        );
    }

    /// Dispatcher for registering handlers on other paths.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Bind the receiver, subscribe, and start the keepalive loop.
    ///
    /// The keepalive loop is started even when the first subscribe fails, so
    /// the session keeps trying once per renewal interval; the failure is
    /// still returned. Calling `start` again on a running session only
    /// resubscribes.
    pub async fn start(&mut self) -> Result<Subscription> {
        if self.receiver.is_none() {
            let dispatcher = self.dispatcher.clone();
            let receiver = PushReceiver::bind(self.config.listen_addr, dispatcher).await?;
            self.reporter
                .report(SessionStatus::Listening(receiver.local_addr()));

            let port = match self.config.callback_port {
                0 => receiver.local_addr().port(),
                port => port,
            };
            self.lease = Some(LeaseRequest::new(
                self.config.callback_host.clone(),
                port,
                self.config.lease_duration,
            ));
            self.receiver = Some(receiver);
        }

        let result = self.resubscribe().await;

        if self.scheduler.is_none() {
            if let Some(lease) = self.lease.clone() {
                self.scheduler = Some(KeepaliveScheduler::start(
                    self.manager.clone(),
                    self.reporter.clone(),
                    lease,
                    self.config.renewal_interval,
                ));
            }
        }

        result
    }

    /// Abandon the current lease and subscribe again.
    ///
    /// Safe to call while the keepalive loop is running; the two never
    /// interleave their device calls and the last granted id wins.
    pub async fn resubscribe(&self) -> Result<Subscription> {
        let lease = self
            .lease
            .as_ref()
            .ok_or_else(|| SessionError::NotRunning("session has not been started".to_string()))?;

        self.reporter.report(SessionStatus::Resubscribing);
        match self.manager.subscribe_with(lease).await {
            Ok(subscription) => {
                if let Some(id) = subscription.id.clone() {
                    self.reporter.report(SessionStatus::Subscribed(id));
                }
                Ok(subscription)
            }
            Err(e) => {
                self.reporter
                    .report(SessionStatus::SubscribeFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Most recently reported status.
    pub fn status(&self) -> SessionStatus {
        self.reporter.current()
    }

    /// Watch status changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.reporter.watch()
    }

    /// Recently reported statuses, oldest first.
    pub fn status_history(&self) -> Vec<SessionStatus> {
        self.reporter.history()
    }

    /// Current view of the lease.
    pub fn subscription(&self) -> Subscription {
        self.manager.snapshot()
    }

    /// Lease owner, for callers that drive subscribe and renew themselves.
    pub fn manager(&self) -> &Arc<SubscriptionManager> {
        &self.manager
    }

    /// Address the receiver is bound to, once started.
    pub fn receiver_addr(&self) -> Option<SocketAddr> {
        self.receiver.as_ref().map(PushReceiver::local_addr)
    }

    /// Whether the receiver is accepting notifications.
    pub fn receiver_running(&self) -> bool {
        self.receiver.as_ref().is_some_and(PushReceiver::is_running)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Stop the keepalive loop, then the receiver, waiting for both.
    ///
    /// The device is not told to cancel the lease; it lapses on its own.
    pub async fn shutdown(mut self) -> Result<()> {
        let scheduler = self.scheduler.take();
        let receiver = self.receiver.take();

        let keepalive = match scheduler {
            Some(scheduler) => scheduler.shutdown().await,
            None => Ok(()),
        };
        let listener = match receiver {
            Some(receiver) => receiver.shutdown().await.map_err(SessionError::from),
            None => Ok(()),
        };

        self.reporter.report(SessionStatus::Stopped);
        keepalive.and(listener)
    }
}

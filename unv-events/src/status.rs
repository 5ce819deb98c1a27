//! Human-readable lifecycle status, published on a watch channel.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::subscription::SubscriptionId;

const HISTORY_LIMIT: usize = 64;

/// The lifecycle phase a session last reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Listening(SocketAddr),
    Subscribed(SubscriptionId),
    Renewed(SubscriptionId),
    Resubscribing,
    RenewFailed,
    SubscribeFailed(String),
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Listening(addr) => write!(f, "Receiver listening on {addr}"),
            SessionStatus::Subscribed(id) => write!(f, "Subscribed OK. ID={id}"),
            SessionStatus::Renewed(id) => write!(f, "Renewed subscription. ID={id}"),
            SessionStatus::Resubscribing => write!(f, "Re-subscribing..."),
            SessionStatus::RenewFailed => write!(f, "Renew failed -> re-subscribing..."),
            SessionStatus::SubscribeFailed(reason) => write!(f, "Subscribe failed: {reason}"),
            SessionStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Publishes status transitions to watchers and to the log.
///
/// Cloning is cheap; every clone publishes to the same channel.
#[derive(Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<SessionStatus>>,
    history: Arc<Mutex<VecDeque<SessionStatus>>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::Idle);
        Self {
            tx: Arc::new(tx),
            history: Arc::new(Mutex::new(VecDeque::from([SessionStatus::Idle]))),
        }
    }

    /// Publish a new status.
    pub fn report(&self, status: SessionStatus) {
        tracing::info!(status = %status, "Session status changed");

        {
            let mut history = self.history.lock();
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(status.clone());
        }

        self.tx.send_replace(status);
    }

    /// The most recently reported status.
    pub fn current(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    /// Watch for future status changes.
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// Recently reported statuses, oldest first.
    pub fn history(&self) -> Vec<SessionStatus> {
        self.history.lock().iter().cloned().collect()
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("current", &self.current())
            .finish()
    }
}

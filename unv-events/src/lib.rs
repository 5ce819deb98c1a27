//! Event subscriptions and push delivery for UNV recorders and cameras
//!
//! A UNV device pushes alarms and face-match results to an HTTP address it
//! has been given through a time-limited subscription lease. This crate ties
//! together the pieces needed to receive them:
//!
//! - [`SubscriptionManager`]: the lease state machine (subscribe, renew,
//!   expiry, fallback to resubscribe) over any [`lapi_client::Transport`].
//! - [`KeepaliveScheduler`]: a background loop that renews the lease well
//!   before it runs out and resubscribes when renewal fails.
//! - [`EventSession`]: binds the push receiver, subscribes, keeps the lease
//!   alive and routes notifications to typed handlers.
//! - [`StatusReporter`] / [`SessionStatus`]: human-readable lifecycle status.
//!
//! # Quick Start
//!
//! ```no_run
//! use unv_events::{EventSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     unv_events::logging::init_logging_from_env()?;
//!
//!     let mut session = EventSession::new(SessionConfig::from_env()?)?;
//!     session.on_person_match(|event| {
//!         for face in &event.faces {
//!             println!("{:?} ({:?}%)", face.person_name, face.similarity);
//!         }
//!     });
//!
//!     session.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod keepalive;
pub mod logging;
pub mod notification;
pub mod session;
pub mod status;
pub mod subscription;

pub use config::SessionConfig;
pub use error::{ConfigError, Result, SessionError, SubscriptionError, SubscriptionResult};
pub use keepalive::{CycleOutcome, KeepaliveScheduler};
pub use notification::{
    AlarmNotification, FaceMatch, PersonMatchNotification, ALARM_PATH_SUFFIX,
    PERSON_INFO_PATH_SUFFIX,
};
pub use session::EventSession;
pub use status::{SessionStatus, StatusReporter};
pub use subscription::{
    LeaseRequest, Subscription, SubscriptionId, SubscriptionManager, SubscriptionState,
};

// Re-export the lower layers so applications need only this crate
pub use callback_server::{EventDispatcher, HandlerError, InboundEvent, PushReceiver};
pub use lapi_client::{LapiClient, LapiConfig, Transport, TransportError};

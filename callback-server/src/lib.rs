//! HTTP callback server for receiving device push notifications.
//!
//! The device is told to POST its events to an address served by this crate.
//! It is generic: it knows nothing about subscriptions or event schemas.
//!
//! # Overview
//!
//! - [`PushReceiver`]: HTTP listener bound to a local address. Every POST is
//!   answered `200 OK` with an empty body before its payload is examined.
//! - [`EventDispatcher`]: routes decoded events to handlers by path suffix,
//!   containing handler errors and panics.
//! - [`InboundEvent`]: the callback path plus the decoded JSON body.
//!
//! Undecodable payloads (non-UTF-8, invalid JSON) are acknowledged and then
//! dropped. Events for paths with no registered handler are dropped too.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{EventDispatcher, HandlerError, InboundEvent, PushReceiver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = EventDispatcher::new();
//!     dispatcher.register(
//!         "/System/Event/Notification/Alarm",
//!         |event: &InboundEvent| -> Result<(), HandlerError> {
//!             println!("{} -> {}", event.path, event.body);
//!             Ok(())
//!         },
//!     );
//!
//!     let receiver = PushReceiver::bind("0.0.0.0:9000".parse()?, dispatcher).await?;
//!     println!("Push receiver listening at {}", receiver.local_addr());
//!
//!     tokio::signal::ctrl_c().await?;
//!     receiver.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
mod event;
mod receiver;

pub use dispatcher::{DispatchOutcome, EventDispatcher, EventHandler, HandlerError};
pub use event::{DecodeError, InboundEvent};
pub use receiver::{PushReceiver, ReceiverError};

//! Path-suffix routing of inbound events to handlers.
//!
//! The device namespaces its callback paths, so only the trailing segments
//! distinguish event categories. The `EventDispatcher` keeps an ordered list
//! of suffix registrations and invokes the first one that matches.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::event::InboundEvent;

/// Failure reported by an event handler.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives dispatched events.
///
/// Handlers run synchronously on a blocking worker. Marshaling work onto
/// another execution context (a UI thread, a channel) is up to the handler.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &InboundEvent) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&InboundEvent) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &InboundEvent) -> Result<(), HandlerError> {
        self(event)
    }
}

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A handler ran and returned `Ok`
    Delivered,
    /// No registration matched the path; the event was dropped
    Unmatched,
    /// The handler returned an error
    Failed(HandlerError),
    /// The handler panicked; the panic was contained
    Panicked(String),
}

struct Registration {
    suffix: String,
    handler: Arc<dyn EventHandler>,
}

/// Routes inbound events to handlers by path suffix.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registrations: Arc<RwLock<Vec<Registration>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for paths ending with `suffix`.
    ///
    /// Registrations are consulted in the order they were added.
    pub fn register<H>(&self, suffix: impl Into<String>, handler: H)
    where
        H: EventHandler + 'static,
    {
        let suffix = suffix.into();
        tracing::debug!(%suffix, "Registered event handler");
        self.registrations.write().push(Registration {
            suffix,
            handler: Arc::new(handler),
        });
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registrations.read().len()
    }

    /// Invoke the first handler whose suffix matches the event path.
    ///
    /// Handler errors and panics are contained here and reported in the
    /// returned outcome; they never propagate to the caller.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchOutcome {
        // Release the lock before running user code.
        let handler = {
            let registrations = self.registrations.read();
            registrations
                .iter()
                .find(|r| event.path.ends_with(r.suffix.as_str()))
                .map(|r| r.handler.clone())
        };

        let Some(handler) = handler else {
            tracing::debug!(path = %event.path, "No handler registered, dropping event");
            return DispatchOutcome::Unmatched;
        };

        match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
            Ok(Ok(())) => DispatchOutcome::Delivered,
            Ok(Err(e)) => {
                tracing::warn!(path = %event.path, "Event handler failed: {}", e);
                DispatchOutcome::Failed(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(path = %event.path, "Event handler panicked: {}", message);
                DispatchOutcome::Panicked(message)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! HTTP listener for device push notifications.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::Filter;

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::event::InboundEvent;

/// Errors from starting or stopping the receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The listening socket could not be bound
    #[error("Failed to bind push receiver on {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    /// The server task did not stop cleanly
    #[error("Push receiver shutdown error: {0}")]
    Shutdown(String),
}

/// HTTP listener for push notifications from the device.
///
/// Each POST is acknowledged with an empty `200 OK` as soon as its body has
/// been read. Decoding and dispatch happen afterwards on a blocking worker,
/// so a slow or failing handler never delays the acknowledgement of this or
/// any concurrent request.
///
/// # Example
///
/// ```no_run
/// use callback_server::{EventDispatcher, HandlerError, InboundEvent, PushReceiver};
///
/// #[tokio::main]
/// async fn main() {
///     let dispatcher = EventDispatcher::new();
///     dispatcher.register("/Notification/Alarm", |event: &InboundEvent| -> Result<(), HandlerError> {
///         println!("alarm: {}", event.body);
///         Ok(())
///     });
///
///     let receiver = PushReceiver::bind("0.0.0.0:9000".parse().unwrap(), dispatcher)
///         .await
///         .expect("Failed to bind push receiver");
///
///     println!("Listening on {}", receiver.local_addr());
/// }
/// ```
pub struct PushReceiver {
    /// The address the listener is bound to
    local_addr: SocketAddr,
    /// Dispatcher shared with every request task
    dispatcher: EventDispatcher,
    /// Shutdown signal sender
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle
    server_handle: Option<JoinHandle<()>>,
}

impl PushReceiver {
    /// Bind the listener and start accepting notifications.
    ///
    /// Binding to port 0 picks a free port; see [`PushReceiver::local_addr`].
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: EventDispatcher,
    ) -> Result<Self, ReceiverError> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let routes = Self::routes(dispatcher.clone());
        let (local_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|e| ReceiverError::Bind {
                addr,
                message: e.to_string(),
            })?;

        let server_handle = tokio::spawn(async move {
            server.await;
            tracing::info!("Push receiver on {} stopped", local_addr);
        });

        tracing::info!("Push receiver listening on {}", local_addr);

        Ok(Self {
            local_addr,
            dispatcher,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The dispatcher events are handed to.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Whether the server task is still running.
    pub fn is_running(&self) -> bool {
        self.server_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop accepting connections and wait for the server task.
    ///
    /// In-flight requests are allowed to finish for up to 5 seconds.
    pub async fn shutdown(mut self) -> Result<(), ReceiverError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let Some(handle) = self.server_handle.take() else {
            return Ok(());
        };

        match tokio::time::timeout(Duration::from_secs(5), handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ReceiverError::Shutdown(format!("Server task failed: {e}"))),
            Err(_) => Err(ReceiverError::Shutdown(
                "Server shutdown timed out after 5 seconds".to_string(),
            )),
        }
    }

    /// POST on any path: acknowledge, then decode and dispatch in the background.
    fn routes(
        dispatcher: EventDispatcher,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone + Send + Sync + 'static
    {
        let notify_route = warp::post()
            .and(warp::path::full())
            .and(warp::body::bytes())
            .map(move |path: warp::path::FullPath, body: bytes::Bytes| {
                let dispatcher = dispatcher.clone();
                let path = path.as_str().to_string();

                tokio::task::spawn_blocking(move || deliver(&dispatcher, path, &body));

                warp::reply::with_status(warp::reply(), warp::http::StatusCode::OK)
            });

        notify_route.recover(handle_rejection)
    }
}

impl Drop for PushReceiver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Decode one request body and hand it to the dispatcher.
fn deliver(dispatcher: &EventDispatcher, path: String, body: &[u8]) -> Option<DispatchOutcome> {
    let event = match InboundEvent::decode(path.as_str(), body) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%path, bytes = body.len(), "Dropping undecodable payload: {}", e);
            return None;
        }
    };

    tracing::debug!(%path, "Dispatching inbound event");
    Some(dispatcher.dispatch(&event))
}

/// Convert rejections (wrong method, unreadable body) to plain responses.
async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        warp::http::StatusCode::METHOD_NOT_ALLOWED
    } else if err.is_not_found() {
        warp::http::StatusCode::NOT_FOUND
    } else {
        warp::http::StatusCode::BAD_REQUEST
    };

    Ok(warp::reply::with_status(warp::reply(), code))
}

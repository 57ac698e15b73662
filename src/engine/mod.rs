//! Protocol engine: sockets, TLS, HTTP parsing and WebSocket framing.
//!
//! The engine owns a tokio runtime that serves the listening port with
//! axum. It never calls into the core directly. Instead every connection
//! reports typed [`EngineEvent`]s on one channel, and the owner of the
//! [`Engine`] pulls them with [`Engine::service`] on its own thread. Output
//! flows back through the per-connection [`Link`].

pub mod event;
pub mod handle;
pub mod link;
pub mod router;
pub mod tls;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::serve::ListenerExt;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use event::{ConnectionId, DataEvent, EngineEvent, Frame, HttpEvent, Protocol, RawHttpRequest};
pub use handle::EngineHandle;
pub use link::Link;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// A running protocol engine bound to one port.
#[derive(Debug)]
pub struct Engine {
    runtime: Runtime,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    handle: EngineHandle,
    local_addr: SocketAddr,
    server: JoinHandle<()>,
}

impl Engine {
    /// Binds the configured port and starts serving.
    ///
    /// `max_message_size` caps inbound Data messages.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Tls`] if TLS material cannot be loaded and
    /// [`GatewayError::Engine`] if the runtime cannot be built or the port
    /// cannot be bound.
    pub fn create(config: &GatewayConfig, max_message_size: usize) -> Result<Self, GatewayError> {
        let tls = config
            .tls
            .as_ref()
            .map(tls::load_server_config)
            .transpose()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("ui-gateway-engine")
            .build()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = EngineHandle::new(events_tx.clone());

        let listener = runtime.block_on(TcpListener::bind(config.listen_addr()))?;
        let local_addr = listener.local_addr()?;

        let app = router::build_router(router::EngineState::new(events_tx, max_message_size))
            .into_make_service_with_connect_info::<SocketAddr>();

        let tls_enabled = tls.is_some();
        let server = match tls {
            Some(tls_config) => runtime.spawn(async move {
                let listener = match tls::TlsListener::new(listener, tls_config) {
                    Ok(listener) => listener.tap_io(|_| {}),
                    Err(e) => {
                        tracing::error!(error = %e, "tls listener failed to start");
                        return;
                    }
                };
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "protocol engine stopped");
                }
            }),
            None => runtime.spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "protocol engine stopped");
                }
            }),
        };

        tracing::info!(addr = %local_addr, tls = tls_enabled, "protocol engine listening");

        Ok(Self {
            runtime,
            events: events_rx,
            handle,
            local_addr,
            server,
        })
    }

    /// Address the engine is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cloneable handle for other threads.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Processes pending events for at most `timeout`.
    ///
    /// Waits up to `timeout` for the first event, then hands every queued
    /// event to `dispatch` until the queue is empty or the time slice is
    /// spent. Events queued by `dispatch` itself are picked up in the same
    /// call. A `timeout` too large to represent as a deadline waits
    /// without bound. Returns the number of events dispatched.
    pub fn service<F>(&mut self, timeout: Duration, mut dispatch: F) -> usize
    where
        F: FnMut(EngineEvent),
    {
        let deadline = Instant::now().checked_add(timeout);
        let Self {
            runtime,
            events,
            handle,
            ..
        } = self;

        let first = runtime.block_on(async { tokio::time::timeout(timeout, events.recv()).await });
        let Ok(Some(event)) = first else {
            return 0;
        };
        handle.acknowledge(&event);
        dispatch(event);

        let mut handled = 1;
        while deadline.is_none_or(|deadline| Instant::now() < deadline) {
            let Ok(event) = events.try_recv() else {
                break;
            };
            handle.acknowledge(&event);
            dispatch(event);
            handled += 1;
        }
        handled
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn engine() -> Engine {
        let config = GatewayConfig::new(0).with_bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        match Engine::create(&config, 1024) {
            Ok(engine) => engine,
            Err(e) => panic!("engine failed to start: {e}"),
        }
    }

    #[test]
    fn binds_ephemeral_port() {
        let engine = engine();
        assert_ne!(engine.local_addr().port(), 0);
    }

    #[test]
    fn service_accepts_unbounded_timeout() {
        let mut engine = engine();
        engine.handle().cancel_service();
        let mut seen = Vec::new();
        let handled = engine.service(Duration::MAX, |event| seen.push(event));
        assert_eq!(handled, 1);
        assert!(matches!(seen.as_slice(), [EngineEvent::Cancel]));
    }

    #[test]
    fn queued_writable_requests_are_serviced_once() {
        let mut engine = engine();
        let handle = engine.handle();
        for _ in 0..3 {
            handle.cancel_service();
            handle.callback_on_writable_all(Protocol::Data);
        }

        let mut writable = 0;
        engine.service(Duration::from_millis(200), |event| {
            if matches!(event, EngineEvent::WritableAll(Protocol::Data)) {
                writable += 1;
            }
        });
        assert_eq!(writable, 1);

        handle.callback_on_writable_all(Protocol::Data);
        let mut again = 0;
        engine.service(Duration::from_millis(200), |event| {
            if matches!(event, EngineEvent::WritableAll(Protocol::Data)) {
                again += 1;
            }
        });
        assert_eq!(again, 1);
    }
}

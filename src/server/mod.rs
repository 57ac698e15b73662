//! Public server: one port, two protocols, driven by [`WebsocketServer::step`].
//!
//! The owner calls `step` in a loop. Each call lets the engine deliver
//! pending connection events for at most the configured time slice and runs
//! every protocol handler and delegate on the calling thread. Broadcasts may
//! come from other threads through a [`Broadcaster`].

pub mod broadcaster;
pub mod connections;
pub mod context;
pub mod protocol;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

pub use broadcaster::Broadcaster;
pub use connections::ConnectionTable;
pub use context::{ClientDisconnectDelegate, DataReceiveDelegate, HttpRequestDelegate, ServerContext};
pub use protocol::{ConnectionHandler, Flow};

use crate::config::{DATA_TX_PACKET_SIZE, GatewayConfig};
use crate::domain::{ClientId, OutboundBuffer, SessionStore};
use crate::engine::Engine;
use crate::error::GatewayError;

/// HTTP and WebSocket front end bound to one port.
pub struct WebsocketServer {
    engine: Engine,
    context: ServerContext,
    connections: ConnectionTable,
    broadcaster: Broadcaster,
    config: GatewayConfig,
}

impl fmt::Debug for WebsocketServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebsocketServer")
            .field("local_addr", &self.engine.local_addr())
            .field("connections", &self.connections.len())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl WebsocketServer {
    /// Binds the configured port and starts the protocol engine.
    ///
    /// TLS is enabled when the configuration carries certificate and key
    /// paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be created: the port cannot be
    /// bound, the runtime cannot start or the TLS material is unusable.
    pub fn new(
        config: GatewayConfig,
        http_delegate: Option<HttpRequestDelegate>,
        data_delegate: Option<DataReceiveDelegate>,
    ) -> Result<Self, GatewayError> {
        let engine = Engine::create(&config, DATA_TX_PACKET_SIZE)?;
        let outbound = Arc::new(OutboundBuffer::new(DATA_TX_PACKET_SIZE));
        let broadcaster = Broadcaster::new(Arc::clone(&outbound), engine.handle());
        let context = ServerContext::new(outbound, http_delegate, data_delegate);

        tracing::info!(
            addr = %engine.local_addr(),
            tls = config.tls.is_some(),
            idle_timeout = ?config.session_idle_timeout,
            "server ready"
        );

        Ok(Self {
            engine,
            context,
            connections: ConnectionTable::new(),
            broadcaster,
            config,
        })
    }

    /// Replaces the Data receive delegate.
    pub fn set_data_receive_delegate(&mut self, delegate: Option<DataReceiveDelegate>) {
        self.context.set_data_receive_delegate(delegate);
    }

    /// Sets the delegate told about Data client disconnects.
    pub fn set_client_disconnect_delegate(&mut self, delegate: Option<ClientDisconnectDelegate>) {
        self.context.set_client_disconnect_delegate(delegate);
    }

    /// Processes pending socket events for at most one service time slice.
    ///
    /// Returns the number of engine events handled.
    pub fn step(&mut self) -> usize {
        let Self {
            engine,
            context,
            connections,
            config,
            ..
        } = self;
        let handled = engine.service(config.service_timeout, |event| {
            connections.dispatch(context, event);
        });

        if let Some(max_idle) = config.session_idle_timeout {
            context.sessions_mut().evict_idle(max_idle);
        }
        handled
    }

    /// Broadcasts `data` to every connected Data client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PayloadTooLarge`] if `data` does not fit in
    /// one frame.
    pub fn send_data_to_all_clients(&self, data: impl AsRef<[u8]>) -> Result<(), GatewayError> {
        self.broadcaster.send_to_all(data)
    }

    /// Broadcasts `data` to every connected Data client except `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PayloadTooLarge`] if `data` does not fit in
    /// one frame.
    pub fn send_data_to_all_other_clients(
        &self,
        data: impl AsRef<[u8]>,
        sender: ClientId,
    ) -> Result<(), GatewayError> {
        self.broadcaster.send_to_all_others(data, sender)
    }

    /// Handle for broadcasting from other threads.
    #[must_use]
    pub fn broadcaster(&self) -> Broadcaster {
        self.broadcaster.clone()
    }

    /// Address the server is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    /// Session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        self.context.sessions()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Drop for WebsocketServer {
    fn drop(&mut self) {
        self.connections.release_all(&mut self.context);
    }
}

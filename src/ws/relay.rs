//! Data-channel relay for one WebSocket connection.
//!
//! Inbound messages go to the Data receive delegate together with the
//! sender's client id. On every writable event the pending broadcast is
//! written as one binary frame, unless this client is the one that sent it.

use bytes::Bytes;

use crate::domain::ClientId;
use crate::engine::{Frame, Link};
use crate::server::{ConnectionHandler, Flow, ServerContext};

/// Lifecycle of a Data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    /// Accepted by the engine, not yet numbered.
    #[default]
    Connecting,
    /// Numbered and relaying.
    Established(ClientId),
    /// Released.
    Closed,
}

/// Per-connection Data state.
#[derive(Debug, Default)]
pub struct DataConnection {
    state: RelayState,
}

impl DataConnection {
    /// Creates a connection awaiting establishment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client id, once established.
    #[must_use]
    pub fn client_id(&self) -> Option<ClientId> {
        match self.state {
            RelayState::Established(id) => Some(id),
            RelayState::Connecting | RelayState::Closed => None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RelayState {
        self.state
    }
}

impl ConnectionHandler for DataConnection {
    type Inbound = Bytes;

    fn on_established(&mut self, cx: &mut ServerContext, link: &Link) -> Flow {
        let client_id = cx.login_client();
        self.state = RelayState::Established(client_id);
        tracing::debug!(conn = %link.id(), %client_id, peer = %link.peer(), "data client connected");
        Flow::Continue
    }

    fn on_data(&mut self, cx: &mut ServerContext, link: &Link, payload: Bytes) -> Flow {
        let Some(client_id) = self.client_id() else {
            return Flow::Continue;
        };
        let message = String::from_utf8_lossy(&payload);
        let client_ip = link.peer_simple();
        cx.delegate_received_data(&message, &client_ip, client_id);
        Flow::Continue
    }

    fn on_writable(&mut self, cx: &mut ServerContext, link: &Link) -> Flow {
        let Some(client_id) = self.client_id() else {
            return Flow::Continue;
        };
        let Some(payload) = cx.output_for(client_id) else {
            return Flow::Continue;
        };
        match link.write(Frame::Binary(Bytes::copy_from_slice(payload))) {
            Ok(_) => Flow::Continue,
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "broadcast write failed");
                Flow::Close
            }
        }
    }

    fn on_drop(&mut self, cx: &mut ServerContext) {
        if let Some(client_id) = self.client_id() {
            tracing::debug!(%client_id, "data client disconnected");
            cx.notify_client_disconnected(client_id);
        }
        self.state = RelayState::Closed;
    }
}

//! Connection table: owns every per-connection context and routes engine
//! events to it.
//!
//! A context is created on the first event of a connection and removed on
//! exactly one of: `Flow::Close` from a handler, an engine drop event, or
//! [`ConnectionTable::release_all`]. Removal always calls `on_drop`.

use std::collections::HashMap;

use super::context::ServerContext;
use super::protocol::{ConnectionHandler, Flow};
use crate::engine::{ConnectionId, DataEvent, EngineEvent, HttpEvent, Link, Protocol};
use crate::http::{HttpExchange, HttpInbound};
use crate::ws::DataConnection;

/// State owned by one live connection.
#[derive(Debug)]
enum ConnectionContext {
    Http { exchange: HttpExchange, link: Link },
    Data { relay: DataConnection, link: Link },
}

impl ConnectionContext {
    fn link(&self) -> &Link {
        match self {
            Self::Http { link, .. } | Self::Data { link, .. } => link,
        }
    }

    fn protocol(&self) -> Protocol {
        self.link().protocol()
    }

    fn writable(&mut self, cx: &mut ServerContext) -> Flow {
        match self {
            Self::Http { exchange, link } => exchange.on_writable(cx, link),
            Self::Data { relay, link } => relay.on_writable(cx, link),
        }
    }

    fn release(mut self, cx: &mut ServerContext) {
        match &mut self {
            Self::Http { exchange, .. } => exchange.on_drop(cx),
            Self::Data { relay, .. } => relay.on_drop(cx),
        }
    }
}

/// Every live connection, keyed by engine connection id.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    live: HashMap<ConnectionId, ConnectionContext>,
}

impl ConnectionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no connection is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of live connections speaking `protocol`.
    #[must_use]
    pub fn count(&self, protocol: Protocol) -> usize {
        self.live.values().filter(|c| c.protocol() == protocol).count()
    }

    /// Routes one engine event.
    ///
    /// Events for connections the table does not know are ignored.
    pub fn dispatch(&mut self, cx: &mut ServerContext, event: EngineEvent) {
        match event {
            EngineEvent::Http { conn, event } => self.dispatch_http(cx, conn, event),
            EngineEvent::Data { conn, event } => self.dispatch_data(cx, conn, event),
            EngineEvent::WritableAll(protocol) => self.writable_all(cx, protocol),
            EngineEvent::Cancel => tracing::trace!("service wait interrupted"),
        }
    }

    /// Closes and releases every live connection.
    pub fn release_all(&mut self, cx: &mut ServerContext) {
        for (conn, context) in self.live.drain() {
            tracing::trace!(%conn, "releasing connection");
            context.link().close();
            context.release(cx);
        }
    }

    fn dispatch_http(&mut self, cx: &mut ServerContext, conn: ConnectionId, event: HttpEvent) {
        let flow = match event {
            HttpEvent::Request { request, link } => {
                let mut exchange = HttpExchange::new();
                let mut flow = exchange.on_established(cx, &link);
                if flow == Flow::Continue {
                    flow = exchange.on_data(cx, &link, HttpInbound::Request(request));
                }
                self.live
                    .insert(conn, ConnectionContext::Http { exchange, link });
                flow
            }
            HttpEvent::Body(body) => self.http_data(cx, conn, HttpInbound::Body(body)),
            HttpEvent::BodyComplete => self.http_data(cx, conn, HttpInbound::BodyComplete),
            HttpEvent::Writable => match self.live.get_mut(&conn) {
                Some(context) => context.writable(cx),
                None => Flow::Continue,
            },
            HttpEvent::Dropped => {
                self.remove(cx, conn, false);
                return;
            }
        };
        self.settle(cx, conn, flow);
    }

    fn http_data(&mut self, cx: &mut ServerContext, conn: ConnectionId, inbound: HttpInbound) -> Flow {
        match self.live.get_mut(&conn) {
            Some(ConnectionContext::Http { exchange, link }) => exchange.on_data(cx, link, inbound),
            _ => Flow::Continue,
        }
    }

    fn dispatch_data(&mut self, cx: &mut ServerContext, conn: ConnectionId, event: DataEvent) {
        let flow = match event {
            DataEvent::Established { link } => {
                let mut relay = DataConnection::new();
                let flow = relay.on_established(cx, &link);
                self.live.insert(conn, ConnectionContext::Data { relay, link });
                flow
            }
            DataEvent::Receive(payload) => match self.live.get_mut(&conn) {
                Some(ConnectionContext::Data { relay, link }) => relay.on_data(cx, link, payload),
                _ => Flow::Continue,
            },
            DataEvent::Writable => match self.live.get_mut(&conn) {
                Some(context) => context.writable(cx),
                None => Flow::Continue,
            },
            DataEvent::Closed => {
                self.remove(cx, conn, false);
                return;
            }
        };
        self.settle(cx, conn, flow);
    }

    fn writable_all(&mut self, cx: &mut ServerContext, protocol: Protocol) {
        let mut closing = Vec::new();
        for (conn, context) in &mut self.live {
            if context.protocol() == protocol && context.writable(cx) == Flow::Close {
                closing.push(*conn);
            }
        }
        for conn in closing {
            self.remove(cx, conn, true);
        }
    }

    fn settle(&mut self, cx: &mut ServerContext, conn: ConnectionId, flow: Flow) {
        if flow == Flow::Close {
            self.remove(cx, conn, true);
        }
    }

    fn remove(&mut self, cx: &mut ServerContext, conn: ConnectionId, close: bool) {
        let Some(context) = self.live.remove(&conn) else {
            return;
        };
        if close {
            context.link().close();
        }
        tracing::trace!(%conn, protocol = ?context.protocol(), "connection released");
        context.release(cx);
    }
}

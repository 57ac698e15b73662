//! Write side of one connection, as seen from the event-processing context.

use std::net::SocketAddr;

use axum::http::StatusCode;
use tokio::sync::mpsc;

use super::event::{ConnectionId, DataEvent, EngineEvent, Frame, HttpEvent, Protocol};
use crate::error::GatewayError;

/// Handle through which protocol handlers answer a connection.
///
/// Writes never block: frames are queued to the connection task, which
/// performs the socket I/O.
#[derive(Debug, Clone)]
pub struct Link {
    conn: ConnectionId,
    protocol: Protocol,
    peer: SocketAddr,
    frames: mpsc::UnboundedSender<Frame>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Link {
    /// Creates a link for connection `conn`.
    #[must_use]
    pub fn new(
        conn: ConnectionId,
        protocol: Protocol,
        peer: SocketAddr,
        frames: mpsc::UnboundedSender<Frame>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            conn,
            protocol,
            peer,
            frames,
            events,
        }
    }

    /// Connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.conn
    }

    /// Protocol the connection speaks.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Peer socket address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Peer IP address as text.
    #[must_use]
    pub fn peer_simple(&self) -> String {
        self.peer.ip().to_string()
    }

    /// Queues `frame` for the connection and returns its payload length.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionClosed`] if the connection task is
    /// gone.
    pub fn write(&self, frame: Frame) -> Result<usize, GatewayError> {
        let len = frame.len();
        self.frames
            .send(frame)
            .map_err(|_| GatewayError::ConnectionClosed(self.conn))?;
        Ok(len)
    }

    /// Answers with a status-only HTTP response.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionClosed`] if the connection task is
    /// gone.
    pub fn return_http_status(
        &self,
        status: StatusCode,
        message: Option<&str>,
    ) -> Result<usize, GatewayError> {
        self.write(Frame::HttpStatus {
            status,
            message: message.map(str::to_owned),
        })
    }

    /// Asks for a writable event on this connection.
    pub fn callback_on_writable(&self) {
        let event = match self.protocol {
            Protocol::Http => EngineEvent::Http {
                conn: self.conn,
                event: HttpEvent::Writable,
            },
            Protocol::Data => EngineEvent::Data {
                conn: self.conn,
                event: DataEvent::Writable,
            },
        };
        if self.events.send(event).is_err() {
            tracing::trace!(conn = %self.conn, "event loop gone; writable request dropped");
        }
    }

    /// Terminates the connection.
    pub fn close(&self) {
        let _ = self.frames.send(Frame::Close);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn link(protocol: Protocol) -> (
        Link,
        mpsc::UnboundedReceiver<Frame>,
        mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let peer: SocketAddr = ([10, 0, 0, 7], 5555).into();
        (
            Link::new(ConnectionId::from_raw(3), protocol, peer, frames_tx, events_tx),
            frames_rx,
            events_rx,
        )
    }

    #[test]
    fn write_queues_frame_and_reports_length() {
        let (link, mut frames, _events) = link(Protocol::Data);
        let result = link.write(Frame::Binary(bytes::Bytes::from_static(b"abcd")));
        assert_eq!(result.ok(), Some(4));
        assert!(matches!(frames.try_recv(), Ok(Frame::Binary(b)) if b.as_ref() == b"abcd"));
    }

    #[test]
    fn write_to_dropped_connection_fails() {
        let (link, frames, _events) = link(Protocol::Http);
        drop(frames);
        let Err(GatewayError::ConnectionClosed(conn)) = link.write(Frame::Close) else {
            panic!("expected ConnectionClosed");
        };
        assert_eq!(conn, ConnectionId::from_raw(3));
    }

    #[test]
    fn callback_on_writable_targets_own_protocol() {
        let (link, _frames, mut events) = link(Protocol::Http);
        link.callback_on_writable();
        let Ok(EngineEvent::Http { conn, event }) = events.try_recv() else {
            panic!("expected http event");
        };
        assert_eq!(conn, ConnectionId::from_raw(3));
        assert!(matches!(event, HttpEvent::Writable));
    }

    #[test]
    fn peer_simple_is_ip_only() {
        let (link, _frames, _events) = link(Protocol::Data);
        assert_eq!(link.peer_simple(), "10.0.0.7");
    }
}

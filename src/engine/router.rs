//! Axum adapter between the network and the event-processing context.
//!
//! One fallback handler serves the whole port. WebSocket upgrades become
//! Data connections, everything else is an HTTP exchange. Each connection
//! task reports [`EngineEvent`]s and turns the [`Frame`]s written by the core
//! back into an HTTP response or WebSocket messages.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::event::{ConnectionId, DataEvent, EngineEvent, Frame, HttpEvent, Protocol, RawHttpRequest};
use super::link::Link;
use crate::error::GatewayError;

/// WebSocket subprotocol offered for the Data channel.
pub const DATA_PROTOCOL_NAME: &str = "data";

/// Largest POST body the engine buffers.
const MAX_HTTP_BODY: usize = 1 << 20;

/// State shared by all connection tasks.
#[derive(Debug, Clone)]
pub(crate) struct EngineState {
    events: mpsc::UnboundedSender<EngineEvent>,
    next_conn: Arc<AtomicU64>,
    max_message_size: usize,
}

impl EngineState {
    pub(crate) fn new(events: mpsc::UnboundedSender<EngineEvent>, max_message_size: usize) -> Self {
        Self {
            events,
            next_conn: Arc::new(AtomicU64::new(0)),
            max_message_size,
        }
    }

    fn next_connection(&self) -> ConnectionId {
        let prev = self.next_conn.fetch_add(1, Ordering::Relaxed);
        ConnectionId::from_raw(prev.wrapping_add(1))
    }

    fn link(&self, conn: ConnectionId, protocol: Protocol, peer: SocketAddr) -> (Link, mpsc::UnboundedReceiver<Frame>) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let link = Link::new(conn, protocol, peer, frames_tx, self.events.clone());
        (link, frames_rx)
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event loop gone; engine event dropped");
        }
    }
}

/// Reports the end of a connection when its task finishes or is dropped.
#[derive(Debug)]
struct ConnectionGuard {
    events: mpsc::UnboundedSender<EngineEvent>,
    conn: ConnectionId,
    protocol: Protocol,
}

impl ConnectionGuard {
    fn new(state: &EngineState, conn: ConnectionId, protocol: Protocol) -> Self {
        Self {
            events: state.events.clone(),
            conn,
            protocol,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let event = match self.protocol {
            Protocol::Http => EngineEvent::Http {
                conn: self.conn,
                event: HttpEvent::Dropped,
            },
            Protocol::Data => EngineEvent::Data {
                conn: self.conn,
                event: DataEvent::Closed,
            },
        };
        let _ = self.events.send(event);
    }
}

/// Builds the single-route router serving both protocols.
pub(crate) fn build_router(state: EngineState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn dispatch(
    State(state): State<EngineState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    if !is_websocket_upgrade(request.headers()) {
        return run_http_exchange(state, peer, request).await;
    }

    let (mut parts, _body) = request.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => {
            let max_message_size = state.max_message_size;
            upgrade
                .protocols([DATA_PROTOCOL_NAME])
                .max_message_size(max_message_size)
                .on_upgrade(move |socket| run_data_connection(socket, state, peer))
                .into_response()
        }
        Err(rejection) => rejection.into_response(),
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

async fn run_http_exchange(state: EngineState, peer: SocketAddr, request: Request) -> Response {
    let conn = state.next_connection();
    let (link, mut frames) = state.link(conn, Protocol::Http, peer);
    let _guard = ConnectionGuard::new(&state, conn, Protocol::Http);

    let (parts, body) = request.into_parts();
    let request = RawHttpRequest::from_parts(&parts.method, &parts.uri, &parts.headers);
    let expects_body = request.post_uri().is_some();
    state.emit(EngineEvent::Http {
        conn,
        event: HttpEvent::Request { request, link },
    });

    if expects_body {
        match axum::body::to_bytes(body, MAX_HTTP_BODY).await {
            Ok(bytes) => {
                if !bytes.is_empty() {
                    state.emit(EngineEvent::Http {
                        conn,
                        event: HttpEvent::Body(bytes),
                    });
                }
                state.emit(EngineEvent::Http {
                    conn,
                    event: HttpEvent::BodyComplete,
                });
            }
            Err(e) => {
                tracing::debug!(%conn, error = %e, "failed to read request body");
                return GatewayError::BadRequest("unreadable body".to_string()).into_response();
            }
        }
    }

    let mut assembly = ResponseAssembly::default();
    while let Some(frame) = frames.recv().await {
        if frame == Frame::Close {
            break;
        }
        assembly.push(frame);
    }
    assembly.finish(conn)
}

async fn run_data_connection(socket: WebSocket, state: EngineState, peer: SocketAddr) {
    let conn = state.next_connection();
    let (link, mut frames) = state.link(conn, Protocol::Data, peer);
    let _guard = ConnectionGuard::new(&state, conn, Protocol::Data);
    state.emit(EngineEvent::Data {
        conn,
        event: DataEvent::Established { link },
    });

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => state.emit(EngineEvent::Data {
                        conn,
                        event: DataEvent::Receive(Bytes::copy_from_slice(text.as_str().as_bytes())),
                    }),
                    Some(Ok(Message::Binary(data))) => state.emit(EngineEvent::Data {
                        conn,
                        event: DataEvent::Receive(data),
                    }),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%conn, error = %e, "data connection error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            frame = frames.recv() => {
                match frame {
                    Some(Frame::Binary(payload)) => {
                        if ws_tx.send(Message::Binary(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Frame::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    Some(other) => {
                        tracing::warn!(%conn, len = other.len(), "non-data frame on data connection ignored");
                    }
                }
            }
        }
    }

    tracing::debug!(%conn, "data connection closed");
}

/// Collects the frames written to one HTTP exchange.
#[derive(Debug, Default)]
struct ResponseAssembly {
    head: Option<Bytes>,
    body: BytesMut,
    status: Option<(StatusCode, Option<String>)>,
}

impl ResponseAssembly {
    fn push(&mut self, frame: Frame) {
        match frame {
            Frame::HttpHeaders(head) => self.head = Some(head),
            Frame::HttpBody(chunk) => self.body.extend_from_slice(&chunk),
            Frame::HttpStatus { status, message } => self.status = Some((status, message)),
            Frame::Binary(_) => tracing::warn!("binary frame on http connection ignored"),
            Frame::Close => {}
        }
    }

    fn finish(self, conn: ConnectionId) -> Response {
        if let Some((status, message)) = self.status {
            return status_response(status, message);
        }
        let Some(head) = self.head else {
            return GatewayError::ConnectionClosed(conn).into_response();
        };
        let Some((status, headers)) = parse_head(&head) else {
            tracing::warn!(%conn, "malformed response header");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };

        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

fn status_response(status: StatusCode, message: Option<String>) -> Response {
    (
        status,
        [(header::CONNECTION, "close")],
        message.unwrap_or_default(),
    )
        .into_response()
}

/// Parses a rendered `HTTP/1.1 <code> <reason>` status line followed by
/// `name: value` lines.
fn parse_head(head: &[u8]) -> Option<(StatusCode, HeaderMap)> {
    let text = std::str::from_utf8(head).ok()?;
    let mut lines = text.lines();
    let code = lines.next()?.split_whitespace().nth(1)?;
    let status = StatusCode::from_bytes(code.as_bytes()).ok()?;

    let mut headers = HeaderMap::new();
    for line in lines.filter(|line| !line.trim().is_empty()) {
        let (name, value) = line.split_once(':')?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
        let value = HeaderValue::from_str(value.trim()).ok()?;
        headers.append(name, value);
    }
    Some((status, headers))
}

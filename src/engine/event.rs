//! Typed events delivered from the engine to the event-processing context.

use std::fmt;

use axum::http::{HeaderMap, Method, StatusCode, header};
use bytes::Bytes;

use super::Link;

/// Longest header value or query fragment the engine copies out of a
/// request. Longer values are treated as unreadable.
pub const HEADER_COPY_LIMIT: usize = 255;

/// Engine-level connection number, unique across both protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two protocols served on the listening port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain HTTP request/response.
    Http,
    /// Persistent WebSocket data channel.
    Data,
}

/// Request line and headers of an inbound HTTP request, as the engine
/// hands them to the pipeline.
#[derive(Debug, Clone)]
pub struct RawHttpRequest {
    /// Request method.
    pub method: Method,
    /// Request path without the query string.
    pub uri: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Raw `Cookie` header, if present and readable.
    pub cookie: Option<String>,
}

impl RawHttpRequest {
    /// Builds the engine view of a request from its head.
    ///
    /// A `Cookie` header longer than [`HEADER_COPY_LIMIT`] or not valid
    /// ASCII is treated as absent.
    #[must_use]
    pub fn from_parts(method: &Method, uri: &axum::http::Uri, headers: &HeaderMap) -> Self {
        let cookie = headers
            .get(header::COOKIE)
            .filter(|value| value.len() <= HEADER_COPY_LIMIT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Self {
            method: method.clone(),
            uri: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            cookie,
        }
    }

    /// The request URI when this is a POST, i.e. when a body follows.
    #[must_use]
    pub fn post_uri(&self) -> Option<&str> {
        (self.method == Method::POST).then_some(self.uri.as_str())
    }
}

/// Lifecycle events of an HTTP connection.
#[derive(Debug)]
pub enum HttpEvent {
    /// Request head received.
    Request {
        /// Parsed request head.
        request: RawHttpRequest,
        /// Write side of the connection.
        link: Link,
    },
    /// A chunk of the request body.
    Body(Bytes),
    /// The request body has been fully received.
    BodyComplete,
    /// The connection can take more output.
    Writable,
    /// The connection is gone.
    Dropped,
}

/// Lifecycle events of a Data (WebSocket) connection.
#[derive(Debug)]
pub enum DataEvent {
    /// Handshake completed.
    Established {
        /// Write side of the connection.
        link: Link,
    },
    /// One inbound message, text or binary, as raw bytes.
    Receive(Bytes),
    /// The connection can take more output.
    Writable,
    /// The connection is gone.
    Closed,
}

/// Everything the engine reports to the event-processing context.
#[derive(Debug)]
pub enum EngineEvent {
    /// Event on an HTTP connection.
    Http {
        /// Connection the event belongs to.
        conn: ConnectionId,
        /// What happened.
        event: HttpEvent,
    },
    /// Event on a Data connection.
    Data {
        /// Connection the event belongs to.
        conn: ConnectionId,
        /// What happened.
        event: DataEvent,
    },
    /// Every connection of the protocol should be treated as writable.
    WritableAll(Protocol),
    /// Interrupts a pending wait without carrying any work.
    Cancel,
}

/// Output written by the core to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Rendered HTTP status line and headers.
    HttpHeaders(Bytes),
    /// HTTP response body.
    HttpBody(Bytes),
    /// Complete status-only HTTP response.
    HttpStatus {
        /// Status to answer with.
        status: StatusCode,
        /// Optional human-readable body.
        message: Option<String>,
    },
    /// Binary WebSocket message.
    Binary(Bytes),
    /// Terminate the connection.
    Close,
}

impl Frame {
    /// Number of payload bytes carried by the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::HttpHeaders(bytes) | Self::HttpBody(bytes) | Self::Binary(bytes) => bytes.len(),
            Self::HttpStatus { message, .. } => message.as_ref().map_or(0, String::len),
            Self::Close => 0,
        }
    }

    /// Returns `true` if the frame carries no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Uri};

    fn uri(s: &'static str) -> Uri {
        Uri::from_static(s)
    }

    #[test]
    fn from_parts_splits_path_and_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sessionId=12"));
        let raw = RawHttpRequest::from_parts(&Method::GET, &uri("/page?x=1&y=2"), &headers);

        assert_eq!(raw.uri, "/page");
        assert_eq!(raw.query.as_deref(), Some("x=1&y=2"));
        assert_eq!(raw.cookie.as_deref(), Some("sessionId=12"));
        assert!(raw.post_uri().is_none());
    }

    #[test]
    fn overlong_cookie_header_is_ignored() {
        let mut headers = HeaderMap::new();
        let long = format!("a={}", "b".repeat(HEADER_COPY_LIMIT));
        if let Ok(value) = HeaderValue::from_str(&long) {
            headers.insert(header::COOKIE, value);
        }
        let raw = RawHttpRequest::from_parts(&Method::GET, &uri("/"), &headers);
        assert!(raw.cookie.is_none());
    }

    #[test]
    fn post_exposes_post_uri() {
        let raw = RawHttpRequest::from_parts(&Method::POST, &uri("/submit"), &HeaderMap::new());
        assert_eq!(raw.post_uri(), Some("/submit"));
    }

    #[test]
    fn frame_len_counts_payload() {
        assert_eq!(Frame::Binary(Bytes::from_static(b"abc")).len(), 3);
        assert!(Frame::Close.is_empty());
        let status = Frame::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            message: Some("no".to_string()),
        };
        assert_eq!(status.len(), 2);
    }
}

//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type. None of its variants is fatal
//! to the process: construction-time variants are returned to the caller of
//! [`crate::server::WebsocketServer::new`], everything else is confined to a
//! single connection or a single broadcast call.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::engine::ConnectionId;

/// Server-side error enum with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The protocol engine could not be created (runtime or socket setup).
    #[error("failed to start protocol engine: {0}")]
    Engine(#[from] std::io::Error),

    /// TLS certificate or key could not be loaded.
    #[error("tls setup failed: {0}")]
    Tls(String),

    /// Broadcast payload does not fit in a single Data frame.
    #[error(
        "trying to send too much data ({len} > {limit}); chunked messages are expensive and not supported"
    )]
    PayloadTooLarge {
        /// Payload length plus the terminating byte.
        len: usize,
        /// Maximum transmission size of the Data protocol.
        limit: usize,
    },

    /// A write targeted a connection the engine has already torn down.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The request could not be interpreted.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No response was produced for the request.
    #[error("Unknown request")]
    UnknownRequest,
}

impl GatewayError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownRequest => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Config(_) | Self::Engine(_) | Self::Tls(_) | Self::ConnectionClosed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

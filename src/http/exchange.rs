//! HTTP request/response pipeline for one connection.
//!
//! An [`HttpExchange`] turns a request head into a call of the HTTP
//! delegate and writes the answer in two steps: the rendered header when
//! the request is handled, the body on the following writable event. The
//! connection is closed after the body; one response per connection.

use axum::http::StatusCode;
use bytes::Bytes;

use super::cookie::{SESSION_COOKIE, parse_cookies};
use super::header::create_http_header;
use super::query::parse_query;
use super::request::{HttpRequest, HttpResponse};
use crate::domain::SessionId;
use crate::engine::{Frame, Link, RawHttpRequest};
use crate::error::GatewayError;
use crate::server::{ConnectionHandler, Flow, ServerContext};

/// Inbound traffic on an HTTP connection.
#[derive(Debug)]
pub enum HttpInbound {
    /// Request head.
    Request(RawHttpRequest),
    /// Chunk of a POST body.
    Body(Bytes),
    /// The POST body is complete.
    BodyComplete,
}

/// Progress of one exchange.
#[derive(Debug, Default)]
enum ExchangeState {
    #[default]
    AwaitingRequest,
    ReceivingBody {
        post_uri: String,
    },
    HeadersSent {
        response: HttpResponse,
    },
    Done,
}

/// Per-connection HTTP state.
#[derive(Debug, Default)]
pub struct HttpExchange {
    request: Option<HttpRequest>,
    session_id: Option<SessionId>,
    state: ExchangeState,
}

impl HttpExchange {
    /// Creates an exchange waiting for its request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed request, once received.
    #[must_use]
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    /// Session the request was bound to.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    fn handle_request(&mut self, cx: &mut ServerContext, link: &Link, raw: RawHttpRequest) -> Flow {
        if raw.uri.is_empty() {
            let err = GatewayError::BadRequest("empty uri".to_string());
            let _ = link.return_http_status(err.status_code(), None);
            return Flow::Close;
        }

        let cookies = raw.cookie.as_deref().map(parse_cookies).unwrap_or_default();
        let session_id = match cookies
            .get(SESSION_COOKIE)
            .and_then(|value| value.parse::<SessionId>().ok())
        {
            Some(id) => id,
            None => {
                let id = SessionId::random();
                cx.create_session(id);
                id
            }
        };

        let request = HttpRequest::new(parse_query(raw.query.as_deref()), raw.uri.as_str());
        tracing::debug!(
            conn = %link.id(),
            page = %request.page(),
            session_id = %session_id,
            args = request.get_data().len(),
            "http request"
        );
        self.session_id = Some(session_id);

        if let Some(post_uri) = raw.post_uri() {
            self.state = ExchangeState::ReceivingBody {
                post_uri: post_uri.to_owned(),
            };
            self.request = Some(request);
            return Flow::Continue;
        }

        let client_ip = link.peer_simple();
        let Some(response) = cx.delegate_requested_http(&request, &client_ip, session_id) else {
            let err = GatewayError::UnknownRequest;
            let _ = link.return_http_status(err.status_code(), Some(&err.to_string()));
            self.request = Some(request);
            return Flow::Close;
        };
        self.request = Some(request);

        let header = create_http_header(&response, session_id);
        if link.write(Frame::HttpHeaders(Bytes::from(header))).is_err() {
            return Flow::Close;
        }
        self.state = ExchangeState::HeadersSent { response };
        link.callback_on_writable();
        Flow::Continue
    }
}

impl ConnectionHandler for HttpExchange {
    type Inbound = HttpInbound;

    fn on_established(&mut self, _cx: &mut ServerContext, _link: &Link) -> Flow {
        Flow::Continue
    }

    fn on_data(&mut self, cx: &mut ServerContext, link: &Link, inbound: HttpInbound) -> Flow {
        match inbound {
            HttpInbound::Request(raw) => self.handle_request(cx, link, raw),
            HttpInbound::Body(body) => {
                tracing::info!(
                    conn = %link.id(),
                    body = %String::from_utf8_lossy(&body),
                    "HTTP body"
                );
                Flow::Continue
            }
            HttpInbound::BodyComplete => {
                if let ExchangeState::ReceivingBody { post_uri } = &self.state {
                    tracing::debug!(conn = %link.id(), %post_uri, "POST body complete");
                }
                self.state = ExchangeState::Done;
                let _ = link.return_http_status(StatusCode::NO_CONTENT, None);
                Flow::Close
            }
        }
    }

    fn on_writable(&mut self, _cx: &mut ServerContext, link: &Link) -> Flow {
        let ExchangeState::HeadersSent { response } = std::mem::take(&mut self.state) else {
            return Flow::Continue;
        };
        self.state = ExchangeState::Done;

        let mut content = String::with_capacity(response.content().len() + 1);
        content.push_str(response.content());
        content.push('\n');
        if let Err(e) = link.write(Frame::HttpBody(Bytes::from(content))) {
            tracing::debug!(conn = %link.id(), error = %e, "body write failed");
        }
        Flow::Close
    }

    fn on_drop(&mut self, _cx: &mut ServerContext) {
        self.request = None;
        self.state = ExchangeState::Done;
    }
}

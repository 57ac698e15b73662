//! State shared by all connection handlers on the event-processing thread.

use std::fmt;
use std::sync::Arc;

use crate::domain::{
    ClientId, ClientIdAllocator, OutboundBuffer, SessionHandle, SessionId, SessionStore, TxScratch,
};
use crate::http::{HttpRequest, HttpResponse};

/// Application callback rendering an HTTP request.
///
/// Receives the request, the session it belongs to and the peer IP.
/// Returning `None` answers `415 Unknown request`.
pub type HttpRequestDelegate =
    Box<dyn FnMut(&HttpRequest, SessionHandle, &str) -> Option<HttpResponse> + Send>;

/// Application callback receiving Data messages: payload, peer IP and the
/// sending client.
pub type DataReceiveDelegate = Box<dyn FnMut(&str, &str, ClientId) + Send>;

/// Application callback told when a Data client disconnects.
pub type ClientDisconnectDelegate = Box<dyn FnMut(ClientId) + Send>;

/// Everything a [`super::ConnectionHandler`] may touch.
///
/// Owned by the event-processing thread; only the outbound buffer is shared
/// with producer threads.
pub struct ServerContext {
    sessions: SessionStore,
    clients: ClientIdAllocator,
    outbound: Arc<OutboundBuffer>,
    scratch: TxScratch,
    http_delegate: Option<HttpRequestDelegate>,
    data_delegate: Option<DataReceiveDelegate>,
    disconnect_delegate: Option<ClientDisconnectDelegate>,
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("sessions", &self.sessions.len())
            .field("clients_issued", &self.clients.issued())
            .field("outbound", &self.outbound)
            .field("http_delegate", &self.http_delegate.is_some())
            .field("data_delegate", &self.data_delegate.is_some())
            .field("disconnect_delegate", &self.disconnect_delegate.is_some())
            .finish_non_exhaustive()
    }
}

impl ServerContext {
    /// Creates a context with an empty session store.
    #[must_use]
    pub fn new(
        outbound: Arc<OutboundBuffer>,
        http_delegate: Option<HttpRequestDelegate>,
        data_delegate: Option<DataReceiveDelegate>,
    ) -> Self {
        let scratch = TxScratch::new(outbound.max_tx());
        Self {
            sessions: SessionStore::new(),
            clients: ClientIdAllocator::new(),
            outbound,
            scratch,
            http_delegate,
            data_delegate,
            disconnect_delegate: None,
        }
    }

    /// Session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Mutable session store.
    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    /// Shared outbound broadcast buffer.
    #[must_use]
    pub fn outbound(&self) -> &Arc<OutboundBuffer> {
        &self.outbound
    }

    /// Replaces the Data receive delegate.
    pub fn set_data_receive_delegate(&mut self, delegate: Option<DataReceiveDelegate>) {
        self.data_delegate = delegate;
    }

    /// Replaces the client disconnect delegate.
    pub fn set_client_disconnect_delegate(&mut self, delegate: Option<ClientDisconnectDelegate>) {
        self.disconnect_delegate = delegate;
    }

    /// Registers a new session under `id`.
    pub fn create_session(&mut self, id: SessionId) -> SessionHandle {
        self.sessions.create(id)
    }

    /// Numbers a newly established Data client.
    pub fn login_client(&mut self) -> ClientId {
        self.clients.next_id()
    }

    /// Hands `request` to the HTTP delegate together with its session.
    ///
    /// A session id the store does not know is registered on the fly.
    /// Returns `None` if no delegate is set or the delegate declines.
    pub fn delegate_requested_http(
        &mut self,
        request: &HttpRequest,
        client_ip: &str,
        session: SessionId,
    ) -> Option<HttpResponse> {
        let delegate = self.http_delegate.as_mut()?;
        let handle = self.sessions.lookup_or_create(session);
        handle.write().touch();
        delegate(request, handle, client_ip)
    }

    /// Hands a Data message to the receive delegate, if one is set.
    pub fn delegate_received_data(&mut self, message: &str, client_ip: &str, sender: ClientId) {
        if let Some(delegate) = self.data_delegate.as_mut() {
            delegate(message, client_ip, sender);
        }
    }

    /// Tells the disconnect delegate, if one is set, that `client` is gone.
    pub fn notify_client_disconnected(&mut self, client: ClientId) {
        if let Some(delegate) = self.disconnect_delegate.as_mut() {
            delegate(client);
        }
    }

    /// The pending broadcast as it should be written to `client`.
    ///
    /// `None` if nothing is pending or `client` sent it.
    pub fn output_for(&mut self, client: ClientId) -> Option<&[u8]> {
        let len = self.outbound.drain_into(client, &mut self.scratch)?;
        Some(self.scratch.payload(len))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn context() -> ServerContext {
        ServerContext::new(Arc::new(OutboundBuffer::new(64)), None, None)
    }

    #[test]
    fn without_http_delegate_no_response() {
        let mut cx = context();
        let request = HttpRequest::new(Default::default(), "/");
        assert!(cx.delegate_requested_http(&request, "127.0.0.1", SessionId::from_raw(1)).is_none());
    }

    #[test]
    fn http_delegate_sees_session_for_cookie_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let delegate: HttpRequestDelegate = Box::new(move |request, session, ip| {
            if let Ok(mut seen) = sink.lock() {
                seen.push((request.page().to_owned(), session.read().id, ip.to_owned()));
            }
            Some(HttpResponse::new("text/plain", "ok"))
        });
        let mut cx = ServerContext::new(Arc::new(OutboundBuffer::new(64)), Some(delegate), None);

        let request = HttpRequest::new(Default::default(), "/x");
        let response = cx.delegate_requested_http(&request, "10.0.0.1", SessionId::from_raw(4242));
        assert_eq!(response.map(|r| r.content().to_owned()).as_deref(), Some("ok"));
        assert!(cx.sessions().lookup(SessionId::from_raw(4242)).is_some());

        let Ok(seen) = seen.lock() else {
            panic!("lock poisoned");
        };
        assert_eq!(
            seen.as_slice(),
            [("/x".to_string(), SessionId::from_raw(4242), "10.0.0.1".to_string())]
        );
    }

    #[test]
    fn data_delegate_can_be_replaced() {
        let count = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&count);
        let mut cx = context();
        cx.delegate_received_data("dropped", "ip", ClientId::from_raw(1));
        cx.set_data_receive_delegate(Some(Box::new(move |_, _, _| {
            if let Ok(mut n) = sink.lock() {
                *n += 1;
            }
        })));
        cx.delegate_received_data("counted", "ip", ClientId::from_raw(1));
        assert_eq!(count.lock().map(|n| *n).ok(), Some(1));
    }

    #[test]
    fn clients_are_numbered_from_one() {
        let mut cx = context();
        assert_eq!(cx.login_client(), ClientId::from_raw(1));
        assert_eq!(cx.login_client(), ClientId::from_raw(2));
    }

    #[test]
    fn output_respects_exclusion() {
        let mut cx = context();
        assert!(cx.output_for(ClientId::from_raw(1)).is_none());
        assert!(cx.outbound().stage(b"data", Some(ClientId::from_raw(1))).is_ok());
        assert!(cx.output_for(ClientId::from_raw(1)).is_none());
        assert_eq!(cx.output_for(ClientId::from_raw(2)), Some(b"data".as_slice()));
    }
}

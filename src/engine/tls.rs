//! TLS termination for the listening socket.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use crate::config::TlsConfig;
use crate::error::GatewayError;

/// Upper bound on one TLS handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed `accept` so that descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Loads the certificate chain and private key named by `tls`.
///
/// # Errors
///
/// Returns [`GatewayError::Tls`] if either file cannot be read or parsed,
/// or if the key does not match the certificate.
pub fn load_server_config(tls: &TlsConfig) -> Result<ServerConfig, GatewayError> {
    let cert_pem = std::fs::read(&tls.cert_path).map_err(|e| {
        GatewayError::Tls(format!(
            "failed to read cert '{}': {e}",
            tls.cert_path.display()
        ))
    })?;
    let key_pem = std::fs::read(&tls.key_path).map_err(|e| {
        GatewayError::Tls(format!(
            "failed to read key '{}': {e}",
            tls.key_path.display()
        ))
    })?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::Tls(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(GatewayError::Tls("no certificate found".to_string()));
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(|e| GatewayError::Tls(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| GatewayError::Tls("no private key found".to_string()))?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| GatewayError::Tls(format!("unsupported protocol versions: {e}")))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| GatewayError::Tls(format!("invalid TLS config: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}

/// Finished handshakes waiting for the server to pick them up.
const HANDSHAKE_BACKLOG: usize = 128;

/// TCP listener that hands out streams once their TLS handshake completes.
///
/// A background task accepts TCP connections and runs every handshake in
/// its own task, so a peer that never finishes its handshake holds up only
/// itself.
pub struct TlsListener {
    ready: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    local_addr: SocketAddr,
    acceptor_task: JoinHandle<()>,
}

impl fmt::Debug for TlsListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsListener")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl TlsListener {
    /// Wraps a bound listener and starts accepting on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the listener's local address is unavailable.
    pub fn new(inner: TcpListener, config: ServerConfig) -> std::io::Result<Self> {
        let local_addr = inner.local_addr()?;
        let acceptor = TlsAcceptor::from(Arc::new(config));
        let (ready_tx, ready) = mpsc::channel(HANDSHAKE_BACKLOG);
        let acceptor_task = tokio::spawn(accept_loop(inner, acceptor, ready_tx));
        Ok(Self {
            ready,
            local_addr,
            acceptor_task,
        })
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        self.acceptor_task.abort();
    }
}

async fn accept_loop(
    inner: TcpListener,
    acceptor: TlsAcceptor,
    ready: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    loop {
        let (stream, addr) = match inner.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        if ready.is_closed() {
            break;
        }
        let acceptor = acceptor.clone();
        let ready = ready.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => {
                    let _ = ready.send((tls_stream, addr)).await;
                }
                Ok(Err(e)) => tracing::warn!(%addr, error = %e, "TLS handshake failed"),
                Err(_) => tracing::warn!(%addr, "TLS handshake timed out"),
            }
        });
    }
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.ready.recv().await {
            Some(accepted) => accepted,
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

//! End-to-end tests over TLS, using the self-signed fixture in
//! `tests/fixtures`.

#![allow(clippy::panic)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::Message;

use ui_gateway::config::GatewayConfig;
use ui_gateway::http::HttpResponse;
use ui_gateway::server::{Broadcaster, HttpRequestDelegate, WebsocketServer};

const CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/localhost.crt");
const KEY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/localhost.key");

struct TlsServer {
    addr: SocketAddr,
    broadcaster: Broadcaster,
    messages: Arc<Mutex<Vec<String>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TlsServer {
    fn start() -> Self {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let thread = {
            let messages = Arc::clone(&messages);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let config = GatewayConfig::new(0)
                    .with_bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
                    .with_service_timeout(Duration::from_millis(20))
                    .with_tls(CERT, KEY);
                let http: HttpRequestDelegate = Box::new(|request, _session, _ip| {
                    (request.page() == "/page").then(|| HttpResponse::new("text/plain", "secure"))
                });
                let mut server = match WebsocketServer::new(config, Some(http), None) {
                    Ok(server) => server,
                    Err(e) => panic!("tls server failed to start: {e}"),
                };
                server.set_data_receive_delegate(Some(Box::new(move |message, _ip, _sender| {
                    messages.lock().push(message.to_owned());
                })));

                let _ = ready_tx.send((server.local_addr(), server.broadcaster()));
                while !stop.load(Ordering::Relaxed) {
                    server.step();
                }
            })
        };

        let Ok((addr, broadcaster)) = ready_rx.recv_timeout(Duration::from_secs(10)) else {
            panic!("tls server did not come up");
        };
        Self {
            addr,
            broadcaster,
            messages,
            stop,
            thread: Some(thread),
        }
    }
}

impl Drop for TlsServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Accepts the self-signed fixture; signatures are still checked.
#[derive(Debug)]
struct TrustFixture(Arc<CryptoProvider>);

impl ServerCertVerifier for TrustFixture {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn connector() -> TlsConnector {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let Ok(builder) =
        ClientConfig::builder_with_provider(Arc::clone(&provider)).with_safe_default_protocol_versions()
    else {
        panic!("protocol versions");
    };
    let config = builder
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(TrustFixture(provider)))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

fn https_client() -> reqwest::Client {
    let Ok(client) = reqwest::Client::builder()
        .tls_danger_accept_invalid_certs(true)
        .build()
    else {
        panic!("https client");
    };
    client
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn https_request_is_served() {
    let server = TlsServer::start();
    let url = format!("https://localhost:{}/page?x=1", server.addr.port());
    let Ok(response) = https_client().get(url).send().await else {
        panic!("https request failed");
    };
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("set-cookie"));
    let Ok(body) = response.text().await else {
        panic!("body unreadable");
    };
    assert_eq!(body, "secure\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wss_client_sends_and_receives() {
    let server = TlsServer::start();
    let Ok(tcp) = TcpStream::connect(server.addr).await else {
        panic!("tcp connect failed");
    };
    let Ok(name) = ServerName::try_from("localhost") else {
        panic!("server name");
    };
    let Ok(tls) = connector().connect(name, tcp).await else {
        panic!("tls handshake failed");
    };
    let Ok((mut ws, _response)) = client_async("wss://localhost/", tls).await else {
        panic!("websocket upgrade failed");
    };

    let Ok(()) = ws.send(Message::text("over tls")).await else {
        panic!("send failed");
    };
    wait_until(|| server.messages.lock().iter().any(|m| m == "over tls")).await;

    assert!(server.broadcaster.send_to_all("secured").is_ok());
    let next = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Binary(data) = msg {
                return Some(data);
            }
        }
        None
    })
    .await;
    let Ok(Some(data)) = next else {
        panic!("no broadcast received");
    };
    assert_eq!(data.as_ref(), b"secured");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_handshake_does_not_block_other_clients() {
    let server = TlsServer::start();
    let Ok(idle) = TcpStream::connect(server.addr).await else {
        panic!("tcp connect failed");
    };

    let url = format!("https://localhost:{}/page", server.addr.port());
    let request = https_client().get(url).send();
    let Ok(Ok(response)) = tokio::time::timeout(Duration::from_secs(3), request).await else {
        panic!("handshake stalled behind an idle peer");
    };
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    drop(idle);
}

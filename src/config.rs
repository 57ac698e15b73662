//! Gateway configuration.
//!
//! A [`GatewayConfig`] can be built in code (`GatewayConfig::new(port)`) or
//! loaded 12-factor style from environment variables (or a `.env` file via
//! `dotenvy`) with [`GatewayConfig::from_env`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::GatewayError;

/// Maximum size of one outbound frame on the Data protocol, in bytes.
///
/// A broadcast payload is accepted only if `len + 1` fits in this limit.
pub const DATA_TX_PACKET_SIZE: usize = 65_536;

/// Bytes reserved in front of the payload in the transmission scratch buffer.
pub const FRAME_PRE_PADDING: usize = 16;

/// Default time slice for one [`crate::server::WebsocketServer::step`] call.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Paths to the PEM certificate chain and private key used for TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM file holding the certificate chain.
    pub cert_path: PathBuf,
    /// PEM file holding the private key.
    pub key_path: PathBuf,
}

/// Top-level gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on. `0` binds an ephemeral port.
    pub port: u16,

    /// Interface to bind to.
    pub bind_ip: IpAddr,

    /// TLS material. `None` serves plain HTTP / WS.
    pub tls: Option<TlsConfig>,

    /// Longest a single `step` waits for socket events.
    pub service_timeout: Duration,

    /// Evict sessions idle for longer than this. `None` keeps every session
    /// for the lifetime of the process.
    pub session_idle_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Creates a plain (non-TLS) configuration listening on all interfaces.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            tls: None,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            session_idle_timeout: None,
        }
    }

    /// Enables TLS when both paths are non-empty; otherwise TLS stays off.
    #[must_use]
    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        let cert_path = cert_path.into();
        let key_path = key_path.into();
        self.tls = if cert_path.as_os_str().is_empty() || key_path.as_os_str().is_empty() {
            None
        } else {
            Some(TlsConfig {
                cert_path,
                key_path,
            })
        };
        self
    }

    /// Sets the interface to bind to.
    #[must_use]
    pub fn with_bind_ip(mut self, bind_ip: IpAddr) -> Self {
        self.bind_ip = bind_ip;
        self
    }

    /// Sets the per-step service timeout.
    #[must_use]
    pub fn with_service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    /// Sets the idle-session eviction timeout.
    #[must_use]
    pub fn with_session_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    /// Socket address the engine binds to.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// Recognised keys: `PORT` (required), `BIND_ADDR`, `TLS_CERT_PATH`,
    /// `TLS_KEY_PATH`, `SERVICE_TIMEOUT_MS`, `SESSION_IDLE_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `PORT` is missing or not a valid
    /// port number, or if `BIND_ADDR` is set but is not an IP address.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .map_err(|_| GatewayError::Config("PORT must be set".to_string()))?
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid PORT: {e}")))?;

        let bind_ip: IpAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid BIND_ADDR: {e}")))?;

        let cert_path = std::env::var("TLS_CERT_PATH").unwrap_or_default();
        let key_path = std::env::var("TLS_KEY_PATH").unwrap_or_default();

        let service_timeout = Duration::from_millis(parse_env("SERVICE_TIMEOUT_MS", 10_000));
        let idle_secs: u64 = parse_env("SESSION_IDLE_TIMEOUT_SECS", 0);
        let session_idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        Ok(Self::new(port)
            .with_bind_ip(bind_ip)
            .with_tls(cert_path, key_path)
            .with_service_timeout(service_timeout)
            .with_session_idle_timeout(session_idle_timeout))
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

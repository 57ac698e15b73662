//! # ui-gateway
//!
//! Combined HTTP and WebSocket front end for a user-interface backend.
//!
//! One listening port serves two protocols: plain HTTP request/response,
//! handed to an application delegate for rendering, and a persistent
//! WebSocket data channel whose messages are relayed to a data delegate.
//! HTTP clients are tied to server-side sessions through a `sessionId`
//! cookie. Data clients are numbered per connection and can be reached
//! through a single-slot broadcast buffer that any thread may fill.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── Protocol engine (engine/): axum + tokio, optional TLS
//!     │       │ EngineEvent channel          ▲ Link frames
//!     │       ▼                              │
//!     ├── WebsocketServer::step (server/)
//!     │       ├── HttpExchange (http/)  ──► HTTP request delegate
//!     │       └── DataConnection (ws/)  ──► data receive delegate
//!     │
//!     ├── SessionStore, ClientIdAllocator (domain/)
//!     └── OutboundBuffer (domain/) ◄── Broadcaster (any thread)
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http;
pub mod server;
pub mod ws;

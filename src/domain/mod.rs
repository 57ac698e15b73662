//! Domain layer: session identity and storage, WebSocket client numbering,
//! and the shared outbound broadcast buffer.

pub mod client_id;
pub mod outbound;
pub mod session;
pub mod session_id;
pub mod session_store;

pub use client_id::{ClientId, ClientIdAllocator};
pub use outbound::{OutboundBuffer, TxScratch};
pub use session::{SessionData, SessionHandle};
pub use session_id::SessionId;
pub use session_store::SessionStore;

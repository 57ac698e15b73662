//! WebSocket layer: the Data protocol relay.
//!
//! Every WebSocket connection on the port speaks the Data protocol. Its
//! state machine lives in [`relay`].

pub mod relay;

pub use relay::{DataConnection, RelayState};

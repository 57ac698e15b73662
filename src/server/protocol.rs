//! Capability interface implemented by per-connection protocol handlers.

use super::context::ServerContext;
use crate::engine::Link;

/// What the connection should do after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the connection open.
    Continue,
    /// Terminate the connection and release its state.
    Close,
}

/// Per-connection state machine driven by engine events.
///
/// All callbacks run on the event-processing thread and must not block.
pub trait ConnectionHandler {
    /// Inbound data delivered by [`ConnectionHandler::on_data`].
    type Inbound;

    /// The connection has been accepted by the engine.
    fn on_established(&mut self, cx: &mut ServerContext, link: &Link) -> Flow;

    /// Inbound data arrived.
    fn on_data(&mut self, cx: &mut ServerContext, link: &Link, inbound: Self::Inbound) -> Flow;

    /// The connection can take more output.
    fn on_writable(&mut self, cx: &mut ServerContext, link: &Link) -> Flow;

    /// The connection is being released. Called exactly once.
    fn on_drop(&mut self, cx: &mut ServerContext);
}

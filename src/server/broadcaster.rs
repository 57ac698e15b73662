//! Thread-safe broadcast handle for producer threads.

use std::sync::Arc;

use crate::domain::{ClientId, OutboundBuffer};
use crate::engine::{EngineHandle, Protocol};
use crate::error::GatewayError;

/// Stages broadcasts from any thread and wakes the event loop.
///
/// Only the most recent broadcast is kept. A payload staged before the
/// event loop has drained the previous one replaces it.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    outbound: Arc<OutboundBuffer>,
    engine: EngineHandle,
}

impl Broadcaster {
    pub(crate) fn new(outbound: Arc<OutboundBuffer>, engine: EngineHandle) -> Self {
        Self { outbound, engine }
    }

    /// Sends `data` to every connected Data client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PayloadTooLarge`] if `data` does not fit in
    /// one frame. The previously staged broadcast is kept.
    pub fn send_to_all(&self, data: impl AsRef<[u8]>) -> Result<(), GatewayError> {
        self.broadcast(data.as_ref(), None)
    }

    /// Sends `data` to every connected Data client except `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PayloadTooLarge`] if `data` does not fit in
    /// one frame. The previously staged broadcast is kept.
    pub fn send_to_all_others(
        &self,
        data: impl AsRef<[u8]>,
        sender: ClientId,
    ) -> Result<(), GatewayError> {
        self.broadcast(data.as_ref(), Some(sender))
    }

    fn broadcast(&self, data: &[u8], excluded: Option<ClientId>) -> Result<(), GatewayError> {
        if let Err(e) = self.outbound.stage(data, excluded) {
            tracing::warn!(error = %e, "broadcast rejected");
            return Err(e);
        }
        tracing::trace!(len = data.len(), excluded = ?excluded, "broadcast staged");
        self.engine.cancel_service();
        self.engine.callback_on_writable_all(Protocol::Data);
        Ok(())
    }
}

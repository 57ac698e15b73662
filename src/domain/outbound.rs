//! Single-slot outbound broadcast buffer.
//!
//! [`OutboundBuffer`] holds the one payload that is pending for all Data
//! connections together with the client that must not receive it. It is a
//! mailbox, not a queue: staging a new payload replaces the previous one.
//! Producer threads stage payloads, the event-processing context copies the
//! payload out once per writable connection. The lock is held only for the
//! copy in and the copy out.

use bytes::Bytes;
use parking_lot::Mutex;

use super::ClientId;
use crate::config::FRAME_PRE_PADDING;
use crate::error::GatewayError;

/// The pending broadcast and its excluded sender.
#[derive(Debug, Default)]
struct BroadcastRecord {
    payload: Option<Bytes>,
    excluded: Option<ClientId>,
}

/// Lock-guarded broadcast mailbox shared between producers and the relay.
#[derive(Debug)]
pub struct OutboundBuffer {
    record: Mutex<BroadcastRecord>,
    max_tx: usize,
}

impl OutboundBuffer {
    /// Creates an empty buffer for frames of at most `max_tx` bytes.
    #[must_use]
    pub fn new(max_tx: usize) -> Self {
        Self {
            record: Mutex::new(BroadcastRecord::default()),
            max_tx,
        }
    }

    /// Maximum transmission size this buffer enforces.
    #[must_use]
    pub const fn max_tx(&self) -> usize {
        self.max_tx
    }

    /// Replaces the pending broadcast.
    ///
    /// `excluded` names the client that must not receive the payload;
    /// `None` sends to every client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PayloadTooLarge`] if `payload.len() + 1`
    /// exceeds the maximum transmission size. The pending record is left
    /// untouched in that case.
    pub fn stage(&self, payload: &[u8], excluded: Option<ClientId>) -> Result<(), GatewayError> {
        let len = payload.len().saturating_add(1);
        if len > self.max_tx {
            return Err(GatewayError::PayloadTooLarge {
                len,
                limit: self.max_tx,
            });
        }

        let payload = Bytes::copy_from_slice(payload);
        let mut record = self.record.lock();
        record.payload = Some(payload);
        record.excluded = excluded;
        Ok(())
    }

    /// Copies the pending payload into `scratch` on behalf of `client`.
    ///
    /// Returns the payload length, or `None` if nothing has been staged yet
    /// or `client` is the excluded sender. The record is not consumed.
    pub fn drain_into(&self, client: ClientId, scratch: &mut TxScratch) -> Option<usize> {
        let record = self.record.lock();
        if record.excluded == Some(client) {
            return None;
        }
        let payload = record.payload.as_ref()?;
        scratch.load(payload)
    }

    /// Client excluded from the pending broadcast.
    #[must_use]
    pub fn excluded(&self) -> Option<ClientId> {
        self.record.lock().excluded
    }
}

/// Fixed-size transmission buffer with reserved space in front of the
/// payload.
#[derive(Debug)]
pub struct TxScratch {
    buf: Vec<u8>,
}

impl TxScratch {
    /// Allocates `FRAME_PRE_PADDING + max_tx` bytes.
    #[must_use]
    pub fn new(max_tx: usize) -> Self {
        Self {
            buf: vec![0; FRAME_PRE_PADDING + max_tx],
        }
    }

    /// Copies `payload` behind the padding. Returns `None` if it does not fit.
    fn load(&mut self, payload: &[u8]) -> Option<usize> {
        let end = FRAME_PRE_PADDING.checked_add(payload.len())?;
        let slot = self.buf.get_mut(FRAME_PRE_PADDING..end)?;
        slot.copy_from_slice(payload);
        Some(payload.len())
    }

    /// The first `len` payload bytes.
    #[must_use]
    pub fn payload(&self, len: usize) -> &[u8] {
        FRAME_PRE_PADDING
            .checked_add(len)
            .and_then(|end| self.buf.get(FRAME_PRE_PADDING..end))
            .unwrap_or_default()
    }

    /// The whole buffer, padding included.
    #[must_use]
    pub fn as_padded(&self) -> &[u8] {
        &self.buf
    }
}

//! Thread-safe handle used by producers to poke the event loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::event::{EngineEvent, Protocol};

/// Per-protocol "writable requested" flags.
///
/// A set flag means a `WritableAll` event is queued and not yet taken by
/// `service`; further requests merge into it.
#[derive(Debug, Default)]
struct WritablePending {
    http: AtomicBool,
    data: AtomicBool,
}

impl WritablePending {
    fn flag(&self, protocol: Protocol) -> &AtomicBool {
        match protocol {
            Protocol::Http => &self.http,
            Protocol::Data => &self.data,
        }
    }
}

/// Cloneable, `Send` handle to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    pending: Arc<WritablePending>,
}

impl EngineHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            events,
            pending: Arc::default(),
        }
    }

    /// Interrupts a `service` call that is waiting for socket events.
    pub fn cancel_service(&self) {
        self.send(EngineEvent::Cancel);
    }

    /// Schedules a writable event for every connection of `protocol`.
    ///
    /// Requests made before the pending one is serviced are merged, so each
    /// connection gets one writable callback per service pass.
    pub fn callback_on_writable_all(&self, protocol: Protocol) {
        if self.pending.flag(protocol).swap(true, Ordering::AcqRel) {
            return;
        }
        self.send(EngineEvent::WritableAll(protocol));
    }

    /// Marks `event` as taken off the queue. Must be called before the
    /// event is dispatched.
    pub(crate) fn acknowledge(&self, event: &EngineEvent) {
        if let EngineEvent::WritableAll(protocol) = event {
            self.pending.flag(*protocol).store(false, Ordering::Release);
        }
    }

    /// Returns `true` once the engine has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn send(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("engine is gone; event dropped");
        }
    }
}

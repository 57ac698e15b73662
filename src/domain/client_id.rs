//! WebSocket client identifiers.
//!
//! Every Data connection is numbered by a [`ClientIdAllocator`] when it is
//! established. Numbers start at 1 and grow by one per connection. The
//! allocator is owned by the event-processing context, so it needs no
//! synchronization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process-unique number of a Data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u32);

impl ClientId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential source of [`ClientId`]s.
#[derive(Debug, Default)]
pub struct ClientIdAllocator {
    last: u32,
}

impl ClientIdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    ///
    /// After `u32::MAX` connections the sequence restarts at 1; 0 is never
    /// handed out.
    pub fn next_id(&mut self) -> ClientId {
        self.last = self.last.wrapping_add(1).max(1);
        ClientId(self.last)
    }

    /// Number of ids handed out so far (modulo wrap-around).
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_increments() {
        let mut alloc = ClientIdAllocator::new();
        assert_eq!(alloc.issued(), 0);
        assert_eq!(alloc.next_id(), ClientId::from_raw(1));
        assert_eq!(alloc.next_id(), ClientId::from_raw(2));
        assert_eq!(alloc.next_id(), ClientId::from_raw(3));
        assert_eq!(alloc.issued(), 3);
    }

    #[test]
    fn wraps_without_handing_out_zero() {
        let mut alloc = ClientIdAllocator { last: u32::MAX };
        assert_eq!(alloc.next_id(), ClientId::from_raw(1));
    }

    #[test]
    fn display_is_decimal() {
        assert_eq!(ClientId::from_raw(17).to_string(), "17");
    }
}

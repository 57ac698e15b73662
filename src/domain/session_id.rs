//! Type-safe HTTP session identifier.
//!
//! [`SessionId`] is a newtype around `u16` so that session ids cannot be
//! confused with WebSocket [`super::ClientId`]s, which live in an unrelated
//! number space.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of an HTTP session, carried in the `sessionId` cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u16);

impl SessionId {
    /// Draws a fresh id uniformly from the full 16-bit range.
    ///
    /// Uses the thread-local CSPRNG, which is seeded from the operating
    /// system. No collision check is made against existing sessions.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u16>())
    }

    /// Wraps a raw id.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u16>().map(Self)
    }
}

impl From<u16> for SessionId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

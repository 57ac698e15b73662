//! Per-session application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::SessionId;

/// Shared handle to a session.
///
/// The store keeps one clone, the HTTP request delegate receives another;
/// both observe the same state.
pub type SessionHandle = Arc<RwLock<SessionData>>;

/// State attached to one HTTP session.
///
/// The gateway itself only maintains the id and the timestamps. `values`
/// is an opaque key/value map owned by the application.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// Session identifier (immutable after creation).
    pub id: SessionId,

    /// When the session was registered.
    pub created_at: DateTime<Utc>,

    /// Last time a request was served for this session.
    pub last_seen: DateTime<Utc>,

    /// Application-defined session values.
    pub values: Map<String, Value>,
}

impl SessionData {
    /// Creates an empty session with both timestamps set to now.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_seen: now,
            values: Map::new(),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Removes the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Marks the session as used now.
    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

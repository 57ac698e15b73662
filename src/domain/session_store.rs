//! Session storage keyed by [`SessionId`].
//!
//! [`SessionStore`] is owned by the event-processing context and is never
//! touched from any other thread, so it carries no lock of its own. Only the
//! per-session [`SessionData`] sits behind a lock, because its handle is
//! handed to the application.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use super::SessionId;
use super::session::{SessionData, SessionHandle};

/// Map from session id to shared session state.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, SessionHandle>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh session under `id`, replacing any existing entry.
    pub fn create(&mut self, id: SessionId) -> SessionHandle {
        let handle = Arc::new(RwLock::new(SessionData::new(id)));
        if self.sessions.insert(id, Arc::clone(&handle)).is_some() {
            tracing::debug!(session_id = %id, "session replaced");
        } else {
            tracing::debug!(session_id = %id, "session created");
        }
        handle
    }

    /// Returns the session registered under `id`.
    #[must_use]
    pub fn lookup(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).cloned()
    }

    /// Returns the session under `id`, creating it if the store does not
    /// know it (e.g. a cookie issued before a restart).
    pub fn lookup_or_create(&mut self, id: SessionId) -> SessionHandle {
        match self.lookup(id) {
            Some(handle) => handle,
            None => self.create(id),
        }
    }

    /// Drops every session whose `last_seen` is older than `max_idle`.
    ///
    /// Returns the number of evicted sessions.
    pub fn evict_idle(&mut self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, handle| now.signed_duration_since(handle.read().last_seen) <= max_idle);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    /// Returns the number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if the store holds no session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn create_then_lookup_shares_state() {
        let mut store = SessionStore::new();
        let id = SessionId::from_raw(4242);
        let created = store.create(id);
        created.write().insert("count", Value::from(1));

        let Some(found) = store.lookup(id) else {
            panic!("session should exist");
        };
        assert_eq!(found.read().id, id);
        assert_eq!(found.read().get("count"), Some(&Value::from(1)));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        let store = SessionStore::new();
        assert!(store.lookup(SessionId::from_raw(1)).is_none());
    }

    #[test]
    fn create_overwrites_existing_entry() {
        let mut store = SessionStore::new();
        let id = SessionId::from_raw(9);
        store.create(id).write().insert("k", Value::from("old"));
        store.create(id);

        assert_eq!(store.len(), 1);
        let Some(found) = store.lookup(id) else {
            panic!("session should exist");
        };
        assert!(found.read().get("k").is_none());
    }

    #[test]
    fn lookup_or_create_keeps_existing() {
        let mut store = SessionStore::new();
        let id = SessionId::from_raw(5);
        store.create(id).write().insert("k", Value::from(true));

        let handle = store.lookup_or_create(id);
        assert_eq!(handle.read().get("k"), Some(&Value::from(true)));

        let fresh = store.lookup_or_create(SessionId::from_raw(6));
        assert_eq!(fresh.read().id, SessionId::from_raw(6));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn evict_idle_removes_only_stale_sessions() {
        let mut store = SessionStore::new();
        let stale = store.create(SessionId::from_raw(1));
        store.create(SessionId::from_raw(2));
        stale.write().last_seen = Utc::now() - chrono::Duration::seconds(120);

        let evicted = store.evict_idle(Duration::from_secs(60));
        assert_eq!(evicted, 1);
        assert!(store.lookup(SessionId::from_raw(1)).is_none());
        assert!(store.lookup(SessionId::from_raw(2)).is_some());
    }

    #[test]
    fn empty_store() {
        let mut store = SessionStore::new();
        assert!(store.is_empty());
        assert_eq!(store.evict_idle(Duration::from_secs(1)), 0);
    }
}

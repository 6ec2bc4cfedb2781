//! Conversation store and session lock manager
//!
//! The store maps a session identifier to its ordered message history and
//! the model identity that produced it. The lock manager guarantees at most
//! one in-flight exchange per session identifier; waiters behind the same
//! holder are woken one at a time in FIFO order (tokio's mutex is fair), so
//! a release never lets two queued exchanges run the same session at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::agent::gemini::Content;

/// One session's transcript plus the model that produced it
#[derive(Debug, Clone)]
pub struct SessionHistory {
    /// Ordered transcript, exactly as resent to the model every turn
    pub contents: Vec<Content>,
    /// Model identity that produced the most recent turn
    pub model: String,
}

/// Process-wide map of session transcripts.
///
/// Only the orchestrator mutates this, and only while holding the
/// corresponding session lock.
#[derive(Default)]
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, SessionHistory>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session's history. Absent session means a fresh
    /// conversation, not an error.
    pub fn get(&self, session_id: &str) -> Option<SessionHistory> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .get(session_id)
            .cloned()
    }

    /// Replace a session's history after a successful exchange.
    pub fn put(&self, session_id: &str, history: SessionHistory) {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(session_id.to_string(), history);
    }

    /// Drop a session entirely.
    pub fn clear(&self, session_id: &str) {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .remove(session_id);
    }

    /// Number of sessions with stored history.
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().expect("session map poisoned").len()
    }
}

/// Per-session mutual exclusion.
///
/// `acquire` suspends until no other holder is registered for the same
/// session id, then returns a guard that releases on drop, on every exit
/// path, success or failure. Unrelated sessions never contend. A lock
/// entry lives only while some exchange holds or awaits it; the last
/// guard to drop removes the entry from the map.
#[derive(Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Holder of one session's lock. Dropping releases the lock and prunes
/// the map entry when no other holder or waiter references it.
pub struct SessionGuard {
    session_id: String,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Release the mutex before inspecting the map, so a queued waiter
        // holding an Arc clone keeps the entry alive
        self.guard.take();
        let mut locks = self.locks.lock().expect("lock map poisoned");
        if let Some(lock) = locks.get(&self.session_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.session_id);
            }
        }
    }
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: &str) -> SessionGuard {
        let lock = {
            let mut locks = self.locks.lock().expect("lock map poisoned");
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        SessionGuard {
            session_id: session_id.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of sessions with an in-flight or queued exchange.
    pub fn active_locks(&self) -> usize {
        self.locks.lock().expect("lock map poisoned").len()
    }
}

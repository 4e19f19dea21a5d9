//! Conversation memory, keyed by session.
//!
//! The pipeline never holds history itself: it reads a session's turns
//! through [`MemoryStore`] before answering and appends the new turn
//! afterwards. [`SessionLocks`] serializes requests within a session so
//! that read and append cannot interleave.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::core::Turn;
use crate::error::MemoryError;

/// Sessions kept by [`InMemoryStore::new`] before the stalest is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Storage for per-session conversation history.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Turns recorded for `session_id`, oldest first.
    async fn get(&self, session_id: &str) -> Result<Vec<Turn>, MemoryError>;

    /// Records a completed turn.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<(), MemoryError>;

    /// Forgets everything recorded for `session_id`.
    async fn clear(&self, session_id: &str) -> Result<(), MemoryError>;
}

#[derive(Debug, Default)]
struct Session {
    turns: VecDeque<Turn>,
    touched: u64,
}

/// Process-local memory store.
///
/// Holds at most `retention` turns per session and at most `max_sessions`
/// sessions; a new session beyond that evicts the one appended to least
/// recently.
#[derive(Debug)]
pub struct InMemoryStore {
    sessions: DashMap<String, Session>,
    retention: usize,
    max_sessions: usize,
    clock: AtomicU64,
}

impl InMemoryStore {
    /// Creates a store keeping at most `retention` turns per session.
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            retention: retention.max(1),
            max_sessions: DEFAULT_MAX_SESSIONS,
            clock: AtomicU64::new(0),
        }
    }

    /// Caps the number of sessions held at once.
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Number of sessions with recorded history.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn evict_stalest(&self) {
        let stalest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().touched)
            .map(|entry| entry.key().clone());
        if let Some(session_id) = stalest {
            debug!(session_id, "session limit reached, evicting stalest session");
            self.sessions.remove(&session_id);
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, session_id: &str) -> Result<Vec<Turn>, MemoryError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|session| session.turns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<(), MemoryError> {
        if !self.sessions.contains_key(session_id) {
            while self.sessions.len() >= self.max_sessions {
                self.evict_stalest();
            }
        }
        let touched = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut session = self.sessions.entry(session_id.to_string()).or_default();
        session.touched = touched;
        session.turns.push_back(turn);
        while session.turns.len() > self.retention {
            session.turns.pop_front();
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), MemoryError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

/// One async mutex per session id.
///
/// An entry lives only while some request holds or waits for it.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other request holds `session_id`, then holds it
    /// until the returned guard is dropped.
    pub async fn acquire(&self, session_id: &str) -> SessionGuard<'_> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        SessionGuard {
            locks: &self.locks,
            session_id: session_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Sessions currently held or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// `true` when no session is held or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive hold on one session.
///
/// Dropping it releases the session and removes its table entry once no
/// other request references it.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // waiters clone the Arc under the same shard lock, so a count of one
        // means nobody else can reach this entry
        self.locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

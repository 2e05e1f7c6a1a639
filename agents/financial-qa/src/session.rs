//! Session state held by the caller
//!
//! Maps session ids to their lifecycle record and exchange history. The
//! orchestrator never reads this; the HTTP API and the interactive CLI use it
//! to supply conversation history and to make session end idempotent.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::contracts::{Exchange, Session, SessionId, SessionStatus};
use crate::error::{QaError, Result};

#[derive(Debug, Clone)]
struct SessionEntry {
    session: Session,
    history: Vec<Exchange>,
}

/// Registry of sessions known to this process.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave an entry half-written.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a session. Returns `false` if the id was already known.
    pub fn open(&self, id: SessionId) -> bool {
        let mut sessions = self.write();
        if sessions.contains_key(&id) {
            return false;
        }
        sessions.insert(
            id,
            SessionEntry {
                session: Session::new(id),
                history: Vec::new(),
            },
        );
        true
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.read().get(&id).map(|entry| entry.session.clone())
    }

    pub fn status(&self, id: SessionId) -> Option<SessionStatus> {
        self.read().get(&id).map(|entry| entry.session.status())
    }

    /// Exchanges recorded for a session, oldest first. Empty for unknown ids.
    pub fn history(&self, id: SessionId) -> Vec<Exchange> {
        self.read()
            .get(&id)
            .map(|entry| entry.history.clone())
            .unwrap_or_default()
    }

    /// Record an exchange on an active session.
    pub fn append(&self, id: SessionId, exchange: Exchange) -> Result<()> {
        let mut sessions = self.write();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| QaError::invalid_input(format!("Unknown session {}", id)))?;

        if entry.session.status() == SessionStatus::Ended {
            return Err(QaError::invalid_input(format!("Session {} has ended", id)));
        }
        entry.history.push(exchange);
        Ok(())
    }

    /// Mark a session ended.
    ///
    /// Returns `Ok(true)` on the first call and `Ok(false)` when the session
    /// had already ended. Unknown ids are rejected.
    pub fn end(&self, id: SessionId, summary: Option<String>) -> Result<bool> {
        let mut sessions = self.write();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| QaError::invalid_input(format!("Unknown session {}", id)))?;

        if entry.session.status() == SessionStatus::Ended {
            return Ok(false);
        }
        entry.session.ended_at = Some(Utc::now());
        entry.session.summary = summary;
        Ok(true)
    }

    pub fn active_count(&self) -> usize {
        self.read()
            .values()
            .filter(|entry| entry.session.status() == SessionStatus::Active)
            .count()
    }

    pub fn remove(&self, id: SessionId) -> Option<Session> {
        self.write().remove(&id).map(|entry| entry.session)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

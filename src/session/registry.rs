//! Ordered, capacity-bounded collection of session descriptors.
//!
//! Order is creation order. It drives both the numbering of new sessions and
//! their placement in the grid.

use super::types::{Session, SessionStatus, MAX_SESSIONS};

/// The authoritative list of session descriptors.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

/// Why an insert was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// The pool already holds [`MAX_SESSIONS`] sessions
    AtCapacity,
    DuplicateId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether another session fits in the pool.
    pub fn can_create(&self) -> bool {
        self.sessions.len() < MAX_SESSIONS
    }

    /// Display name for the next session with base label `base`.
    ///
    /// Numbering follows the current pool size, not a global counter, so
    /// closing "Zsh 2" of three and creating again yields another "Zsh 3".
    pub fn next_name(&self, base: &str) -> String {
        format!("{} {}", base, self.sessions.len() + 1)
    }

    /// Append a host-issued session under `base`'s next display name.
    ///
    /// Leaves the registry untouched when full or when the id is already
    /// present.
    pub fn admit(&mut self, mut session: Session, base: &str) -> Result<&Session, InsertError> {
        session.name = self.next_name(base);
        self.insert(session)
    }

    /// Append a session keeping its name as-is (used when restoring).
    pub fn insert(&mut self, session: Session) -> Result<&Session, InsertError> {
        if !self.can_create() {
            return Err(InsertError::AtCapacity);
        }
        if self.contains(&session.id) {
            return Err(InsertError::DuplicateId);
        }
        self.sessions.push(session);
        Ok(&self.sessions[self.sessions.len() - 1])
    }

    /// Remove a descriptor, returning it if it existed.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(index))
    }

    /// Record that a session's process exited. The descriptor stays so the
    /// final output can be inspected until the user closes it.
    ///
    /// Returns false for unknown ids.
    pub fn mark_exited(&mut self, id: &str, exit_code: Option<i32>) -> bool {
        self.set_status(id, SessionStatus::Exited, exit_code)
    }

    /// Record that the host lost the process.
    pub fn mark_failed(&mut self, id: &str) -> bool {
        self.set_status(id, SessionStatus::Error, None)
    }

    fn set_status(&mut self, id: &str, status: SessionStatus, exit_code: Option<i32>) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == id) {
            Some(session) => {
                session.status = status;
                if exit_code.is_some() {
                    session.exit_code = exit_code;
                }
                true
            }
            None => false,
        }
    }

    /// Drop every descriptor, returning them in order.
    pub fn drain(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.sessions)
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

//! Typed errors for the session orchestrator.
//!
//! Callers at the crate boundary match on these instead of opaque `anyhow`
//! strings. Persistence failures never appear here: a failed save or load
//! degrades to "nothing persisted" inside the persistence controller.

use thiserror::Error;

use crate::session::SessionId;

/// Errors surfaced by [`crate::session::SessionManager`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A create was attempted with the pool already full. Callers are
    /// expected to check `can_create()` first; nothing was spawned.
    #[error("session limit reached ({limit} sessions)")]
    CapacityExceeded {
        /// The pool capacity that was hit.
        limit: usize,
    },

    /// The PTY host refused or failed to start the shell.
    #[error("failed to start '{shell}': {source:#}")]
    CreationFailure {
        /// Shell executable that was requested.
        shell: String,
        /// Underlying host error.
        #[source]
        source: anyhow::Error,
    },

    /// No session with this id is registered.
    #[error("unknown session '{0}'")]
    UnknownSession(SessionId),

    /// A host call other than creation failed (write, resize, close).
    #[error("terminal host error for '{id}': {source:#}")]
    Host {
        /// Session the call targeted.
        id: SessionId,
        /// Underlying host error.
        #[source]
        source: anyhow::Error,
    },
}

/// One saved descriptor that could not be respawned during a restore.
///
/// A restore with failures is partial, never aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    /// Display name of the saved session.
    pub name: String,
    pub shell: String,
    /// Rendered host error.
    pub message: String,
}

impl std::fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not restore '{}' ({}): {}", self.name, self.shell, self.message)
    }
}

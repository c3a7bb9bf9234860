//! Session descriptor types.
//!
//! A descriptor is the registry's view of one shell; the process behind it is
//! owned by the PTY host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host-issued session identifier. Only meaningful for the lifetime of the
/// process that issued it.
pub type SessionId = String;

/// Hard cap on simultaneously live sessions.
pub const MAX_SESSIONS: usize = 12;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    /// The shell exited; the descriptor stays until the user closes it.
    Exited,
    /// The host lost track of the process (wait failed, I/O error).
    Error,
}

/// A registry-owned descriptor for one shell and its backing process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    /// Display label, e.g. "Zsh 2"
    pub name: String,
    /// Executable path of the shell
    pub shell: String,
    pub cwd: Option<String>,
    pub status: SessionStatus,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh, active descriptor.
    pub fn new(id: impl Into<SessionId>, name: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shell: shell.into(),
            cwd: None,
            status: SessionStatus::Active,
            pid: None,
            exit_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_cwd(mut self, cwd: Option<String>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// A request to start a new shell.
///
/// `name` is the base label; the registry appends the pool position
/// ("Zsh" becomes "Zsh 3").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub shell: String,
    pub name: String,
    pub cwd: Option<String>,
}

impl CreateRequest {
    pub fn new(shell: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            name: name.into(),
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_active_without_exit_code() {
        let session = Session::new("t-1", "Zsh 1", "/bin/zsh");
        assert!(session.is_active());
        assert_eq!(session.exit_code, None);
        assert_eq!(session.cwd, None);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Exited).unwrap();
        assert_eq!(json, "\"exited\"");
    }
}

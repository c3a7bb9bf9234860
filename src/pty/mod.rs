//! The process host that owns pseudo-terminal shells.
//!
//! The orchestrator only talks to the host through [`PtyHost`]. Output and
//! exit notifications are pushed from reader threads over an `mpsc` channel
//! handed to `create_terminal`; closing a terminal is what unsubscribes it.

pub mod handler;

use std::sync::mpsc::Sender;

use anyhow::Result;

use crate::session::{Session, SessionId};

pub use handler::NativePtyHost;

/// Default terminal size used before the UI reports a real one.
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;

/// Everything the host needs to start one shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    pub shell: String,
    /// Display label reported back on the session
    pub name: String,
    pub cwd: Option<String>,
    pub rows: u16,
    pub cols: u16,
}

impl TerminalConfig {
    pub fn new(shell: impl Into<String>, name: impl Into<String>, cwd: Option<String>) -> Self {
        Self {
            shell: shell.into(),
            name: name.into(),
            cwd,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }

    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }
}

/// Push notifications from a running terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// Raw bytes read from the PTY.
    Output { id: SessionId, data: Vec<u8> },
    /// The shell exited.
    Exited { id: SessionId, exit_code: Option<i32> },
    /// The host lost the process without a usable exit status.
    Failed { id: SessionId, message: String },
}

/// A process-owning terminal host.
///
/// Calls may block on process spawning or I/O and may fail; every failure is
/// recoverable from the orchestrator's point of view.
pub trait PtyHost: Send + Sync {
    /// Process-wide setup, called once before the first terminal.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Process-wide teardown. Closes whatever is still running.
    fn destroy(&self) {
        if let Err(e) = self.close_all_terminals() {
            log::warn!("terminal host teardown failed: {e:#}");
        }
    }

    /// Spawn a shell. Output and exit are pushed on `events`.
    fn create_terminal(&self, config: &TerminalConfig, events: Sender<PtyEvent>) -> Result<Session>;

    /// Kill the shell and release its PTY.
    fn close_terminal(&self, id: &str) -> Result<()>;

    fn close_all_terminals(&self) -> Result<()>;

    fn write_input(&self, id: &str, data: &[u8]) -> Result<()>;

    fn resize_terminal(&self, id: &str, cols: u16, rows: u16) -> Result<()>;

    /// Descriptors of every terminal the host still owns.
    fn all_sessions(&self) -> Vec<Session>;

    fn session_count(&self) -> usize;

    fn can_create_session(&self) -> bool {
        self.session_count() < crate::session::MAX_SESSIONS
    }
}

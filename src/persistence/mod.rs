//! Per-workspace persistence of session descriptors and scrollback.
//!
//! A workspace record holds what is needed to respawn the same shells later
//! (`name`, `shell`, `cwd`) and the text each display showed at save time.
//! Session ids are not part of the descriptors: they are host handles that
//! mean nothing after a restart. They only survive as scrollback keys (and a
//! parallel `sessionIds` list) so a restore can pair text with the session
//! respawned in its place.

pub mod controller;
pub mod store;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionId};

pub use controller::{PersistenceController, SaveOutcome, SkipReason};
pub use store::{JsonFileStore, MemoryStore, StateStore};

/// What is needed to respawn one shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub name: String,
    pub shell: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl From<&Session> for SavedSession {
    fn from(session: &Session) -> Self {
        Self {
            name: session.name.clone(),
            shell: session.shell.clone(),
            cwd: session.cwd.clone(),
        }
    }
}

/// Ordered descriptors of a workspace at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedWorkspaceState {
    #[serde(default)]
    pub sessions: Vec<SavedSession>,
    pub saved_at: DateTime<Utc>,
}

/// Captured display text keyed by the session id at save time.
pub type ScrollbackMap = HashMap<SessionId, String>;

/// On-disk record for one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub state: SavedWorkspaceState,
    /// Original session id -> scrollback text
    #[serde(default)]
    pub scrollbacks: ScrollbackMap,
    /// Id `state.sessions[i]` had when saved
    #[serde(default)]
    pub session_ids: Vec<SessionId>,
}

impl WorkspaceRecord {
    /// Id the `index`-th saved session had, if the record carries it.
    pub fn original_id(&self, index: usize) -> Option<&SessionId> {
        self.session_ids.get(index)
    }

    /// Scrollback captured for the `index`-th saved session.
    pub fn scrollback_for(&self, index: usize) -> Option<&str> {
        let id = self.original_id(index)?;
        self.scrollbacks.get(id).map(String::as_str)
    }
}

/// A consistent, already-captured view of a workspace, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceSnapshot {
    pub sessions: Vec<SavedSession>,
    /// Id each entry of `sessions` had when captured
    pub ids: Vec<SessionId>,
    pub scrollbacks: ScrollbackMap,
    pub saved_at: DateTime<Utc>,
}

impl WorkspaceSnapshot {
    /// Capture every session in the pool plus its scrollback. Exited and
    /// failed sessions are kept so their last output survives a switch.
    ///
    /// Returns `None` when the pool is empty.
    pub fn capture<'a, I, F>(sessions: I, mut scrollback: F) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Session>,
        F: FnMut(&SessionId) -> Option<String>,
    {
        let live: Vec<&Session> = sessions.into_iter().collect();
        if live.is_empty() {
            return None;
        }

        let mut scrollbacks = ScrollbackMap::new();
        for session in &live {
            if let Some(text) = scrollback(&session.id) {
                scrollbacks.insert(session.id.clone(), text);
            }
        }

        Some(Self {
            sessions: live.iter().map(|s| SavedSession::from(*s)).collect(),
            ids: live.iter().map(|s| s.id.clone()).collect(),
            scrollbacks,
            saved_at: Utc::now(),
        })
    }

    pub fn into_record(self) -> WorkspaceRecord {
        WorkspaceRecord {
            state: SavedWorkspaceState {
                sessions: self.sessions,
                saved_at: self.saved_at,
            },
            scrollbacks: self.scrollbacks,
            session_ids: self.ids,
        }
    }
}

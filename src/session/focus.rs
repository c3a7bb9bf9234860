//! Fullscreen focus: isolating one session out of the grid.

use super::registry::SessionRegistry;
use super::types::{Session, SessionId};

/// Tracks at most one focused session.
#[derive(Debug, Default)]
pub struct FocusController {
    focused: Option<SessionId>,
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focus `id`, or unfocus it if it is already focused.
    pub fn toggle_focus(&mut self, id: &str) {
        if self.is_focused(id) {
            self.focused = None;
        } else {
            self.focused = Some(id.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.focused = None;
    }

    /// Clear focus if it points at `id`. Returns true if focus changed.
    pub fn forget(&mut self, id: &str) -> bool {
        if self.is_focused(id) {
            self.focused = None;
            true
        } else {
            false
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn is_focused(&self, id: &str) -> bool {
        self.focused.as_deref() == Some(id)
    }

    /// The sessions to lay out: everything when unfocused, only the focused
    /// session otherwise.
    pub fn visible_sessions<'a>(&self, registry: &'a SessionRegistry) -> Vec<&'a Session> {
        match self.focused.as_deref() {
            Some(id) => registry.get(id).into_iter().collect(),
            None => registry.sessions().iter().collect(),
        }
    }
}

//! Workspace switching: save the old pool, close it, respawn the new one.
//!
//! A switch runs `Saving -> ClosingAll -> Loading -> Respawning` and always
//! ends back in `Idle`. A restore is best-effort: descriptors that fail to
//! respawn are reported and skipped, the rest come back with their names and
//! scrollback.

use crate::display::Display;
use crate::error::RestoreFailure;
use crate::persistence::SaveOutcome;
use crate::session::{SessionId, SessionManager};

/// Where a switch currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwitchPhase {
    #[default]
    Idle,
    Saving(String),
    ClosingAll,
    Loading(String),
    Respawning,
}

/// What one switch did.
#[derive(Debug, Default)]
pub struct SwitchReport {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Outcome of saving `from`, if there was anything to save
    pub saved: Option<SaveOutcome>,
    /// Sessions closed when leaving `from`
    pub closed: usize,
    /// New ids of respawned sessions, in saved order
    pub restored: Vec<SessionId>,
    pub failures: Vec<RestoreFailure>,
}

impl SwitchReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Tracks the active workspace and drives switches on a [`SessionManager`].
#[derive(Debug, Default)]
pub struct WorkspaceSwitchCoordinator {
    current: Option<String>,
    phase: SwitchPhase,
}

impl WorkspaceSwitchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn phase(&self) -> &SwitchPhase {
        &self.phase
    }

    /// Make `next` the active workspace. `None` (or an empty id) means no
    /// workspace: the pool is emptied and nothing is restored.
    ///
    /// Returns `None` when `next` is already active.
    pub fn sync<D: Display>(
        &mut self,
        manager: &mut SessionManager<D>,
        next: Option<&str>,
    ) -> Option<SwitchReport> {
        let next = next.filter(|id| !id.is_empty()).map(str::to_string);
        if next == self.current {
            return None;
        }

        let from = self.current.take();
        log::info!("switching workspace {from:?} -> {next:?}");
        let mut report = SwitchReport {
            from: from.clone(),
            to: next.clone(),
            ..SwitchReport::default()
        };

        // Auto-saves must not target either workspace while the pool churns.
        manager.set_workspace_scope(None);

        if let Some(prev) = from {
            if !manager.is_empty() {
                self.enter(SwitchPhase::Saving(prev.clone()));
                report.saved = Some(manager.save_settled(&prev));
            }
        }

        self.enter(SwitchPhase::ClosingAll);
        report.closed = manager.close_all();
        self.current = next.clone();

        let Some(next) = next else {
            self.enter(SwitchPhase::Idle);
            return Some(report);
        };

        self.enter(SwitchPhase::Loading(next.clone()));
        if let Some(record) = manager.persistence().load_state(&next) {
            self.enter(SwitchPhase::Respawning);
            for (index, saved) in record.state.sessions.iter().enumerate() {
                match manager.respawn(saved) {
                    Ok(session) => {
                        if let Some(text) = record.scrollback_for(index) {
                            manager.schedule_scrollback(&session.id, text);
                        }
                        report.restored.push(session.id);
                    }
                    Err(e) => {
                        let failure = RestoreFailure {
                            name: saved.name.clone(),
                            shell: saved.shell.clone(),
                            message: e.to_string(),
                        };
                        log::warn!("{failure}");
                        report.failures.push(failure);
                    }
                }
            }
            log::info!(
                "restored {}/{} session(s) into '{}'",
                report.restored.len(),
                record.state.sessions.len(),
                next
            );
        }

        manager.set_workspace_scope(Some(next));
        self.enter(SwitchPhase::Idle);
        Some(report)
    }

    /// Save the active workspace before the process goes away.
    pub fn shutdown<D: Display>(&mut self, manager: &mut SessionManager<D>) -> Option<SaveOutcome> {
        manager.set_workspace_scope(None);
        let current = self.current.clone()?;
        if manager.is_empty() {
            return None;
        }
        self.enter(SwitchPhase::Saving(current.clone()));
        let outcome = manager.save_settled(&current);
        self.enter(SwitchPhase::Idle);
        Some(outcome)
    }

    fn enter(&mut self, phase: SwitchPhase) {
        log::debug!("workspace switch: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

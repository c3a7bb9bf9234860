//! Save/load of workspace state with an in-flight guard.
//!
//! At most one save runs per controller. A save requested while another is
//! still writing is dropped rather than queued: two snapshots of a pool that
//! is being mutated must never interleave. Nothing here returns an error;
//! storage failures are logged and degrade to "nothing persisted".

use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use super::{StateStore, WorkspaceRecord, WorkspaceSnapshot};
use crate::session::{Session, SessionId};

/// What a save request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was written.
    Written,
    /// The write was handed to a background thread.
    Scheduled,
    Skipped(SkipReason),
    /// The store rejected the write (already logged).
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoWorkspace,
    NothingLive,
    InFlight,
}

/// Busy flag plus a condvar to wait for it to clear.
#[derive(Default)]
struct InFlight {
    busy: Mutex<bool>,
    idle: Condvar,
}

/// Held while a save is running; clears the busy flag on drop.
struct InFlightToken(Arc<InFlight>);

impl Drop for InFlightToken {
    fn drop(&mut self) {
        *self.0.busy.lock() = false;
        self.0.idle.notify_all();
    }
}

impl InFlight {
    fn try_begin(self: &Arc<Self>) -> Option<InFlightToken> {
        let mut busy = self.busy.lock();
        if *busy {
            return None;
        }
        *busy = true;
        Some(InFlightToken(Arc::clone(self)))
    }

    fn begin_when_idle(self: &Arc<Self>) -> InFlightToken {
        let mut busy = self.busy.lock();
        while *busy {
            self.idle.wait(&mut busy);
        }
        *busy = true;
        InFlightToken(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.idle.wait(&mut busy);
        }
    }

    fn is_busy(&self) -> bool {
        *self.busy.lock()
    }
}

/// Serializes workspace snapshots into a [`StateStore`].
pub struct PersistenceController {
    store: Arc<dyn StateStore>,
    in_flight: Arc<InFlight>,
}

impl PersistenceController {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Save every live session of `sessions` under `workspace`, blocking until
    /// written. Skipped when nothing is live or another save is in flight.
    pub fn save_state<'a, I, F>(&self, workspace: &str, sessions: I, scrollback: F) -> SaveOutcome
    where
        I: IntoIterator<Item = &'a Session>,
        F: FnMut(&SessionId) -> Option<String>,
    {
        if workspace.is_empty() {
            return SaveOutcome::Skipped(SkipReason::NoWorkspace);
        }
        let Some(token) = self.in_flight.try_begin() else {
            log::debug!("save for '{workspace}' skipped: another save is in flight");
            return SaveOutcome::Skipped(SkipReason::InFlight);
        };
        let Some(snapshot) = WorkspaceSnapshot::capture(sessions, scrollback) else {
            return SaveOutcome::Skipped(SkipReason::NothingLive);
        };
        let outcome = write(self.store.as_ref(), workspace, snapshot.into_record());
        drop(token);
        outcome
    }

    /// Like [`save_state`](Self::save_state), but waits for an in-flight save
    /// to finish instead of skipping. Used where losing the latest state is
    /// not acceptable (workspace switches, shutdown).
    pub fn save_state_settled<'a, I, F>(
        &self,
        workspace: &str,
        sessions: I,
        scrollback: F,
    ) -> SaveOutcome
    where
        I: IntoIterator<Item = &'a Session>,
        F: FnMut(&SessionId) -> Option<String>,
    {
        if workspace.is_empty() {
            return SaveOutcome::Skipped(SkipReason::NoWorkspace);
        }
        let token = self.in_flight.begin_when_idle();
        let Some(snapshot) = WorkspaceSnapshot::capture(sessions, scrollback) else {
            return SaveOutcome::Skipped(SkipReason::NothingLive);
        };
        let outcome = write(self.store.as_ref(), workspace, snapshot.into_record());
        drop(token);
        outcome
    }

    /// Fire-and-forget save. The snapshot is taken now, on the caller's
    /// thread, so it always reflects the mutation that triggered it; only the
    /// write happens in the background.
    pub fn spawn_save<'a, I, F>(&self, workspace: &str, sessions: I, scrollback: F) -> SaveOutcome
    where
        I: IntoIterator<Item = &'a Session>,
        F: FnMut(&SessionId) -> Option<String>,
    {
        if workspace.is_empty() {
            return SaveOutcome::Skipped(SkipReason::NoWorkspace);
        }
        let Some(token) = self.in_flight.try_begin() else {
            log::debug!("auto-save for '{workspace}' skipped: another save is in flight");
            return SaveOutcome::Skipped(SkipReason::InFlight);
        };
        let Some(snapshot) = WorkspaceSnapshot::capture(sessions, scrollback) else {
            return SaveOutcome::Skipped(SkipReason::NothingLive);
        };

        let store = Arc::clone(&self.store);
        let workspace = workspace.to_string();
        let spawned = thread::Builder::new()
            .name("shellgrid-save".to_string())
            .spawn(move || {
                write(store.as_ref(), &workspace, snapshot.into_record());
                drop(token);
            });
        match spawned {
            Ok(_) => SaveOutcome::Scheduled,
            Err(e) => {
                log::warn!("could not start auto-save thread: {e}");
                SaveOutcome::Failed
            }
        }
    }

    /// Load the saved state of `workspace`.
    ///
    /// `None` for missing, empty or unreadable records; never an error.
    pub fn load_state(&self, workspace: &str) -> Option<WorkspaceRecord> {
        if workspace.is_empty() {
            return None;
        }
        match self.store.load(workspace) {
            Ok(Some(record)) if !record.state.sessions.is_empty() => {
                log::info!(
                    "loaded {} session(s) for workspace '{}' (saved {})",
                    record.state.sessions.len(),
                    workspace,
                    record.state.saved_at.to_rfc3339()
                );
                Some(record)
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("ignoring saved state for '{workspace}': {e:#}");
                None
            }
        }
    }

    /// Forget whatever was saved for `workspace`.
    pub fn clear_state(&self, workspace: &str) {
        if let Err(e) = self.store.remove(workspace) {
            log::warn!("could not clear saved state for '{workspace}': {e:#}");
        }
    }

    /// Block until no save is running.
    pub fn wait_idle(&self) {
        self.in_flight.wait_idle();
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_busy()
    }
}

fn write(store: &dyn StateStore, workspace: &str, record: WorkspaceRecord) -> SaveOutcome {
    match store.save(workspace, &record) {
        Ok(()) => {
            log::debug!(
                "saved {} session(s) for workspace '{}'",
                record.state.sessions.len(),
                workspace
            );
            SaveOutcome::Written
        }
        Err(e) => {
            log::warn!("failed to save workspace '{workspace}': {e:#}");
            SaveOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{JsonFileStore, MemoryStore};
    use crate::testing::{FailingStore, GatedStore};
    use tempfile::tempdir;

    fn zsh() -> Session {
        Session::new("term-0", "Zsh 1", "/bin/zsh").with_cwd(Some("~".to_string()))
    }

    #[test]
    fn save_then_load_round_trips_descriptors() {
        let temp = tempdir().unwrap();
        let controller = PersistenceController::new(Arc::new(JsonFileStore::new(temp.path())));
        let session = zsh();

        let outcome = controller.save_state("ws", [&session], |_| Some("$ pwd\n/home".into()));
        assert_eq!(outcome, SaveOutcome::Written);

        let loaded = controller.load_state("ws").unwrap();
        assert_eq!(loaded.state.sessions.len(), 1);
        let saved = &loaded.state.sessions[0];
        assert_eq!(saved.shell, "/bin/zsh");
        assert_eq!(saved.name, "Zsh 1");
        assert_eq!(saved.cwd.as_deref(), Some("~"));
        assert_eq!(loaded.scrollback_for(0), Some("$ pwd\n/home"));
    }

    #[test]
    fn save_of_empty_pool_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let controller = PersistenceController::new(store.clone());

        let outcome = controller.save_state("ws", std::iter::empty(), |_| None);

        assert_eq!(outcome, SaveOutcome::Skipped(SkipReason::NothingLive));
        assert!(store.is_empty());
        assert!(!controller.is_saving());
    }

    #[test]
    fn save_without_workspace_is_skipped() {
        let controller = PersistenceController::new(Arc::new(MemoryStore::new()));
        let session = zsh();
        assert_eq!(
            controller.save_state("", [&session], |_| None),
            SaveOutcome::Skipped(SkipReason::NoWorkspace)
        );
    }

    #[test]
    fn overlapping_saves_write_once() {
        let store = Arc::new(GatedStore::closed());
        let controller = PersistenceController::new(store.clone());
        let session = zsh();

        let first = controller.spawn_save("ws", [&session], |_| None);
        store.wait_until_blocked();
        let second = controller.spawn_save("ws", [&session], |_| None);
        let third = controller.save_state("ws", [&session], |_| None);

        store.open();
        controller.wait_idle();

        assert_eq!(first, SaveOutcome::Scheduled);
        assert_eq!(second, SaveOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(third, SaveOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(store.writes_for("ws"), 1);
    }

    #[test]
    fn settled_save_waits_for_in_flight_save() {
        let store = Arc::new(GatedStore::closed());
        let controller = Arc::new(PersistenceController::new(store.clone()));
        let session = zsh();

        controller.spawn_save("ws", [&session], |_| None);
        store.wait_until_blocked();

        let waiter = {
            let controller = Arc::clone(&controller);
            let session = session.clone();
            thread::spawn(move || controller.save_state_settled("ws", [&session], |_| None))
        };
        store.open();

        assert_eq!(waiter.join().unwrap(), SaveOutcome::Written);
        assert_eq!(store.writes_for("ws"), 2);
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let controller = PersistenceController::new(Arc::new(FailingStore));
        let session = zsh();

        assert_eq!(controller.save_state("ws", [&session], |_| None), SaveOutcome::Failed);
        assert!(controller.load_state("ws").is_none());
        assert!(!controller.is_saving());
    }

    #[test]
    fn load_of_unknown_workspace_is_none() {
        let controller = PersistenceController::new(Arc::new(MemoryStore::new()));
        assert!(controller.load_state("fresh").is_none());
        assert!(controller.load_state("").is_none());
    }

    #[test]
    fn load_of_corrupt_file_is_none() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::new(temp.path());
        std::fs::write(store.path_for("ws"), "{\"state\": 42}").unwrap();
        let controller = PersistenceController::new(Arc::new(store));

        assert!(controller.load_state("ws").is_none());
    }

    #[test]
    fn clear_state_forgets_workspace() {
        let controller = PersistenceController::new(Arc::new(MemoryStore::new()));
        let session = zsh();
        controller.save_state("ws", [&session], |_| None);

        controller.clear_state("ws");
        assert!(controller.load_state("ws").is_none());
    }
}

//! Session manager: the orchestration layer over the PTY host.
//!
//! Owns the registry, the focus controller, one display per session and the
//! persistence controller. Every mutation happens on the owner's thread;
//! host output and background creations arrive over channels and are applied
//! by [`SessionManager::pump`].

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::anyhow;
use parking_lot::Mutex;

use super::focus::FocusController;
use super::registry::{InsertError, SessionRegistry};
use super::types::{CreateRequest, Session, SessionId, MAX_SESSIONS};
use crate::display::{Display, VtDisplay};
use crate::error::OrchestratorError;
use crate::layout::rows_for;
use crate::persistence::{PersistenceController, SaveOutcome, SavedSession, SkipReason};
use crate::pty::{PtyEvent, PtyHost, TerminalConfig, DEFAULT_COLS, DEFAULT_ROWS};

/// Something observers may want to redraw for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    SessionAdded(SessionId),
    SessionRemoved(SessionId),
    SessionExited {
        id: SessionId,
        exit_code: Option<i32>,
    },
    /// The host lost a session's process.
    SessionFailed {
        id: SessionId,
        message: String,
    },
    FocusChanged(Option<SessionId>),
    /// Every session was closed at once.
    Cleared,
    /// A create request failed; carries the rendered error.
    CreationFailed(String),
}

/// Coarse view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Empty,
    Populated,
    Focused,
}

/// Result of a background creation, sent back to the owner thread.
struct CompletedCreate {
    generation: u64,
    base_name: String,
    shell: String,
    result: anyhow::Result<Session>,
}

pub struct SessionManager<D: Display = VtDisplay> {
    host: Arc<dyn PtyHost>,
    registry: SessionRegistry,
    focus: FocusController,
    displays: HashMap<SessionId, D>,
    persistence: PersistenceController,
    /// Workspace auto-saves go to; `None` while switching or unscoped.
    workspace: Option<String>,
    auto_save_enabled: bool,
    events_tx: Sender<PtyEvent>,
    events_rx: Receiver<PtyEvent>,
    created_tx: Sender<CompletedCreate>,
    created_rx: Receiver<CompletedCreate>,
    /// Background creations of the current generation not yet adopted
    pending_creates: usize,
    /// Bumped by close-all; stale creations are released, not adopted.
    generation: u64,
    /// Workers check and send under this lock, so teardown sees every
    /// result that got through.
    mounted: Arc<Mutex<bool>>,
    /// Scrollback to paint into freshly respawned displays on the next tick.
    pending_restores: Vec<(SessionId, String)>,
    observers: Vec<Sender<ManagerEvent>>,
    rows: u16,
    cols: u16,
}

impl<D: Display> SessionManager<D> {
    pub fn new(host: Arc<dyn PtyHost>, persistence: PersistenceController) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let (created_tx, created_rx) = mpsc::channel();
        Self {
            host,
            registry: SessionRegistry::new(),
            focus: FocusController::new(),
            displays: HashMap::new(),
            persistence,
            workspace: None,
            auto_save_enabled: true,
            events_tx,
            events_rx,
            created_tx,
            created_rx,
            pending_creates: 0,
            generation: 0,
            mounted: Arc::new(Mutex::new(true)),
            pending_restores: Vec::new(),
            observers: Vec::new(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }

    /// Turn mutation-triggered saves on or off.
    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.auto_save_enabled = enabled;
        self
    }

    /// Terminal size used for new sessions.
    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    // --- creation ---

    /// Whether another session may be requested, counting in-flight
    /// background creations.
    pub fn can_create(&self) -> bool {
        self.registry.len() + self.pending_creates < MAX_SESSIONS
    }

    /// Spawn a shell and append it to the pool, blocking on the host.
    pub fn create_session(&mut self, request: &CreateRequest) -> Result<Session, OrchestratorError> {
        if !self.can_create() {
            log::debug!("create '{}' refused: pool is full", request.name);
            return Err(OrchestratorError::CapacityExceeded {
                limit: MAX_SESSIONS,
            });
        }

        let config = self.terminal_config(&request.shell, self.registry.next_name(&request.name), &request.cwd);
        let session = match self.host.create_terminal(&config, self.events_tx.clone()) {
            Ok(session) => session,
            Err(source) => return Err(self.creation_failed(&request.shell, source)),
        };

        self.adopt(session, &request.name, &request.shell)
    }

    /// Spawn a shell on a worker thread. The session joins the pool on a
    /// later [`pump`](Self::pump); failures surface as
    /// [`ManagerEvent::CreationFailed`].
    pub fn request_create(&mut self, request: &CreateRequest) -> Result<(), OrchestratorError> {
        if !self.can_create() {
            return Err(OrchestratorError::CapacityExceeded {
                limit: MAX_SESSIONS,
            });
        }

        let name = format!("{} {}", request.name, self.registry.len() + self.pending_creates + 1);
        let config = self.terminal_config(&request.shell, name, &request.cwd);
        let host = Arc::clone(&self.host);
        let events = self.events_tx.clone();
        let done = self.created_tx.clone();
        let mounted = Arc::clone(&self.mounted);
        let generation = self.generation;
        let base_name = request.name.clone();

        let spawned = thread::Builder::new()
            .name("shellgrid-create".to_string())
            .spawn(move || {
                let result = host.create_terminal(&config, events);
                let unsent = {
                    let mounted = mounted.lock();
                    if *mounted {
                        let completed = CompletedCreate {
                            generation,
                            base_name,
                            shell: config.shell,
                            result,
                        };
                        done.send(completed).err().map(|mpsc::SendError(c)| c.result)
                    } else {
                        Some(result)
                    }
                };
                if let Some(Ok(session)) = unsent {
                    log::debug!("releasing {} created after shutdown", session.id);
                    let _ = host.close_terminal(&session.id);
                }
            });

        match spawned {
            Ok(_) => {
                self.pending_creates += 1;
                Ok(())
            }
            Err(e) => Err(self.creation_failed(&request.shell, anyhow!(e).context("could not start worker"))),
        }
    }

    fn terminal_config(&self, shell: &str, name: String, cwd: &Option<String>) -> TerminalConfig {
        TerminalConfig::new(shell, name, cwd.clone()).with_size(self.rows, self.cols)
    }

    fn creation_failed(&mut self, shell: &str, source: anyhow::Error) -> OrchestratorError {
        let err = OrchestratorError::CreationFailure {
            shell: shell.to_string(),
            source,
        };
        log::warn!("{err}");
        self.emit(ManagerEvent::CreationFailed(err.to_string()));
        err
    }

    /// Register a host-issued session under its next display name.
    fn adopt(&mut self, session: Session, base_name: &str, shell: &str) -> Result<Session, OrchestratorError> {
        let id = session.id.clone();
        let admitted = match self.registry.admit(session, base_name) {
            Ok(admitted) => admitted.clone(),
            Err(reason) => {
                let _ = self.host.close_terminal(&id);
                let source = match reason {
                    InsertError::AtCapacity => anyhow!("pool filled up while spawning"),
                    InsertError::DuplicateId => anyhow!("host reused id '{id}'"),
                };
                return Err(self.creation_failed(shell, source));
            }
        };

        log::info!("session {} started as '{}'", admitted.id, admitted.name);
        self.displays.insert(id.clone(), D::open(self.rows, self.cols));
        self.emit(ManagerEvent::SessionAdded(id));
        self.auto_save();
        Ok(admitted)
    }

    /// Respawn a saved descriptor, keeping its saved name. No auto-save.
    pub fn respawn(&mut self, saved: &SavedSession) -> Result<Session, OrchestratorError> {
        if !self.can_create() {
            return Err(OrchestratorError::CapacityExceeded {
                limit: MAX_SESSIONS,
            });
        }

        let config = self.terminal_config(&saved.shell, saved.name.clone(), &saved.cwd);
        let mut session = self
            .host
            .create_terminal(&config, self.events_tx.clone())
            .map_err(|source| OrchestratorError::CreationFailure {
                shell: saved.shell.clone(),
                source,
            })?;
        session.name = saved.name.clone();

        let id = session.id.clone();
        let inserted = match self.registry.insert(session) {
            Ok(inserted) => inserted.clone(),
            Err(reason) => {
                let _ = self.host.close_terminal(&id);
                return Err(OrchestratorError::CreationFailure {
                    shell: saved.shell.clone(),
                    source: anyhow!("could not register restored session: {reason:?}"),
                });
            }
        };

        self.displays.insert(id.clone(), D::open(self.rows, self.cols));
        self.emit(ManagerEvent::SessionAdded(id));
        Ok(inserted)
    }

    /// Paint `text` into `id`'s display on the next [`pump`](Self::pump).
    pub fn schedule_scrollback(&mut self, id: &str, text: &str) {
        self.pending_restores.push((id.to_string(), text.to_string()));
    }

    // --- teardown ---

    /// Close one session and its process together.
    pub fn close_session(&mut self, id: &str) -> Result<(), OrchestratorError> {
        if !self.registry.contains(id) {
            return Err(OrchestratorError::UnknownSession(id.to_string()));
        }

        if let Err(e) = self.host.close_terminal(id) {
            // Already gone on the host side; the descriptor goes regardless.
            log::warn!("closing {id}: {e:#}");
        }
        self.registry.remove(id);
        self.displays.remove(id);
        self.pending_restores.retain(|(pending, _)| pending != id);
        if self.focus.forget(id) {
            self.emit(ManagerEvent::FocusChanged(None));
        }
        log::info!("session {id} closed");
        self.emit(ManagerEvent::SessionRemoved(id.to_string()));
        self.auto_save();
        Ok(())
    }

    /// Close every session, discard in-flight creations and clear focus.
    /// Returns how many sessions were closed. Never auto-saves.
    pub fn close_all(&mut self) -> usize {
        self.generation += 1;
        self.pending_creates = 0;
        let sessions = self.registry.drain();
        for session in &sessions {
            if let Err(e) = self.host.close_terminal(&session.id) {
                log::warn!("closing {}: {e:#}", session.id);
            }
        }
        self.displays.clear();
        self.pending_restores.clear();
        self.focus.clear();
        if !sessions.is_empty() {
            log::info!("closed {} session(s)", sessions.len());
        }
        self.emit(ManagerEvent::Cleared);
        sessions.len()
    }

    /// Stop adopting background results and close everything still open.
    pub fn shutdown(&mut self) {
        self.unmount();
        self.workspace = None;
        self.close_all();
        self.persistence.wait_idle();
    }

    // --- ticks ---

    /// Apply everything that arrived since the last tick: scheduled
    /// scrollback restores, finished background creations and PTY output or
    /// exits. Returns the number of PTY events handled.
    pub fn pump(&mut self) -> usize {
        for (id, text) in std::mem::take(&mut self.pending_restores) {
            if let Some(display) = self.displays.get_mut(&id) {
                display.write_to_display(&text);
            }
        }

        while let Ok(completed) = self.created_rx.try_recv() {
            self.finish_create(completed);
        }

        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            match event {
                PtyEvent::Output { id, data } => {
                    if let Some(display) = self.displays.get_mut(&id) {
                        display.write(&data);
                    }
                }
                PtyEvent::Exited { id, exit_code } => {
                    if self.registry.mark_exited(&id, exit_code) {
                        log::info!("session {id} exited ({exit_code:?})");
                        self.emit(ManagerEvent::SessionExited { id, exit_code });
                    }
                }
                PtyEvent::Failed { id, message } => {
                    if self.registry.mark_failed(&id) {
                        log::warn!("session {id} failed: {message}");
                        self.emit(ManagerEvent::SessionFailed { id, message });
                    }
                }
            }
        }
        handled
    }

    fn finish_create(&mut self, completed: CompletedCreate) {
        let CompletedCreate {
            generation,
            base_name,
            shell,
            result,
        } = completed;

        if generation != self.generation {
            if let Ok(session) = result {
                log::debug!("releasing {} created before close-all", session.id);
                let _ = self.host.close_terminal(&session.id);
            }
            return;
        }

        self.pending_creates = self.pending_creates.saturating_sub(1);
        match result {
            Ok(session) => {
                let _ = self.adopt(session, &base_name, &shell);
            }
            Err(source) => {
                self.creation_failed(&shell, source);
            }
        }
    }

    // --- focus & layout ---

    /// Focus `id`, or return to the grid if it is already focused. Unknown
    /// ids are ignored.
    pub fn toggle_focus(&mut self, id: &str) {
        if !self.registry.contains(id) {
            return;
        }
        self.focus.toggle_focus(id);
        let focused = self.focus.focused().map(str::to_string);
        self.emit(ManagerEvent::FocusChanged(focused));
    }

    pub fn focused(&self) -> Option<&str> {
        self.focus.focused()
    }

    pub fn visible_sessions(&self) -> Vec<&Session> {
        self.focus.visible_sessions(&self.registry)
    }

    /// Row distribution for the visible sessions.
    pub fn grid_rows(&self) -> Vec<usize> {
        rows_for(self.visible_sessions().len())
    }

    pub fn state(&self) -> ManagerState {
        if self.focus.focused().is_some() {
            ManagerState::Focused
        } else if self.registry.is_empty() {
            ManagerState::Empty
        } else {
            ManagerState::Populated
        }
    }

    /// "{len}/12", for the status line.
    pub fn capacity_label(&self) -> String {
        format!("{}/{}", self.registry.len(), MAX_SESSIONS)
    }

    // --- I/O ---

    pub fn write_input(&self, id: &str, data: &[u8]) -> Result<(), OrchestratorError> {
        if !self.registry.contains(id) {
            return Err(OrchestratorError::UnknownSession(id.to_string()));
        }
        self.host
            .write_input(id, data)
            .map_err(|source| OrchestratorError::Host {
                id: id.to_string(),
                source,
            })
    }

    /// Resize one session's display and PTY.
    pub fn resize_session(&mut self, id: &str, rows: u16, cols: u16) -> Result<(), OrchestratorError> {
        let display = self
            .displays
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::UnknownSession(id.to_string()))?;
        display.resize(rows, cols);
        self.host
            .resize_terminal(id, cols, rows)
            .map_err(|source| OrchestratorError::Host {
                id: id.to_string(),
                source,
            })
    }

    /// Size used for sessions created from now on.
    pub fn set_default_size(&mut self, rows: u16, cols: u16) {
        self.rows = rows;
        self.cols = cols;
    }

    // --- persistence ---

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// Point auto-saves at `workspace`, or stop them with `None`.
    pub fn set_workspace_scope(&mut self, workspace: Option<String>) {
        self.workspace = workspace.filter(|w| !w.is_empty());
    }

    pub fn persistence(&self) -> &PersistenceController {
        &self.persistence
    }

    /// Fire-and-forget save of the current pool into the scoped workspace.
    fn auto_save(&mut self) -> SaveOutcome {
        if !self.auto_save_enabled {
            return SaveOutcome::Skipped(SkipReason::NoWorkspace);
        }
        let Some(workspace) = self.workspace.as_deref() else {
            return SaveOutcome::Skipped(SkipReason::NoWorkspace);
        };
        let displays = &mut self.displays;
        let restores = &self.pending_restores;
        self.persistence
            .spawn_save(workspace, self.registry.sessions(), |id| {
                scrollback_of(displays, restores, id)
            })
    }

    /// Save the pool into `workspace`, waiting out any in-flight save.
    pub fn save_settled(&mut self, workspace: &str) -> SaveOutcome {
        let displays = &mut self.displays;
        let restores = &self.pending_restores;
        self.persistence
            .save_state_settled(workspace, self.registry.sessions(), |id| {
                scrollback_of(displays, restores, id)
            })
    }

    // --- queries ---

    pub fn sessions(&self) -> &[Session] {
        self.registry.sessions()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.registry.get(id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn display(&self, id: &str) -> Option<&D> {
        self.displays.get(id)
    }

    pub fn display_mut(&mut self, id: &str) -> Option<&mut D> {
        self.displays.get_mut(id)
    }

    pub fn pending_creates(&self) -> usize {
        self.pending_creates
    }

    // --- observers ---

    pub fn subscribe(&mut self) -> Receiver<ManagerEvent> {
        let (tx, rx) = mpsc::channel();
        self.observers.push(tx);
        rx
    }

    fn emit(&mut self, event: ManagerEvent) {
        self.observers.retain(|observer| observer.send(event.clone()).is_ok());
    }

    /// Stop adopting background results and release the ones already sent.
    fn unmount(&mut self) {
        *self.mounted.lock() = false;
        while let Ok(completed) = self.created_rx.try_recv() {
            if let Ok(session) = completed.result {
                log::debug!("releasing {} finished during teardown", session.id);
                let _ = self.host.close_terminal(&session.id);
            }
        }
        self.pending_creates = 0;
    }
}

impl<D: Display> Drop for SessionManager<D> {
    fn drop(&mut self) {
        self.unmount();
        for session in self.registry.drain() {
            let _ = self.host.close_terminal(&session.id);
        }
    }
}

/// Display text for a save; a restore not yet painted still counts.
fn scrollback_of<D: Display>(
    displays: &mut HashMap<SessionId, D>,
    pending: &[(SessionId, String)],
    id: &SessionId,
) -> Option<String> {
    let captured = displays.get_mut(id).map(|d| d.scrollback()).unwrap_or_default();
    let restored = pending.iter().find(|(p, _)| p == id).map(|(_, text)| text.as_str());
    let text = match restored {
        Some(old) if captured.is_empty() => old.to_string(),
        Some(old) => format!("{old}\n{captured}"),
        None => captured,
    };
    (!text.is_empty()).then_some(text)
}

//! Test doubles for the PTY host and the state store.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Sender;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use parking_lot::{Condvar, Mutex};

use crate::persistence::{MemoryStore, StateStore, WorkspaceRecord};
use crate::pty::{PtyEvent, PtyHost, TerminalConfig};
use crate::session::{Session, SessionId};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct HostState {
    next_id: u64,
    terminals: HashMap<SessionId, (Session, Sender<PtyEvent>)>,
    attempts: Vec<TerminalConfig>,
    closed: Vec<SessionId>,
    failing_shells: HashSet<String>,
    hold_creations: bool,
    creating: usize,
}

/// In-memory PTY host: spawns nothing, records everything.
#[derive(Default)]
pub struct ScriptedHost {
    state: Mutex<HostState>,
    changed: Condvar,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create for `shell` fail.
    pub fn fail_shell(&self, shell: &str) {
        self.state.lock().failing_shells.insert(shell.to_string());
    }

    /// Block creations until [`release_creations`](Self::release_creations).
    pub fn hold_creations(&self) {
        self.state.lock().hold_creations = true;
    }

    pub fn release_creations(&self) {
        self.state.lock().hold_creations = false;
        self.changed.notify_all();
    }

    /// Wait until `n` creations are parked on the hold.
    pub fn wait_until_creating(&self, n: usize) {
        let mut state = self.state.lock();
        while state.creating < n {
            assert!(!self.changed.wait_for(&mut state, WAIT).timed_out(), "creation never started");
        }
    }

    /// Wait until `n` terminals have been closed in total.
    pub fn wait_for_closed(&self, n: usize) {
        let mut state = self.state.lock();
        while state.closed.len() < n {
            assert!(!self.changed.wait_for(&mut state, WAIT).timed_out(), "close never happened");
        }
    }

    pub fn emit_output(&self, id: &str, data: &[u8]) {
        self.send(id, PtyEvent::Output {
            id: id.to_string(),
            data: data.to_vec(),
        });
    }

    pub fn emit_exit(&self, id: &str, exit_code: i32) {
        self.send(id, PtyEvent::Exited {
            id: id.to_string(),
            exit_code: Some(exit_code),
        });
    }

    fn send(&self, id: &str, event: PtyEvent) {
        let state = self.state.lock();
        let (_, events) = state.terminals.get(id).expect("no such fake terminal");
        events.send(event).expect("manager dropped its event channel");
    }

    /// Every create request seen, successful or not.
    pub fn attempts(&self) -> Vec<TerminalConfig> {
        self.state.lock().attempts.clone()
    }

    pub fn closed(&self) -> Vec<SessionId> {
        self.state.lock().closed.clone()
    }

    pub fn open_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.state.lock().terminals.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl PtyHost for ScriptedHost {
    fn create_terminal(&self, config: &TerminalConfig, events: Sender<PtyEvent>) -> Result<Session> {
        let mut state = self.state.lock();
        state.attempts.push(config.clone());
        state.creating += 1;
        self.changed.notify_all();
        while state.hold_creations {
            self.changed.wait(&mut state);
        }
        state.creating -= 1;

        if state.failing_shells.contains(&config.shell) {
            bail!("{}: No such file or directory", config.shell);
        }

        let id = format!("fake-{}", state.next_id);
        state.next_id += 1;
        let session = Session::new(id.clone(), config.name.clone(), config.shell.clone())
            .with_cwd(config.cwd.clone())
            .with_pid(Some(1000 + state.next_id as u32));
        state.terminals.insert(id, (session.clone(), events));
        Ok(session)
    }

    fn close_terminal(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.terminals.remove(id).is_none() {
            bail!("no terminal {id}");
        }
        state.closed.push(id.to_string());
        self.changed.notify_all();
        Ok(())
    }

    fn close_all_terminals(&self) -> Result<()> {
        let mut state = self.state.lock();
        let ids: Vec<_> = state.terminals.drain().map(|(id, _)| id).collect();
        state.closed.extend(ids);
        self.changed.notify_all();
        Ok(())
    }

    fn write_input(&self, id: &str, _data: &[u8]) -> Result<()> {
        if self.state.lock().terminals.contains_key(id) {
            Ok(())
        } else {
            Err(anyhow!("no terminal {id}"))
        }
    }

    fn resize_terminal(&self, _id: &str, _cols: u16, _rows: u16) -> Result<()> {
        Ok(())
    }

    fn all_sessions(&self) -> Vec<Session> {
        self.state
            .lock()
            .terminals
            .values()
            .map(|(s, _)| s.clone())
            .collect()
    }

    fn session_count(&self) -> usize {
        self.state.lock().terminals.len()
    }
}

#[derive(Default)]
struct GateState {
    open: bool,
    blocked: usize,
    writes: HashMap<String, usize>,
}

/// Memory store whose writes can be held at a gate and are counted.
#[derive(Default)]
pub struct GatedStore {
    inner: MemoryStore,
    gate: Mutex<GateState>,
    changed: Condvar,
}

impl GatedStore {
    /// Writes go straight through.
    pub fn open_gate() -> Self {
        let store = Self::default();
        store.gate.lock().open = true;
        store
    }

    /// Writes block until [`open`](Self::open).
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.gate.lock().open = true;
        self.changed.notify_all();
    }

    pub fn wait_until_blocked(&self) {
        let mut gate = self.gate.lock();
        while gate.blocked == 0 {
            assert!(!self.changed.wait_for(&mut gate, WAIT).timed_out(), "no write arrived");
        }
    }

    pub fn writes_for(&self, workspace: &str) -> usize {
        self.gate.lock().writes.get(workspace).copied().unwrap_or(0)
    }

    pub fn reset_counts(&self) {
        self.gate.lock().writes.clear();
    }
}

impl StateStore for GatedStore {
    fn load(&self, workspace: &str) -> Result<Option<WorkspaceRecord>> {
        self.inner.load(workspace)
    }

    fn save(&self, workspace: &str, record: &WorkspaceRecord) -> Result<()> {
        {
            let mut gate = self.gate.lock();
            gate.blocked += 1;
            self.changed.notify_all();
            while !gate.open {
                self.changed.wait(&mut gate);
            }
            gate.blocked -= 1;
            *gate.writes.entry(workspace.to_string()).or_default() += 1;
        }
        self.inner.save(workspace, record)
    }

    fn remove(&self, workspace: &str) -> Result<()> {
        self.inner.remove(workspace)
    }
}

/// Every operation fails like a broken disk.
pub struct FailingStore;

impl StateStore for FailingStore {
    fn load(&self, _workspace: &str) -> Result<Option<WorkspaceRecord>> {
        bail!("I/O error: disk unplugged")
    }

    fn save(&self, _workspace: &str, _record: &WorkspaceRecord) -> Result<()> {
        bail!("I/O error: disk unplugged")
    }

    fn remove(&self, _workspace: &str) -> Result<()> {
        bail!("I/O error: disk unplugged")
    }
}

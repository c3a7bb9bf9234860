//! Native PTY host backed by `portable-pty`.
//!
//! Each terminal gets a reader thread that forwards output to the
//! orchestrator and reports the exit status once the PTY reaches EOF.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtyPair, PtySize};

use super::{PtyEvent, PtyHost, TerminalConfig};
use crate::session::{Session, SessionId, SessionStatus};

/// One spawned shell owned by the host.
struct PtyHandler {
    session: Session,
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    _reader_thread: thread::JoinHandle<()>,
    /// Flag set to false when the reader thread exits (child process terminated)
    alive: Arc<AtomicBool>,
}

impl PtyHandler {
    fn spawn(id: SessionId, config: &TerminalConfig, events: Sender<PtyEvent>) -> Result<Self> {
        let pty_system = native_pty_system();

        let PtyPair { master, slave } = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(&config.shell);
        if let Some(cwd) = config.cwd.as_deref() {
            cmd.cwd(expand_home(cwd));
        }

        // Set environment variables for better terminal experience
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");

        let mut child = slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn {}", config.shell))?;
        // The parent must not hold the slave end, or the reader never sees EOF.
        drop(slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let writer = master.take_writer()?;
        let mut reader = master.try_clone_reader()?;

        let alive = Arc::new(AtomicBool::new(true));
        let alive_clone = Arc::clone(&alive);
        let thread_id = id.clone();

        let reader_thread = thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break, // EOF
                    Ok(n) => {
                        let event = PtyEvent::Output {
                            id: thread_id.clone(),
                            data: buf[..n].to_vec(),
                        };
                        if events.send(event).is_err() {
                            break; // Orchestrator is gone
                        }
                    }
                    Err(_) => break,
                }
            }
            alive_clone.store(false, Ordering::SeqCst);

            let event = match child.wait() {
                Ok(status) => PtyEvent::Exited {
                    id: thread_id,
                    exit_code: i32::try_from(status.exit_code()).ok(),
                },
                Err(e) => PtyEvent::Failed {
                    id: thread_id,
                    message: e.to_string(),
                },
            };
            let _ = events.send(event);
        });

        let session = Session::new(id, config.name.clone(), config.shell.clone())
            .with_cwd(config.cwd.clone())
            .with_pid(pid);

        Ok(Self {
            session,
            master,
            writer,
            killer,
            _reader_thread: reader_thread,
            alive,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")
    }

    fn kill(&mut self) {
        if self.is_alive() {
            if let Err(e) = self.killer.kill() {
                log::debug!("kill for {} failed: {e}", self.session.id);
            }
        }
    }
}

/// Spawns shells in native pseudo-terminals.
pub struct NativePtyHost {
    terminals: Mutex<HashMap<SessionId, PtyHandler>>,
    /// Counter for generating session IDs
    next_id: AtomicU64,
}

impl NativePtyHost {
    pub fn new() -> Self {
        Self {
            terminals: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl Default for NativePtyHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyHost for NativePtyHost {
    fn create_terminal(&self, config: &TerminalConfig, events: Sender<PtyEvent>) -> Result<Session> {
        let id = format!("term-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let handler = PtyHandler::spawn(id.clone(), config, events)?;
        let session = handler.session.clone();
        log::info!("spawned {} as {} (pid {:?})", config.shell, id, session.pid);
        self.terminals.lock().insert(id, handler);
        Ok(session)
    }

    fn close_terminal(&self, id: &str) -> Result<()> {
        let mut handler = self
            .terminals
            .lock()
            .remove(id)
            .with_context(|| format!("No terminal {id}"))?;
        handler.kill();
        log::info!("closed terminal {id}");
        Ok(())
    }

    fn close_all_terminals(&self) -> Result<()> {
        let drained: Vec<PtyHandler> = self.terminals.lock().drain().map(|(_, h)| h).collect();
        for mut handler in drained {
            handler.kill();
        }
        Ok(())
    }

    fn write_input(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut terminals = self.terminals.lock();
        let handler = terminals
            .get_mut(id)
            .with_context(|| format!("No terminal {id}"))?;
        handler.write(data)
    }

    fn resize_terminal(&self, id: &str, cols: u16, rows: u16) -> Result<()> {
        let terminals = self.terminals.lock();
        let handler = terminals.get(id).with_context(|| format!("No terminal {id}"))?;
        handler.resize(rows, cols)
    }

    fn all_sessions(&self) -> Vec<Session> {
        self.terminals
            .lock()
            .values()
            .map(|h| {
                let mut session = h.session.clone();
                if !h.is_alive() {
                    session.status = SessionStatus::Exited;
                }
                session
            })
            .collect()
    }

    fn session_count(&self) -> usize {
        self.terminals.lock().len()
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    }
}

//! Backing stores for workspace records.
//!
//! Records live in `~/.local/share/shellgrid/workspaces/<workspace>.json`
//! (platform data dir), one file per workspace.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use super::WorkspaceRecord;

/// Keyed storage for workspace records.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved (or the slot is empty).
    fn load(&self, workspace: &str) -> Result<Option<WorkspaceRecord>>;

    fn save(&self, workspace: &str, record: &WorkspaceRecord) -> Result<()>;

    /// Forget a workspace. Missing records are not an error.
    fn remove(&self, workspace: &str) -> Result<()>;
}

/// One pretty-printed JSON file per workspace.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_state_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, workspace: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(workspace)))
    }

    /// Write to a temp file, then rename over the target.
    fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
        let temp_path = target.with_extension("json.tmp");

        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        drop(file);

        fs::rename(&temp_path, target)
            .with_context(|| format!("Failed to move state into {}", target.display()))?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load(&self, workspace: &str) -> Result<Option<WorkspaceRecord>> {
        let path = self.path_for(workspace);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read workspace state: {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }

        let record = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse workspace state: {}", path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, workspace: &str, record: &WorkspaceRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory: {}", self.dir.display()))?;

        let contents =
            serde_json::to_string_pretty(record).context("Failed to serialize workspace state")?;
        Self::atomic_write(&self.path_for(workspace), contents.as_bytes())
    }

    fn remove(&self, workspace: &str) -> Result<()> {
        let path = self.path_for(workspace);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, WorkspaceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, workspace: &str) -> Result<Option<WorkspaceRecord>> {
        Ok(self.records.lock().get(workspace).cloned())
    }

    fn save(&self, workspace: &str, record: &WorkspaceRecord) -> Result<()> {
        self.records
            .lock()
            .insert(workspace.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, workspace: &str) -> Result<()> {
        self.records.lock().remove(workspace);
        Ok(())
    }
}

/// `<data dir>/shellgrid/workspaces`
pub fn default_state_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not find data directory")?;
    Ok(data_dir.join("shellgrid").join("workspaces"))
}

/// File-name-safe, collision-free encoding of a workspace id.
///
/// ASCII alphanumerics, `-` and non-leading `.` pass through; every other
/// byte becomes `_xx` (lowercase hex), so distinct ids get distinct files.
fn file_stem(workspace: &str) -> String {
    let mut stem = String::with_capacity(workspace.len());
    for byte in workspace.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => stem.push(byte as char),
            b'.' if !stem.is_empty() => stem.push('.'),
            _ => stem.push_str(&format!("_{byte:02x}")),
        }
    }
    stem
}

//! Configuration management for shellgrid.
//!
//! Handles loading and saving of user preferences: the default shell, known
//! workspaces, persistence and logging.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shell executable for new sessions
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Base label for new sessions ("Zsh" gives "Zsh 1", "Zsh 2", ...).
    /// Derived from the shell when unset.
    #[serde(default)]
    pub shell_name: Option<String>,

    /// Workspaces cycled through with Ctrl-T
    #[serde(default)]
    pub workspaces: Vec<String>,

    /// Workspace active when the app last quit
    #[serde(default)]
    pub last_workspace: Option<String>,

    /// Save after every create/close
    #[serde(default = "default_true")]
    pub auto_save: bool,

    /// Fallback for SHELLGRID_LOG
    #[serde(default)]
    pub log_level: Option<String>,

    /// Override for where workspace records are stored
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_name: None,
            workspaces: Vec::new(),
            last_workspace: None,
            auto_save: true,
            log_level: None,
            state_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate();

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;

        Ok(config_dir.join("shellgrid").join("config.json"))
    }

    /// Drop blank and duplicate workspaces and a blank shell.
    pub fn validate(&mut self) {
        let mut seen = Vec::new();
        self.workspaces.retain(|w| {
            let w = w.trim();
            if w.is_empty() || seen.iter().any(|s: &String| s == w) {
                return false;
            }
            seen.push(w.to_string());
            true
        });
        for w in &mut self.workspaces {
            *w = w.trim().to_string();
        }
        if self.last_workspace.as_deref().is_some_and(|w| w.trim().is_empty()) {
            self.last_workspace = None;
        }
        if self.shell.trim().is_empty() {
            self.shell = default_shell();
        }
    }

    /// Label for new sessions: the configured name, or the shell's file name
    /// capitalized ("/bin/zsh" gives "Zsh").
    pub fn session_label(&self) -> String {
        if let Some(name) = self.shell_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        shell_label(&self.shell)
    }

    /// Workspace after `current` in the configured list, wrapping around.
    pub fn next_workspace(&self, current: Option<&str>) -> Option<&str> {
        if self.workspaces.is_empty() {
            return None;
        }
        let next = current
            .and_then(|c| self.workspaces.iter().position(|w| w == c))
            .map_or(0, |i| (i + 1) % self.workspaces.len());
        self.workspaces.get(next).map(String::as_str)
    }
}

/// Capitalized file name of a shell path.
pub fn shell_label(shell: &str) -> String {
    let base = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(shell);
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Shell".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.auto_save);
        assert!(config.workspaces.is_empty());
        assert!(!config.shell.is_empty());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"shell": "/bin/zsh"}"#).unwrap();
        assert_eq!(config.shell, "/bin/zsh");
        assert!(config.auto_save);
        assert_eq!(config.state_dir, None);
    }

    #[test]
    fn test_validate_drops_blank_and_duplicate_workspaces() {
        let mut config = Config {
            workspaces: vec!["a".into(), " ".into(), " b ".into(), "a".into()],
            last_workspace: Some("".into()),
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.workspaces, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.last_workspace, None);
    }

    #[test]
    fn test_session_label() {
        let mut config = Config {
            shell: "/usr/local/bin/fish".into(),
            ..Default::default()
        };
        assert_eq!(config.session_label(), "Fish");
        config.shell_name = Some("Work".into());
        assert_eq!(config.session_label(), "Work");
        assert_eq!(shell_label("zsh"), "Zsh");
    }

    #[test]
    fn test_next_workspace_wraps() {
        let config = Config {
            workspaces: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        assert_eq!(config.next_workspace(None), Some("a"));
        assert_eq!(config.next_workspace(Some("a")), Some("b"));
        assert_eq!(config.next_workspace(Some("b")), Some("a"));
        assert_eq!(config.next_workspace(Some("zzz")), Some("a"));
        assert_eq!(Config::default().next_workspace(Some("a")), None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let config = Config {
            shell: "/bin/bash".into(),
            workspaces: vec!["work".into()],
            last_workspace: Some("work".into()),
            auto_save: false,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp = tempdir().unwrap();
        let loaded = Config::load_from(&temp.path().join("none.json")).unwrap();
        assert!(loaded.auto_save);
    }
}

//! File logger behind the `log` facade.
//!
//! Controlled by the SHELLGRID_LOG environment variable (falling back to the
//! config's `log_level`): off, error, warn, info, debug or trace.
//!
//! Output goes to `<temp dir>/shellgrid.log` so it never lands on the
//! terminal the TUI is drawing on.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

pub const LOG_ENV: &str = "SHELLGRID_LOG";

/// Parse a level name. Unknown names are `None`.
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" | "0" => Some(LevelFilter::Off),
        "error" | "1" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" | "2" => Some(LevelFilter::Info),
        "debug" | "3" => Some(LevelFilter::Debug),
        "trace" | "4" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Level from the environment, then `configured`, then off.
pub fn resolve_level(env: Option<&str>, configured: Option<&str>) -> LevelFilter {
    env.and_then(parse_level)
        .or_else(|| configured.and_then(parse_level))
        .unwrap_or(LevelFilter::Off)
}

pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("shellgrid.log")
}

pub struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl FileLogger {
    /// Truncate `path` and write a session header.
    pub fn open(path: &std::path::Path, level: LevelFilter) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        let _ = writeln!(
            file,
            "{}\nshellgrid started at {} (level={})\n{}",
            "=".repeat(80),
            Local::now().to_rfc3339(),
            level,
            "=".repeat(80)
        );
        Ok(Self {
            level,
            file: Mutex::new(file),
        })
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut file = self.file.lock();
        let _ = writeln!(
            file,
            "[{}] [{:<5}] [{}] {}",
            Local::now().format("%H:%M:%S%.6f"),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = self.file.lock().flush();
    }
}

/// Install the file logger as the global logger. Does nothing when the
/// resolved level is off.
pub fn init(configured: Option<&str>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let level = resolve_level(env.as_deref(), configured);
    if level == LevelFilter::Off {
        return Ok(());
    }

    let logger = FileLogger::open(&default_log_path(), level)?;
    log::set_boxed_logger(Box::new(logger)).context("A logger is already installed")?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_level_accepts_names_and_numbers() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" warn "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("4"), Some(LevelFilter::Trace));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn environment_wins_over_config() {
        assert_eq!(resolve_level(Some("trace"), Some("info")), LevelFilter::Trace);
        assert_eq!(resolve_level(Some("bogus"), Some("info")), LevelFilter::Info);
        assert_eq!(resolve_level(None, None), LevelFilter::Off);
    }

    #[test]
    fn logger_filters_below_its_level() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("test.log");
        let logger = FileLogger::open(&path, LevelFilter::Info).unwrap();

        logger.log(
            &Record::builder()
                .level(log::Level::Info)
                .target("shellgrid::test")
                .args(format_args!("kept"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(log::Level::Debug)
                .args(format_args!("dropped"))
                .build(),
        );
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("shellgrid started"));
        assert!(contents.contains("[INFO ] [shellgrid::test] kept"));
        assert!(!contents.contains("dropped"));
    }
}

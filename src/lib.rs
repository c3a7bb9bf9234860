//! shellgrid library crate.
//!
//! This library provides the core functionality for shellgrid, including:
//! - Session orchestration over a PTY host (capacity, focus, lifecycle)
//! - Grid layout of the visible sessions
//! - Per-workspace persistence and restore of sessions and scrollback
//! - Terminal UI components

pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod layout;
pub mod logging;
pub mod persistence;
pub mod pty;
pub mod session;
pub mod ui;
pub mod workspace;

#[cfg(test)]
mod testing;

//! Shell session orchestration.
//!
//! This module provides:
//! - `SessionRegistry` - Ordered, capacity-bounded session descriptors
//! - `FocusController` - Fullscreen isolation of a single session
//! - `SessionManager` - Drives the registry against a PTY host and displays

pub mod focus;
pub mod manager;
pub mod registry;
pub mod types;

pub use focus::FocusController;
pub use manager::{ManagerEvent, ManagerState, SessionManager};
pub use registry::{InsertError, SessionRegistry};
pub use types::{CreateRequest, Session, SessionId, SessionStatus, MAX_SESSIONS};

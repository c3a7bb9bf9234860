//! Terminal UI components: the session grid, terminal panes, status line
//! and toasts.

pub mod grid;
pub mod status;
pub mod terminal_pane;
pub mod toast;

pub use grid::{compute_grid_rects, GridView};
pub use status::StatusLine;
pub use terminal_pane::{PaneInfo, TerminalPane};
pub use toast::{Toast, ToastManager, ToastType};

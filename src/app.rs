use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use ratatui::layout::Rect;

use crate::config::Config;
use crate::input::Command;
use crate::session::{CreateRequest, ManagerEvent, SessionId, SessionManager};
use crate::ui::{compute_grid_rects, PaneInfo, ToastManager, ToastType};
use crate::workspace::WorkspaceSwitchCoordinator;

/// Lines per scroll step when the pane size is not known yet.
const SCROLL_LINES: usize = 3;

/// Application state
pub struct App {
    pub manager: SessionManager,
    pub coordinator: WorkspaceSwitchCoordinator,
    pub config: Config,
    pub toasts: ToastManager,
    events: Receiver<ManagerEvent>,
    /// Shell, base label and cwd for Ctrl-N
    template: CreateRequest,
    /// Index into the pool of the pane receiving input (grid mode)
    selected: usize,
    /// User-requested creations not yet adopted; the next one adopted gets
    /// selected.
    awaiting_new: usize,
    /// Last size each PTY was told about
    pane_sizes: HashMap<SessionId, (u16, u16)>,
    pub should_quit: bool,
}

impl App {
    pub fn new(mut manager: SessionManager, config: Config, template: CreateRequest) -> Self {
        let events = manager.subscribe();
        Self {
            manager,
            coordinator: WorkspaceSwitchCoordinator::new(),
            config,
            toasts: ToastManager::new(),
            events,
            template,
            selected: 0,
            awaiting_new: 0,
            pane_sizes: HashMap::new(),
            should_quit: false,
        }
    }

    /// Session receiving keyboard input.
    pub fn selected_id(&self) -> Option<SessionId> {
        if let Some(focused) = self.manager.focused() {
            return Some(focused.to_string());
        }
        self.manager
            .sessions()
            .get(self.selected)
            .map(|s| s.id.clone())
    }

    /// Highlighted index among the visible panes.
    pub fn selected_pane(&self) -> usize {
        if self.manager.focused().is_some() {
            0
        } else {
            self.selected
        }
    }

    /// Switch to `workspace` (or to none) and report what came back.
    pub fn open_workspace(&mut self, workspace: Option<&str>) {
        let Some(report) = self.coordinator.sync(&mut self.manager, workspace) else {
            return;
        };

        for failure in &report.failures {
            self.toasts.push(failure.to_string(), ToastType::Error);
        }
        if let Some(to) = &report.to {
            if !report.restored.is_empty() {
                self.toasts.push(
                    format!("Restored {} session(s) in '{}'", report.restored.len(), to),
                    ToastType::Info,
                );
            } else {
                self.toasts.push(format!("Workspace '{to}'"), ToastType::Info);
            }
        }

        self.config.last_workspace = report.to;
        self.selected = 0;
        self.awaiting_new = 0;
        self.pane_sizes.clear();
    }

    /// Apply PTY output and background results, then turn manager events
    /// into toasts.
    pub fn tick(&mut self) {
        self.manager.pump();

        while let Ok(event) = self.events.try_recv() {
            match event {
                ManagerEvent::SessionAdded(id) if self.awaiting_new > 0 => {
                    self.awaiting_new -= 1;
                    if let Some(index) = self.manager.sessions().iter().position(|s| s.id == id) {
                        self.selected = index;
                    }
                }
                ManagerEvent::SessionRemoved(id) => {
                    self.pane_sizes.remove(&id);
                }
                ManagerEvent::SessionExited { id, exit_code } => {
                    let name = self.manager.get(&id).map_or(id.clone(), |s| s.name.clone());
                    let message = match exit_code {
                        Some(code) => format!("{name} exited ({code})"),
                        None => format!("{name} exited"),
                    };
                    self.toasts.push(message, ToastType::Info);
                }
                ManagerEvent::SessionFailed { message, .. } => {
                    self.toasts.push(message, ToastType::Error);
                }
                ManagerEvent::CreationFailed(message) => {
                    self.awaiting_new = self.awaiting_new.saturating_sub(1);
                    self.toasts.push(message, ToastType::Error);
                }
                _ => {}
            }
        }

        self.clamp_selection();
        self.toasts.update();
    }

    pub fn handle(&mut self, command: Command) {
        match command {
            Command::NewSession => self.new_session(),
            Command::CloseSelected => {
                if let Some(id) = self.selected_id() {
                    if let Err(e) = self.manager.close_session(&id) {
                        self.toasts.push(e.to_string(), ToastType::Error);
                    }
                    self.clamp_selection();
                }
            }
            Command::ToggleFocus => {
                if let Some(id) = self.selected_id() {
                    self.manager.toggle_focus(&id);
                    if let Some(index) = self.manager.sessions().iter().position(|s| s.id == id) {
                        self.selected = index;
                    }
                    self.pane_sizes.clear();
                }
            }
            Command::SelectPrev => self.move_selection(-1),
            Command::SelectNext => self.move_selection(1),
            Command::NextWorkspace => {
                let next = self
                    .config
                    .next_workspace(self.coordinator.current())
                    .map(str::to_string);
                match next {
                    Some(next) => self.open_workspace(Some(&next)),
                    None => self.toasts.push("No workspaces configured", ToastType::Warning),
                }
            }
            Command::ScrollUp => self.scroll(true),
            Command::ScrollDown => self.scroll(false),
            Command::Quit => self.should_quit = true,
            Command::Forward(bytes) => {
                if let Some(id) = self.selected_id() {
                    if let Some(display) = self.manager.display_mut(&id) {
                        display.scroll_to_bottom();
                    }
                    if let Err(e) = self.manager.write_input(&id, &bytes) {
                        log::debug!("dropping input: {e}");
                    }
                }
            }
            Command::Ignore => {}
        }
    }

    fn new_session(&mut self) {
        if !self.manager.can_create() {
            self.toasts.push(
                format!("Session limit reached ({})", self.manager.capacity_label()),
                ToastType::Warning,
            );
            return;
        }
        match self.manager.request_create(&self.template) {
            Ok(()) => self.awaiting_new += 1,
            Err(e) => self.toasts.push(e.to_string(), ToastType::Error),
        }
    }

    /// Page the selected pane by its own height.
    fn scroll(&mut self, up: bool) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let lines = self
            .pane_sizes
            .get(&id)
            .map_or(SCROLL_LINES, |(rows, _)| *rows as usize);
        if let Some(display) = self.manager.display_mut(&id) {
            if up {
                display.scroll_up(lines);
            } else {
                display.scroll_down(lines);
            }
        }
    }

    /// Move the selection in grid mode, wrapping around.
    fn move_selection(&mut self, delta: isize) {
        let len = self.manager.len();
        if len == 0 || self.manager.focused().is_some() {
            return;
        }
        self.selected = (self.selected as isize + delta).rem_euclid(len as isize) as usize;
    }

    fn clamp_selection(&mut self) {
        let len = self.manager.len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Resize every visible PTY to its pane (minus borders) and size new
    /// sessions for the slot they will land in.
    pub fn fit_panes(&mut self, area: Rect) {
        let ids: Vec<SessionId> = self
            .manager
            .visible_sessions()
            .iter()
            .map(|s| s.id.clone())
            .collect();

        let rects = compute_grid_rects(area, ids.len());
        for (id, rect) in ids.iter().zip(rects) {
            let size = inner_size(rect);
            if self.pane_sizes.get(id) == Some(&size) {
                continue;
            }
            match self.manager.resize_session(id, size.0, size.1) {
                Ok(()) => {
                    self.pane_sizes.insert(id.clone(), size);
                }
                Err(e) => log::debug!("resize failed: {e}"),
            }
        }

        let upcoming = compute_grid_rects(area, self.manager.len() + 1);
        if let Some(rect) = upcoming.last() {
            let (rows, cols) = inner_size(*rect);
            self.manager.set_default_size(rows, cols);
        }
    }

    /// Render data for the visible panes.
    pub fn panes(&self) -> Vec<PaneInfo<'_>> {
        self.manager
            .visible_sessions()
            .into_iter()
            .map(|session| {
                let display = self.manager.display(&session.id);
                PaneInfo {
                    session,
                    screen: display.map(|d| d.state()),
                    scroll_offset: display.map_or(0, |d| d.scroll_offset()),
                }
            })
            .collect()
    }

    /// Save the active workspace and close every session.
    pub fn shutdown(&mut self) {
        if let Some(outcome) = self.coordinator.shutdown(&mut self.manager) {
            log::info!("final save: {outcome:?}");
        }
        self.manager.shutdown();
    }
}

/// (rows, cols) inside a bordered pane.
fn inner_size(rect: Rect) -> (u16, u16) {
    (rect.height.saturating_sub(2).max(1), rect.width.saturating_sub(2).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::persistence::{MemoryStore, PersistenceController};
    use crate::testing::ScriptedHost;

    fn app_with(host: &Arc<ScriptedHost>, config: Config) -> App {
        let persistence = PersistenceController::new(Arc::new(MemoryStore::new()));
        let manager = SessionManager::new(host.clone(), persistence);
        App::new(manager, config, CreateRequest::new("/bin/zsh", "Zsh"))
    }

    fn new_session(app: &mut App) {
        let before = app.manager.len();
        app.handle(Command::NewSession);
        while app.manager.len() == before && app.manager.pending_creates() > 0 {
            app.tick();
            std::thread::yield_now();
        }
        app.tick();
    }

    #[test]
    fn new_sessions_are_selected() {
        let host = Arc::new(ScriptedHost::new());
        let mut app = app_with(&host, Config::default());

        new_session(&mut app);
        new_session(&mut app);

        assert_eq!(app.manager.len(), 2);
        assert_eq!(app.selected_id().as_deref(), Some("fake-1"));
    }

    #[test]
    fn selection_wraps_and_follows_close() {
        let host = Arc::new(ScriptedHost::new());
        let mut app = app_with(&host, Config::default());
        for _ in 0..3 {
            new_session(&mut app);
        }

        app.handle(Command::SelectNext);
        assert_eq!(app.selected_id().as_deref(), Some("fake-0"));
        app.handle(Command::SelectPrev);
        assert_eq!(app.selected_id().as_deref(), Some("fake-2"));

        app.handle(Command::CloseSelected);
        assert_eq!(app.manager.capacity_label(), "2/12");
        assert_eq!(app.selected_id().as_deref(), Some("fake-1"));
    }

    #[test]
    fn focus_isolates_selected_pane() {
        let host = Arc::new(ScriptedHost::new());
        let mut app = app_with(&host, Config::default());
        new_session(&mut app);
        new_session(&mut app);
        app.handle(Command::SelectPrev);

        app.handle(Command::ToggleFocus);
        assert_eq!(app.panes().len(), 1);
        assert_eq!(app.panes()[0].session.id, "fake-0");
        assert_eq!(app.selected_pane(), 0);

        app.handle(Command::ToggleFocus);
        assert_eq!(app.panes().len(), 2);
    }

    #[test]
    fn failed_creation_raises_toast() {
        let host = Arc::new(ScriptedHost::new());
        host.fail_shell("/bin/zsh");
        let mut app = app_with(&host, Config::default());

        new_session(&mut app);

        assert!(app.manager.is_empty());
        assert_eq!(app.toasts.len(), 1);
    }

    #[test]
    fn full_pool_warns_instead_of_creating() {
        let host = Arc::new(ScriptedHost::new());
        let mut app = app_with(&host, Config::default());
        for _ in 0..12 {
            new_session(&mut app);
        }
        let attempts = host.attempts().len();

        app.handle(Command::NewSession);

        assert_eq!(host.attempts().len(), attempts);
        assert_eq!(app.toasts.len(), 1);
    }

    #[test]
    fn next_workspace_cycles_configured_list() {
        let host = Arc::new(ScriptedHost::new());
        let config = Config {
            workspaces: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let mut app = app_with(&host, config);

        app.handle(Command::NextWorkspace);
        assert_eq!(app.coordinator.current(), Some("a"));
        new_session(&mut app);

        app.handle(Command::NextWorkspace);
        assert_eq!(app.coordinator.current(), Some("b"));
        assert!(app.manager.is_empty());

        app.handle(Command::NextWorkspace);
        assert_eq!(app.config.last_workspace.as_deref(), Some("a"));
        assert_eq!(app.manager.len(), 1);
    }

    #[test]
    fn page_keys_scroll_selected_pane_and_typing_returns_to_bottom() {
        let host = Arc::new(ScriptedHost::new());
        let mut app = app_with(&host, Config::default());
        new_session(&mut app);
        app.fit_panes(Rect::new(0, 0, 40, 6));
        for i in 0..20 {
            host.emit_output("fake-0", format!("line {i}\r\n").as_bytes());
        }
        app.tick();

        app.handle(Command::ScrollUp);
        assert_eq!(app.panes()[0].scroll_offset, 4);
        app.handle(Command::ScrollDown);
        assert_eq!(app.panes()[0].scroll_offset, 0);

        app.handle(Command::ScrollUp);
        app.handle(Command::Forward(b"l".to_vec()));
        assert_eq!(app.panes()[0].scroll_offset, 0);
    }

    #[test]
    fn fit_panes_sizes_each_grid_slot() {
        let host = Arc::new(ScriptedHost::new());
        let mut app = app_with(&host, Config::default());
        for _ in 0..3 {
            new_session(&mut app);
        }

        app.fit_panes(Rect::new(0, 0, 100, 40));

        assert_eq!(app.pane_sizes.get("fake-0"), Some(&(18, 48)));
        assert_eq!(app.pane_sizes.get("fake-2"), Some(&(18, 98)));
    }
}

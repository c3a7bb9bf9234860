use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{poll, read, DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    Frame, Terminal,
};

use shellgrid::app::App;
use shellgrid::config::{shell_label, Config};
use shellgrid::input::command_for_event;
use shellgrid::logging;
use shellgrid::persistence::{JsonFileStore, MemoryStore, PersistenceController, StateStore};
use shellgrid::pty::{NativePtyHost, PtyHost};
use shellgrid::session::{CreateRequest, SessionManager};
use shellgrid::ui::{GridView, StatusLine};

/// Run a pool of shells in a grid, restored per workspace.
#[derive(Debug, Parser)]
#[command(name = "shellgrid", version, about)]
struct Args {
    /// Workspace to open (defaults to the last one used)
    #[arg(short, long)]
    workspace: Option<String>,

    /// Shell executable for new sessions
    #[arg(short, long)]
    shell: Option<String>,

    /// Base label for new sessions, e.g. "Zsh"
    #[arg(short, long)]
    name: Option<String>,

    /// Directory holding saved workspaces
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Keep workspace state in memory only
    #[arg(long)]
    no_persist: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Check if we're in a proper terminal
    if !io::stdin().is_terminal() {
        anyhow::bail!("shellgrid must be run in an interactive terminal");
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("shellgrid: ignoring config: {e:#}");
        Config::default()
    });
    logging::init(config.log_level.as_deref())?;

    if let Some(shell) = &args.shell {
        config.shell = shell.clone();
    }
    let label = match &args.name {
        Some(name) => name.clone(),
        None if args.shell.is_some() => shell_label(&config.shell),
        None => config.session_label(),
    };

    let store: Arc<dyn StateStore> = if args.no_persist {
        Arc::new(MemoryStore::new())
    } else {
        match args.state_dir.clone().or_else(|| config.state_dir.clone()) {
            Some(dir) => Arc::new(JsonFileStore::new(dir)),
            None => Arc::new(JsonFileStore::open_default()?),
        }
    };

    let host = Arc::new(NativePtyHost::new());
    host.initialize().context("Failed to initialize terminal host")?;

    let manager = SessionManager::new(host.clone(), PersistenceController::new(store))
        .with_auto_save(config.auto_save && !args.no_persist);
    let template = CreateRequest {
        shell: config.shell.clone(),
        name: label,
        cwd: std::env::current_dir()
            .ok()
            .map(|d| d.to_string_lossy().to_string()),
    };
    let initial = args
        .workspace
        .clone()
        .or_else(|| config.last_workspace.clone())
        .or_else(|| config.workspaces.first().cloned());
    let mut app = App::new(manager, config, template);

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode - are you in a terminal?")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    // Size new sessions before the first restore spawns any.
    let size = terminal.size().context("Failed to get terminal size")?;
    app.fit_panes(grid_area(Rect::new(0, 0, size.width, size.height)));
    app.open_workspace(initial.as_deref());

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal (always try to restore even on error)
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen);
    let _ = terminal.show_cursor();

    app.shutdown();
    host.destroy();
    if let Err(e) = app.config.save() {
        log::warn!("could not save config: {e:#}");
    }
    log::logger().flush();

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // PTY output, exits, finished creations
        app.tick();

        let size = terminal.size()?;
        app.fit_panes(grid_area(Rect::new(0, 0, size.width, size.height)));

        terminal.draw(|f| draw_ui(f, app))?;

        // Handle events with timeout for PTY updates
        if poll(Duration::from_millis(30))? {
            if let Some(command) = command_for_event(read()?) {
                app.handle(command);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Everything but the status line.
fn grid_area(area: Rect) -> Rect {
    Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area)[0]
}

fn draw_ui(f: &mut Frame, app: &App) {
    let [grid, status] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(f.area());

    let panes = app.panes();
    f.render_widget(GridView::new(&panes, app.selected_pane()), grid);

    let capacity = app.manager.capacity_label();
    f.render_widget(
        StatusLine::new(
            app.manager.state(),
            app.coordinator.current(),
            &capacity,
            app.manager.can_create(),
        ),
        status,
    );

    app.toasts.render(f, grid);
}

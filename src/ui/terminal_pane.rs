use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Widget},
};

use crate::display::{CellAttrs, ScreenState, TermColor};
use crate::session::{Session, SessionStatus};

/// What one pane shows: the descriptor plus a snapshot of its display.
pub struct PaneInfo<'a> {
    pub session: &'a Session,
    pub screen: Option<ScreenState>,
    pub scroll_offset: usize,
}

/// Terminal pane widget for one session.
pub struct TerminalPane<'a> {
    pane: &'a PaneInfo<'a>,
    selected: bool,
}

impl<'a> TerminalPane<'a> {
    pub fn new(pane: &'a PaneInfo<'a>, selected: bool) -> Self {
        Self { pane, selected }
    }
}

/// " Zsh 2 ", " Zsh 2 [exited 127] ", " Zsh 2 [SCROLLED: -5] "
pub fn pane_title(session: &Session, scroll_offset: usize) -> String {
    let mut title = format!(" {}", session.name);
    match session.status {
        SessionStatus::Active => {}
        SessionStatus::Exited => match session.exit_code {
            Some(code) => title.push_str(&format!(" [exited {code}]")),
            None => title.push_str(" [exited]"),
        },
        SessionStatus::Error => title.push_str(" [error]"),
    }
    if scroll_offset > 0 {
        title.push_str(&format!(" [SCROLLED: -{scroll_offset}]"));
    }
    title.push(' ');
    title
}

impl Widget for TerminalPane<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = self.pane.session;
        let border_style = if !session.is_active() {
            Style::default().fg(Color::Red)
        } else if self.selected {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let block = Block::default()
            .title(pane_title(session, self.pane.scroll_offset))
            .borders(Borders::ALL)
            .border_style(border_style);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if let Some(screen) = &self.pane.screen {
            let show_cursor = self.selected && session.is_active() && self.pane.scroll_offset == 0;
            render_screen_state(screen, inner_area, buf, show_cursor);
        }
    }
}

fn render_screen_state(screen: &ScreenState, area: Rect, buf: &mut Buffer, show_cursor: bool) {
    for (row_idx, screen_row) in screen.rows.iter().enumerate() {
        if row_idx as u16 >= area.height {
            break;
        }
        let y = area.y + row_idx as u16;

        for (col_idx, cell) in screen_row.iter().enumerate() {
            if col_idx as u16 >= area.width {
                break;
            }
            if !cell.contents.is_empty() {
                let style = convert_cell_style(cell.fg, cell.bg, cell.attrs);
                buf.set_string(area.x + col_idx as u16, y, &cell.contents, style);
            }
        }
    }

    if show_cursor && screen.cursor_visible {
        let (cursor_row, cursor_col) = screen.cursor;
        let cursor_x = area.x + cursor_col;
        let cursor_y = area.y + cursor_row;

        if cursor_y < area.y + area.height && cursor_x < area.x + area.width {
            if let Some(cell) = buf.cell_mut((cursor_x, cursor_y)) {
                cell.set_style(Style::default().bg(Color::White).fg(Color::Black));
            }
        }
    }
}

fn convert_cell_style(fg: TermColor, bg: TermColor, attrs: CellAttrs) -> Style {
    let mut style = Style::default().fg(fg.to_ratatui()).bg(bg.to_ratatui());

    if attrs.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if attrs.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if attrs.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if attrs.inverse {
        style = style.add_modifier(Modifier::REVERSED);
    }

    style
}

//! One-line status bar: mode, workspace, pool usage and key hints.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::session::ManagerState;

pub struct StatusLine<'a> {
    state: ManagerState,
    workspace: Option<&'a str>,
    capacity: &'a str,
    can_create: bool,
}

impl<'a> StatusLine<'a> {
    pub fn new(
        state: ManagerState,
        workspace: Option<&'a str>,
        capacity: &'a str,
        can_create: bool,
    ) -> Self {
        Self {
            state,
            workspace,
            capacity,
            can_create,
        }
    }

    fn mode_indicator(&self) -> Span<'static> {
        match self.state {
            ManagerState::Empty => Span::styled(
                " -- EMPTY -- ",
                Style::default().fg(Color::Black).bg(Color::Blue),
            ),
            ManagerState::Populated => Span::styled(
                " -- GRID -- ",
                Style::default().fg(Color::Black).bg(Color::Green),
            ),
            ManagerState::Focused => Span::styled(
                " -- FOCUS -- ",
                Style::default().fg(Color::Black).bg(Color::Yellow),
            ),
        }
    }

    fn spans(&self) -> Vec<Span<'a>> {
        let key = Style::default().fg(Color::Cyan);
        let capacity_style = if self.can_create {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::Red)
        };

        let mut spans = vec![
            self.mode_indicator(),
            Span::raw(" "),
            Span::styled(self.workspace.unwrap_or("(no workspace)"), Style::default().fg(Color::Magenta)),
            Span::raw(" "),
            Span::styled(self.capacity, capacity_style),
            Span::raw(" "),
        ];
        if self.can_create {
            spans.extend([Span::styled(" C-n ", key), Span::raw("new ")]);
        }
        spans.extend([
            Span::styled(" C-w ", key),
            Span::raw("close "),
            Span::styled(" C-f ", key),
            Span::raw("focus "),
            Span::styled(" M-←/→ ", key),
            Span::raw("select "),
            Span::styled(" C-t ", key),
            Span::raw("workspace "),
            Span::styled(" C-q ", key),
            Span::raw("quit"),
        ]);
        spans
    }
}

impl Widget for StatusLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(Line::from(self.spans()))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &StatusLine) -> String {
        line.spans().iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn shows_workspace_and_capacity() {
        let line = StatusLine::new(ManagerState::Populated, Some("work"), "3/12", true);
        let rendered = text(&line);
        assert!(rendered.contains("work"));
        assert!(rendered.contains("3/12"));
        assert!(rendered.contains("new"));
    }

    #[test]
    fn full_pool_hides_new_hint() {
        let line = StatusLine::new(ManagerState::Focused, None, "12/12", false);
        let rendered = text(&line);
        assert!(rendered.contains("FOCUS"));
        assert!(rendered.contains("(no workspace)"));
        assert!(!rendered.contains("new "));
    }
}

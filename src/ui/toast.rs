//! Short-lived notifications drawn over the grid.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastType {
    Info,
    Warning,
    Error,
}

impl ToastType {
    fn color(self) -> Color {
        match self {
            ToastType::Info => Color::Cyan,
            ToastType::Warning => Color::Yellow,
            ToastType::Error => Color::Red,
        }
    }

    fn icon(self) -> &'static str {
        match self {
            ToastType::Info => "ℹ",
            ToastType::Warning => "⚠",
            ToastType::Error => "✗",
        }
    }

    /// Errors stay up longer than notices.
    fn lifetime(self) -> Duration {
        match self {
            ToastType::Error => Duration::from_secs(6),
            ToastType::Info | ToastType::Warning => Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub toast_type: ToastType,
    pub created_at: Instant,
    pub duration: Duration,
}

impl Toast {
    pub fn new(message: impl Into<String>, toast_type: ToastType) -> Self {
        Self {
            message: message.into(),
            toast_type,
            created_at: Instant::now(),
            duration: toast_type.lifetime(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.duration
    }
}

pub struct ToastManager {
    queue: VecDeque<Toast>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, toast_type: ToastType) {
        self.push_toast(Toast::new(message, toast_type));
    }

    pub fn push_toast(&mut self, toast: Toast) {
        self.queue.push_back(toast);
        while self.queue.len() > self.max_visible {
            self.queue.pop_front();
        }
    }

    /// Drop expired toasts.
    pub fn update(&mut self) {
        self.queue.retain(|t| !t.is_expired());
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Stack the toasts in the bottom-right corner of `area`, newest lowest.
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let width = 44u16.min(area.width);
        let height = 4u16.min(area.height);

        for (idx, toast) in self.queue.iter().rev().enumerate() {
            let offset = idx as u16 * (height + 1);
            let Some(y) = area.bottom().checked_sub(height + 1 + offset) else {
                break;
            };
            if y < area.top() {
                break;
            }
            let x = area.right().saturating_sub(width + 1).max(area.left());
            let toast_area = Rect::new(x, y, width, height);

            let style = Style::default().fg(toast.toast_type.color());
            let text = Paragraph::new(Line::from(vec![
                Span::styled(toast.toast_type.icon(), style.add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::raw(toast.message.as_str()),
            ]))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(style)
                    .style(Style::default().bg(Color::Black)),
            );

            frame.render_widget(Clear, toast_area);
            frame.render_widget(text, toast_area);
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}

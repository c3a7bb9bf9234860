//! Grid view: renders the visible sessions in a gap-free grid.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::layout::{grid_slots, rows_for};
use crate::ui::terminal_pane::{PaneInfo, TerminalPane};

/// Compute grid sub-rects for `count` panes.
///
/// Rows follow [`rows_for`]. Within a row panes share the width evenly; the
/// last row and the last pane of each row absorb rounding remainders, so the
/// rects tile `area` exactly.
pub fn compute_grid_rects(area: Rect, count: usize) -> Vec<Rect> {
    let rows = rows_for(count);
    if rows.is_empty() {
        return vec![];
    }

    let row_height = area.height / rows.len() as u16;

    grid_slots(&rows)
        .into_iter()
        .map(|slot| {
            let y = area.y + slot.row as u16 * row_height;
            let h = if slot.row == rows.len() - 1 {
                // Last row gets remaining height
                area.height - slot.row as u16 * row_height
            } else {
                row_height
            };

            let col_width = area.width / slot.cols_in_row as u16;
            let x = area.x + slot.col as u16 * col_width;
            let w = if slot.col == slot.cols_in_row - 1 {
                area.width - slot.col as u16 * col_width
            } else {
                col_width
            };

            Rect::new(x, y, w, h)
        })
        .collect()
}

/// Grid widget over the visible sessions.
pub struct GridView<'a> {
    panes: &'a [PaneInfo<'a>],
    /// Index of the currently selected pane
    selected: usize,
}

impl<'a> GridView<'a> {
    pub fn new(panes: &'a [PaneInfo<'a>], selected: usize) -> Self {
        Self { panes, selected }
    }
}

impl Widget for GridView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.panes.is_empty() {
            let text = "No sessions. Press Ctrl-N to start a shell";
            let x = area.x + (area.width.saturating_sub(text.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, text, Style::default().fg(Color::DarkGray));
            }
            return;
        }

        let rects = compute_grid_rects(area, self.panes.len());
        for (i, (pane, rect)) in self.panes.iter().zip(rects).enumerate() {
            TerminalPane::new(pane, i == self.selected).render(rect, buf);
        }
    }
}

//! Terminal displays: the sole owners of rendering state and scrollback.
//!
//! The orchestrator feeds PTY output into a display and, at save time, reads
//! its scrollback back out through the narrow [`Display`] interface. It never
//! reaches into the emulator directly.

pub mod screen;

pub use screen::{screen_state_from_vt100, CellAttrs, ScreenState, TermColor};

/// Number of scrollback lines to retain in terminal history per session.
pub const SCROLLBACK_LINES: usize = 10000;

/// Raw output kept per session for scrollback capture.
pub const HISTORY_BYTES: usize = 512 * 1024;

/// A text-grid display bound to one session.
pub trait Display {
    /// Open a display surface of the given size.
    fn open(rows: u16, cols: u16) -> Self
    where
        Self: Sized;

    /// Feed raw PTY output.
    fn write(&mut self, data: &[u8]);

    /// Point-in-time capture of the whole buffered output as plain text,
    /// trailing blank lines removed.
    fn scrollback(&mut self) -> String;

    /// Paint previously captured text without sending it through the shell.
    fn write_to_display(&mut self, text: &str);

    fn resize(&mut self, rows: u16, cols: u16);
}

/// `vt100`-backed display.
///
/// vt100 only lets the view scroll back one screen height, so the capture
/// replays the raw output log into a parser tall enough to hold all of it.
pub struct VtDisplay {
    parser: vt100::Parser,
    /// Current scroll offset (0 = live/bottom, positive = lines scrolled up)
    scroll_offset: usize,
    /// Raw bytes fed to the parser, oldest trimmed at a line boundary
    history: Vec<u8>,
}

impl VtDisplay {
    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    /// Screen contents for rendering.
    pub fn state(&self) -> ScreenState {
        screen_state_from_vt100(&self.parser)
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Scroll up by the specified number of lines, at most one screen.
    pub fn scroll_up(&mut self, lines: usize) {
        let (rows, _) = self.parser.screen().size();
        let desired_offset = self.scroll_offset.saturating_add(lines).min(rows as usize);
        self.parser.set_scrollback(desired_offset);
        // Read back actual offset (clamped by parser)
        self.scroll_offset = self.parser.screen().scrollback();
    }

    /// Scroll down by the specified number of lines.
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
        self.parser.set_scrollback(self.scroll_offset);
    }

    /// Jump to the bottom (live view).
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
        self.parser.set_scrollback(0);
    }

    fn record(&mut self, data: &[u8]) {
        self.history.extend_from_slice(data);
        if self.history.len() > HISTORY_BYTES + HISTORY_BYTES / 4 {
            let excess = self.history.len() - HISTORY_BYTES;
            // Start the kept log at column 0.
            let cut = self.history[excess..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(excess, |i| excess + i + 1);
            self.history.drain(..cut);
        }
    }

    /// Every line of the recorded output, oldest first.
    fn all_lines(&self) -> Vec<String> {
        let (rows, cols) = self.parser.screen().size();
        let newlines = self.history.iter().filter(|&&b| b == b'\n').count();
        let wraps = self.history.len() / cols.max(1) as usize;
        let tall = (newlines + wraps + rows as usize + 1)
            .min(SCROLLBACK_LINES + rows as usize)
            .min(u16::MAX as usize) as u16;

        let mut replay = vt100::Parser::new(tall, cols, 0);
        replay.process(&self.history);
        replay.screen().rows(0, cols).collect()
    }
}

impl Display for VtDisplay {
    fn open(rows: u16, cols: u16) -> Self {
        Self {
            parser: vt100::Parser::new(rows, cols, SCROLLBACK_LINES),
            scroll_offset: 0,
            history: Vec::new(),
        }
    }

    fn write(&mut self, data: &[u8]) {
        self.parser.process(data);
        self.record(data);
        // vt100 resets the view on output; keep a scrolled-up user where they were.
        self.parser.set_scrollback(self.scroll_offset);
    }

    fn scrollback(&mut self) -> String {
        let lines = self.all_lines();
        let end = lines
            .iter()
            .rposition(|line| !line.trim_end().is_empty())
            .map_or(0, |i| i + 1);
        lines[..end]
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn write_to_display(&mut self, text: &str) {
        // Bare newlines would only move down, not back to column 0.
        let mut normalized = text.replace("\r\n", "\n").replace('\n', "\r\n");
        normalized.push_str("\r\n");
        self.parser.process(normalized.as_bytes());
        self.record(normalized.as_bytes());
    }

    fn resize(&mut self, rows: u16, cols: u16) {
        self.parser.set_size(rows, cols);
        self.scroll_to_bottom();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrollback_trims_trailing_blank_lines() {
        let mut display = VtDisplay::open(5, 20);
        display.write(b"hello\r\nworld\r\n");
        assert_eq!(display.scrollback(), "hello\nworld");
    }

    #[test]
    fn scrollback_includes_lines_scrolled_off_screen() {
        let mut display = VtDisplay::open(3, 20);
        for i in 0..10 {
            display.write(format!("line {i}\r\n").as_bytes());
        }
        let captured = display.scrollback();
        let lines: Vec<_> = captured.lines().collect();
        assert_eq!(lines.first(), Some(&"line 0"));
        assert_eq!(lines.last(), Some(&"line 9"));
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn empty_display_has_empty_scrollback() {
        let mut display = VtDisplay::open(4, 10);
        assert_eq!(display.scrollback(), "");
    }

    #[test]
    fn write_to_display_restores_text_verbatim() {
        let mut display = VtDisplay::open(6, 30);
        display.write_to_display("$ ls\nCargo.toml  src");
        assert_eq!(display.scrollback(), "$ ls\nCargo.toml  src");
    }

    #[test]
    fn capture_preserves_user_scroll_position() {
        let mut display = VtDisplay::open(3, 20);
        for i in 0..10 {
            display.write(format!("line {i}\r\n").as_bytes());
        }
        display.scroll_up(2);
        let before = display.scroll_offset();
        assert_eq!(before, 2);
        let _ = display.scrollback();
        assert_eq!(display.scroll_offset(), before);
        assert_eq!(display.screen().scrollback(), before);
    }

    #[test]
    fn capture_reaches_history_deeper_than_one_screen() {
        let mut display = VtDisplay::open(24, 80);
        for i in 0..60 {
            display.write(format!("output {i}\r\n").as_bytes());
        }
        let captured = display.scrollback();
        let lines: Vec<_> = captured.lines().collect();
        assert_eq!(lines.len(), 60);
        assert_eq!(lines[0], "output 0");
        assert_eq!(lines[59], "output 59");
    }

    #[test]
    fn scroll_up_stops_at_one_screen() {
        let mut display = VtDisplay::open(3, 20);
        for i in 0..10 {
            display.write(format!("line {i}\r\n").as_bytes());
        }
        display.scroll_up(100);
        assert_eq!(display.scroll_offset(), 3);
        assert!(display.state().rows.len() <= 3);
        display.scroll_down(1);
        assert_eq!(display.scroll_offset(), 2);
    }

    #[test]
    fn wrapped_lines_survive_capture() {
        let mut display = VtDisplay::open(3, 10);
        display.write(b"0123456789abcde\r\nnext\r\n");
        assert_eq!(display.scrollback(), "0123456789\nabcde\nnext");
    }

    #[test]
    fn history_is_trimmed_at_a_line_boundary() {
        let mut display = VtDisplay::open(3, 20);
        for i in 0..60_000 {
            display.write(format!("line {i:06}\r\n").as_bytes());
        }
        assert!(display.history.len() <= HISTORY_BYTES + HISTORY_BYTES / 4);

        let captured = display.scrollback();
        let lines: Vec<_> = captured.lines().collect();
        assert!(lines[0].starts_with("line "));
        assert_eq!(lines[0].len(), "line 000000".len());
        assert_eq!(lines.last(), Some(&"line 059999"));
    }
}

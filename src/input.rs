//! Key bindings: app commands on Ctrl/Alt chords, everything else goes to
//! the selected shell.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewSession,
    CloseSelected,
    ToggleFocus,
    SelectPrev,
    SelectNext,
    NextWorkspace,
    /// Page the selected pane's view back through history
    ScrollUp,
    ScrollDown,
    Quit,
    /// Raw bytes for the selected session's PTY
    Forward(Vec<u8>),
    /// Nothing to do
    Ignore,
}

pub fn command_for(key: KeyEvent) -> Command {
    match (key.code, key.modifiers) {
        (KeyCode::Char('n'), KeyModifiers::CONTROL) => Command::NewSession,
        (KeyCode::Char('w'), KeyModifiers::CONTROL) => Command::CloseSelected,
        (KeyCode::Char('f'), KeyModifiers::CONTROL) => Command::ToggleFocus,
        (KeyCode::Char('t'), KeyModifiers::CONTROL) => Command::NextWorkspace,
        (KeyCode::Char('q'), KeyModifiers::CONTROL) => Command::Quit,
        (KeyCode::Left, KeyModifiers::ALT) => Command::SelectPrev,
        (KeyCode::Right, KeyModifiers::ALT) => Command::SelectNext,
        (KeyCode::PageUp, KeyModifiers::SHIFT) => Command::ScrollUp,
        (KeyCode::PageDown, KeyModifiers::SHIFT) => Command::ScrollDown,
        _ => {
            let bytes = key_to_bytes(key);
            if bytes.is_empty() {
                Command::Ignore
            } else {
                Command::Forward(bytes)
            }
        }
    }
}

/// Command for a terminal event. Key releases, mouse and resize events map
/// to nothing; a bracketed paste goes to the shell as one chunk.
pub fn command_for_event(event: Event) -> Option<Command> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(command_for(key)),
        Event::Paste(text) => Some(Command::Forward(text.into_bytes())),
        _ => None,
    }
}

/// Encode a key the way a terminal would send it to the shell.
pub fn key_to_bytes(key: KeyEvent) -> Vec<u8> {
    match (key.code, key.modifiers) {
        (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        (KeyCode::Char(c), KeyModifiers::CONTROL) if c.is_ascii_alphabetic() => {
            // Control characters: Ctrl+A = 0x01, Ctrl+B = 0x02, etc.
            vec![(c.to_ascii_lowercase() as u8) - b'a' + 1]
        }
        (KeyCode::Char(c), KeyModifiers::ALT) => {
            let mut bytes = vec![0x1b];
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            bytes
        }
        (KeyCode::Enter, _) => vec![b'\r'],
        (KeyCode::Backspace, _) => vec![0x7f],
        (KeyCode::Tab, _) => vec![b'\t'],
        (KeyCode::BackTab, _) => vec![0x1b, b'[', b'Z'],
        (KeyCode::Esc, _) => vec![0x1b],
        (KeyCode::Up, _) => vec![0x1b, b'[', b'A'],
        (KeyCode::Down, _) => vec![0x1b, b'[', b'B'],
        (KeyCode::Right, _) => vec![0x1b, b'[', b'C'],
        (KeyCode::Left, _) => vec![0x1b, b'[', b'D'],
        (KeyCode::Home, _) => vec![0x1b, b'[', b'H'],
        (KeyCode::End, _) => vec![0x1b, b'[', b'F'],
        (KeyCode::PageUp, _) => vec![0x1b, b'[', b'5', b'~'],
        (KeyCode::PageDown, _) => vec![0x1b, b'[', b'6', b'~'],
        (KeyCode::Delete, _) => vec![0x1b, b'[', b'3', b'~'],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn app_chords_are_commands() {
        assert_eq!(command_for(key(KeyCode::Char('n'), KeyModifiers::CONTROL)), Command::NewSession);
        assert_eq!(command_for(key(KeyCode::Right, KeyModifiers::ALT)), Command::SelectNext);
        assert_eq!(command_for(key(KeyCode::Char('q'), KeyModifiers::CONTROL)), Command::Quit);
    }

    #[test]
    fn shifted_page_keys_scroll_instead_of_forwarding() {
        assert_eq!(command_for(key(KeyCode::PageUp, KeyModifiers::SHIFT)), Command::ScrollUp);
        assert_eq!(command_for(key(KeyCode::PageDown, KeyModifiers::SHIFT)), Command::ScrollDown);
        assert_eq!(
            command_for(key(KeyCode::PageUp, KeyModifiers::NONE)),
            Command::Forward(b"\x1b[5~".to_vec())
        );
    }

    #[test]
    fn other_keys_are_forwarded() {
        assert_eq!(
            command_for(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Command::Forward(vec![0x03])
        );
        assert_eq!(
            command_for(key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Command::Forward(b"A".to_vec())
        );
        assert_eq!(command_for(key(KeyCode::Up, KeyModifiers::NONE)), Command::Forward(b"\x1b[A".to_vec()));
        assert_eq!(command_for(key(KeyCode::F(5), KeyModifiers::NONE)), Command::Ignore);
    }

    #[test]
    fn pastes_are_forwarded_whole() {
        assert_eq!(
            command_for_event(Event::Paste("echo hi\nls".to_string())),
            Some(Command::Forward(b"echo hi\nls".to_vec()))
        );
        assert_eq!(
            command_for_event(Event::Key(key(KeyCode::Char('n'), KeyModifiers::CONTROL))),
            Some(Command::NewSession)
        );
        assert_eq!(command_for_event(Event::FocusGained), None);
    }

    #[test]
    fn non_ascii_chars_are_utf8_encoded() {
        assert_eq!(key_to_bytes(key(KeyCode::Char('é'), KeyModifiers::NONE)), "é".as_bytes());
        assert_eq!(key_to_bytes(key(KeyCode::Char('b'), KeyModifiers::ALT)), b"\x1bb");
    }
}

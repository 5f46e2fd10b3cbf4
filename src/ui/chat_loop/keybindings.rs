//! Key and mouse handling for the chat loop.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tui_textarea::Input as TAInput;

use crate::core::app::{App, TurnTicket};

/// Lines moved per mouse wheel notch.
const WHEEL_STEP: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Submit,
    InsertNewline,
    Quit,
    ScrollUp(u16),
    ScrollDown(u16),
    /// Anything else goes to the input box.
    Edit,
}

/// `page` is the number of transcript rows currently visible. While the input
/// holds more than one line, Up and Down move its cursor instead of scrolling;
/// with Ctrl held they always scroll.
pub fn classify_key(key: &KeyEvent, page: u16, multiline_input: bool) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Char('c') if ctrl => KeyAction::Quit,
        KeyCode::Enter if alt => KeyAction::InsertNewline,
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Up | KeyCode::Down if multiline_input && !ctrl => KeyAction::Edit,
        KeyCode::Up => KeyAction::ScrollUp(1),
        KeyCode::Down => KeyAction::ScrollDown(1),
        KeyCode::PageUp => KeyAction::ScrollUp(page.max(1)),
        KeyCode::PageDown => KeyAction::ScrollDown(page.max(1)),
        _ => KeyAction::Edit,
    }
}

/// Applies a key press to the app. Returns a ticket when the press started a
/// new turn.
pub fn handle_key(app: &mut App, key: KeyEvent, page: u16) -> Option<TurnTicket> {
    let multiline_input = app.ui.textarea.lines().len() > 1;
    match classify_key(&key, page, multiline_input) {
        KeyAction::Quit => app.request_exit(),
        KeyAction::Submit => return app.submit_input(),
        KeyAction::InsertNewline => app.ui.insert_newline(),
        KeyAction::ScrollUp(lines) => app.ui.scroll_up(lines),
        KeyAction::ScrollDown(lines) => app.ui.scroll_down(lines),
        KeyAction::Edit => {
            app.ui.textarea.input(TAInput::from(key));
        }
    }
    None
}

pub fn handle_mouse(app: &mut App, mouse: MouseEvent) -> bool {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.ui.scroll_up(WHEEL_STEP);
            true
        }
        MouseEventKind::ScrollDown => {
            app.ui.scroll_down(WHEEL_STEP);
            true
        }
        _ => false,
    }
}

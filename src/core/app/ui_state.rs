use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders};
use tui_textarea::TextArea;

use crate::utils::scroll::ScrollCalculator;

/// Tallest the input box grows before it starts scrolling internally.
pub const MAX_INPUT_ROWS: u16 = 6;

/// Terminal-facing state: the input box and the transcript viewport.
pub struct UiState {
    pub textarea: TextArea<'static>,
    pub scroll_offset: u16,
    /// Follow new output. Cleared when the user scrolls up, restored when they
    /// scroll back to the bottom.
    pub auto_scroll: bool,
    max_scroll: u16,
    pub exit_requested: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            textarea: Self::fresh_textarea(),
            scroll_offset: 0,
            auto_scroll: true,
            max_scroll: 0,
            exit_requested: false,
        }
    }

    fn fresh_textarea() -> TextArea<'static> {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());
        textarea.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
        textarea.set_placeholder_text("Type a message...");
        textarea.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Your Message (Enter to send, Alt+Enter for a new line) "),
        );
        textarea
    }

    pub fn input_text(&self) -> String {
        self.textarea.lines().join("\n")
    }

    /// Removes and returns the trimmed input. Blank input is left in place and
    /// yields `None`.
    pub fn take_input(&mut self) -> Option<String> {
        let text = self.input_text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let message = trimmed.to_string();
        self.textarea = Self::fresh_textarea();
        Some(message)
    }

    pub fn insert_newline(&mut self) {
        self.textarea.insert_newline();
    }

    /// Rows the input box needs, including its border.
    pub fn input_area_height(&self) -> u16 {
        let rows = u16::try_from(self.textarea.lines().len()).unwrap_or(MAX_INPUT_ROWS);
        rows.clamp(1, MAX_INPUT_ROWS) + 2
    }

    /// Recomputes the scroll bounds after a layout pass and pins the view to
    /// the bottom while auto-scroll is on.
    pub fn sync_scroll(&mut self, total_lines: usize, available_height: u16) {
        self.max_scroll = ScrollCalculator::max_scroll_offset(total_lines, available_height);
        if self.auto_scroll {
            self.scroll_offset = self.max_scroll;
        } else {
            self.scroll_offset = self.scroll_offset.min(self.max_scroll);
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
        self.auto_scroll = self.scroll_offset >= self.max_scroll;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines).min(self.max_scroll);
        self.auto_scroll = self.scroll_offset >= self.max_scroll;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll;
        self.auto_scroll = true;
    }
}

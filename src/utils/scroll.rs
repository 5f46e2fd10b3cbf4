use crate::core::message::{TranscriptEntry, TranscriptRole};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::VecDeque;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Turns the transcript into width-aware display lines and handles the scroll
/// math on top of them.
///
/// Lines are wrapped here rather than by ratatui so that the line count used
/// for scrolling is exactly what ends up on screen.
pub struct ScrollCalculator;

impl ScrollCalculator {
    pub fn build_display_lines(
        entries: &VecDeque<TranscriptEntry>,
        persona_name: &str,
        terminal_width: u16,
    ) -> Vec<Line<'static>> {
        let width = terminal_width as usize;
        let mut lines = Vec::new();

        for entry in entries {
            let (prefix, prefix_style, body_style) = Self::entry_styles(entry.role, persona_name);
            let mut first = true;

            for logical in entry.content.split('\n') {
                let text = if first {
                    format!("{prefix}{logical}")
                } else {
                    logical.to_string()
                };
                let rows = wrap_text(&text, width);

                for row in rows {
                    if first && !prefix.is_empty() {
                        lines.push(Self::split_prefix(row, &prefix, prefix_style, body_style));
                    } else {
                        lines.push(Line::from(Span::styled(row, body_style)));
                    }
                    first = false;
                }
            }

            // Conversation messages are separated by a blank line; app notices
            // stay compact.
            if !entry.role.is_app() {
                lines.push(Line::from(""));
            }
        }

        lines
    }

    fn entry_styles(role: TranscriptRole, persona_name: &str) -> (String, Style, Style) {
        match role {
            TranscriptRole::User => (
                "You: ".to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                Style::default(),
            ),
            TranscriptRole::Assistant => (
                format!("{persona_name}: "),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                Style::default(),
            ),
            TranscriptRole::AppInfo => (
                String::new(),
                Style::default(),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ),
            TranscriptRole::AppWarning => (
                String::new(),
                Style::default(),
                Style::default().fg(Color::Yellow),
            ),
            TranscriptRole::AppError => (
                String::new(),
                Style::default(),
                Style::default().fg(Color::Red),
            ),
        }
    }

    /// Styles the speaker prefix separately from the message body. A prefix
    /// that was itself wrapped (very narrow terminals) is styled as far as it
    /// reaches on the first row.
    fn split_prefix(
        row: String,
        prefix: &str,
        prefix_style: Style,
        body_style: Style,
    ) -> Line<'static> {
        let prefix = prefix.trim_end();
        let split = if row.starts_with(prefix) {
            prefix.len()
        } else {
            row.len()
        };
        let (head, tail) = row.split_at(split);
        let mut spans = vec![Span::styled(head.to_string(), prefix_style)];
        if !tail.is_empty() {
            spans.push(Span::styled(tail.to_string(), body_style));
        }
        Line::from(spans)
    }

    /// Largest useful scroll offset: the one that puts the last line at the
    /// bottom of the viewport.
    pub fn max_scroll_offset(total_lines: usize, available_height: u16) -> u16 {
        let total = u16::try_from(total_lines).unwrap_or(u16::MAX);
        total.saturating_sub(available_height)
    }
}

/// Greedy word wrap by display width. Spacing inside a row is kept as written,
/// so indentation survives; a whitespace run where a row breaks is dropped.
/// Words wider than `width` are broken across rows. A width of zero disables
/// wrapping.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for (run, is_space) in whitespace_runs(text) {
        let run_width = run.width();
        if current_width + run_width <= width {
            current.push_str(run);
            current_width += run_width;
            continue;
        }

        if is_space {
            if current_width > 0 {
                rows.push(finish_row(&mut current));
                current_width = 0;
            }
            continue;
        }

        if current_width > 0 {
            if current.trim().is_empty() {
                current.clear();
            } else {
                rows.push(finish_row(&mut current));
            }
            current_width = 0;
        }

        if run_width <= width {
            current.push_str(run);
            current_width = run_width;
            continue;
        }

        for ch in run.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if current_width + ch_width > width && current_width > 0 {
                rows.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += ch_width;
        }
    }

    if !current.is_empty() || rows.is_empty() {
        rows.push(finish_row(&mut current));
    }
    rows
}

/// Splits `text` into alternating runs of whitespace and non-whitespace.
fn whitespace_runs(text: &str) -> impl Iterator<Item = (&str, bool)> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_space = first.is_whitespace();
        let end = rest
            .find(|c: char| c.is_whitespace() != is_space)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some((run, is_space))
    })
}

fn finish_row(current: &mut String) -> String {
    let mut row = std::mem::take(current);
    row.truncate(row.trim_end().len());
    row
}

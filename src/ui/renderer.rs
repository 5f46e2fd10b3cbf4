use crate::core::app::App;
use crate::utils::scroll::ScrollCalculator;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn ui(f: &mut Frame, app: &mut App) {
    let input_area_height = app.ui.input_area_height();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(input_area_height),
            Constraint::Length(1),
        ])
        .split(f.area());

    // Wrap against the inner width so the scroll math counts what is drawn.
    let transcript_area = chunks[0];
    let inner_width = transcript_area.width.saturating_sub(2);
    let available_height = transcript_area.height.saturating_sub(2);
    let lines =
        ScrollCalculator::build_display_lines(&app.transcript, &app.persona_name, inner_width);
    app.ui.sync_scroll(lines.len(), available_height);

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Chat History"))
        .scroll((app.ui.scroll_offset, 0));
    f.render_widget(transcript, transcript_area);

    f.render_widget(&app.ui.textarea, chunks[1]);

    let status_style = if app.is_processing() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    f.render_widget(Paragraph::new(app.status_line()).style(status_style), chunks[2]);
}

//! Main chat event loop.
//!
//! One loop owns the [`App`] and the terminal. Terminal input arrives from a
//! reader task and turn results arrive from worker tasks, both over the same
//! channel; the loop drains it every tick, redraws when something changed, and
//! sleeps briefly when idle.

mod keybindings;
mod turns;

pub use self::turns::{TurnRunner, TurnUpdate};

use crate::core::app::App;
use crate::core::orchestrator::Orchestrator;
use crate::ui::renderer::ui;
use ratatui::crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
    Turn(TurnUpdate),
}

/// Rows of transcript a page scroll moves by, derived from the terminal
/// height minus the input box, status bar and borders.
fn page_height(app: &App, term_height: u16) -> u16 {
    term_height
        .saturating_sub(app.ui.input_area_height())
        .saturating_sub(3)
}

struct EventProcessingOutcome {
    events_processed: bool,
    request_redraw: bool,
}

fn process_ui_events(
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    runner: &TurnRunner,
    term_height: u16,
) -> EventProcessingOutcome {
    let mut outcome = EventProcessingOutcome {
        events_processed: false,
        request_redraw: false,
    };

    while let Ok(ev) = event_rx.try_recv() {
        outcome.events_processed = true;
        match ev {
            UiEvent::Crossterm(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                let page = page_height(app, term_height);
                if let Some(ticket) = keybindings::handle_key(app, key, page) {
                    runner.spawn(ticket);
                }
                outcome.request_redraw = true;
                if app.ui.exit_requested {
                    break;
                }
            }
            UiEvent::Crossterm(Event::Mouse(mouse)) => {
                if keybindings::handle_mouse(app, mouse) {
                    outcome.request_redraw = true;
                }
            }
            UiEvent::Crossterm(Event::Resize(_, _)) => {
                outcome.request_redraw = true;
            }
            UiEvent::Crossterm(_) => {}
            UiEvent::Turn(update) => {
                apply_turn_update(app, runner, update);
                outcome.request_redraw = true;
            }
        }
    }

    outcome
}

fn apply_turn_update(app: &mut App, runner: &TurnRunner, update: TurnUpdate) {
    let next = match update {
        TurnUpdate::Progress { id, event } => {
            app.apply_turn_event(id, &event);
            None
        }
        TurnUpdate::Completed { id, turn } => app.complete_turn(id, turn),
        TurnUpdate::Failed { id, error } => app.fail_turn(id, &error),
    };
    if let Some(ticket) = next {
        runner.spawn(ticket);
    }
}

pub async fn run_chat(
    orchestrator: Arc<Orchestrator>,
    persona_name: String,
) -> Result<(), Box<dyn Error>> {
    let mut app = App::new(persona_name);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let shutdown = CancellationToken::new();
    let runner = TurnRunner::new(orchestrator, event_tx.clone(), shutdown.clone());

    // Spawn async event reader task
    let event_reader_handle = {
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            loop {
                if let Ok(true) = event::poll(Duration::from_millis(10)) {
                    match event::read() {
                        Ok(ev) => {
                            if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                                break;
                            }
                        }
                        Err(_) => continue,
                    }
                } else {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    const MAX_FPS: u64 = 60;
    let frame_duration = Duration::from_millis(1000 / MAX_FPS);
    let mut last_draw = Instant::now() - frame_duration;
    let mut request_redraw = true;

    let result: Result<(), Box<dyn Error>> = loop {
        if app.ui.exit_requested {
            break Ok(());
        }

        if request_redraw && last_draw.elapsed() >= frame_duration {
            if let Err(err) = terminal.draw(|f| ui(f, &mut app)) {
                break Err(err.into());
            }
            last_draw = Instant::now();
            request_redraw = false;
        }

        let term_height = terminal.size().map(|size| size.height).unwrap_or_default();
        let outcome = process_ui_events(&mut app, &mut event_rx, &runner, term_height);
        if outcome.request_redraw {
            request_redraw = true;
        }

        if !outcome.events_processed && !request_redraw {
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
    };

    info!(history = app.history().len(), "chat loop exiting");
    shutdown.cancel();
    event_reader_handle.abort();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

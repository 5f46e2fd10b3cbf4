//! Application state owned by the UI loop.
//!
//! The transcript, the committed history and the turn queue are only mutated
//! here, on the UI loop. Workers receive a [`TurnTicket`] holding a history
//! snapshot and report back through [`App::complete_turn`] or
//! [`App::fail_turn`].

use std::collections::VecDeque;

use tracing::debug;

use crate::core::message::{ConversationHistory, Message, TranscriptEntry};
use crate::core::orchestrator::{CompletedTurn, TurnError, TurnEvent, Verdict};

pub mod ui_state;

pub use ui_state::UiState;

pub const STATUS_READY: &str = "Ready";
pub const STATUS_PROCESSING: &str = "Processing...";
const STATUS_HINTS: &str = "Enter: Send | Ctrl+C: Quit";

/// Everything a worker needs to run one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnTicket {
    pub id: u64,
    pub user_message: String,
    pub history: Vec<Message>,
}

pub struct App {
    pub persona_name: String,
    pub transcript: VecDeque<TranscriptEntry>,
    history: ConversationHistory,
    pending: VecDeque<String>,
    in_flight: Option<u64>,
    next_turn_id: u64,
    pub ui: UiState,
}

impl App {
    pub fn new(persona_name: impl Into<String>) -> Self {
        let persona_name = persona_name.into();
        let mut transcript = VecDeque::new();
        transcript.push_back(TranscriptEntry::app_info(format!(
            "Welcome! Chat with {persona_name}. Press Ctrl+C to quit."
        )));
        Self {
            persona_name,
            transcript,
            history: ConversationHistory::new(),
            pending: VecDeque::new(),
            in_flight: None,
            next_turn_id: 1,
            ui: UiState::new(),
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn queued_count(&self) -> usize {
        self.pending.len()
    }

    pub fn status(&self) -> &'static str {
        if self.is_processing() {
            STATUS_PROCESSING
        } else {
            STATUS_READY
        }
    }

    pub fn status_line(&self) -> String {
        match self.queued_count() {
            0 => format!("{} | {STATUS_HINTS}", self.status()),
            queued => format!("{} ({queued} queued) | {STATUS_HINTS}", self.status()),
        }
    }

    fn push_entry(&mut self, entry: TranscriptEntry) {
        self.transcript.push_back(entry);
    }

    /// Takes the input box contents as a new user message. Returns a ticket
    /// when the message can start right away; otherwise it waits in the queue
    /// behind the turn in flight.
    pub fn submit_input(&mut self) -> Option<TurnTicket> {
        let message = self.ui.take_input()?;
        self.push_entry(TranscriptEntry::user(message.clone()));
        self.ui.scroll_to_bottom();

        if self.in_flight.is_some() {
            debug!(queued = self.pending.len() + 1, "turn queued");
            self.pending.push_back(message);
            return None;
        }
        Some(self.dispatch(message))
    }

    fn dispatch(&mut self, user_message: String) -> TurnTicket {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        self.in_flight = Some(id);
        TurnTicket {
            id,
            user_message,
            history: self.history.messages().to_vec(),
        }
    }

    fn dispatch_next(&mut self) -> Option<TurnTicket> {
        let next = self.pending.pop_front()?;
        Some(self.dispatch(next))
    }

    fn is_current(&self, id: u64) -> bool {
        self.in_flight == Some(id)
    }

    pub fn apply_turn_event(&mut self, id: u64, event: &TurnEvent) {
        if !self.is_current(id) {
            return;
        }
        let entry = match event {
            TurnEvent::EvaluationPassed => TranscriptEntry::app_info("✓ Evaluation: Passed"),
            TurnEvent::EvaluationFailed { feedback } => {
                TranscriptEntry::app_warning(format!("✗ Evaluation: Failed - {feedback}"))
            }
            TurnEvent::Regenerating => TranscriptEntry::app_info("Regenerating response..."),
        };
        self.push_entry(entry);
    }

    /// Commits a finished turn to history, shows the reply, and hands back the
    /// next queued turn if there is one.
    pub fn complete_turn(&mut self, id: u64, turn: CompletedTurn) -> Option<TurnTicket> {
        if !self.is_current(id) {
            return None;
        }
        match &turn.verdict {
            Verdict::Accepted => debug!(turn = id, "reply accepted on first draft"),
            Verdict::Corrected { feedback } => {
                debug!(turn = id, %feedback, "reply replaced by corrected draft")
            }
        }
        turn.commit(&mut self.history);
        self.push_entry(TranscriptEntry::assistant(turn.reply));
        self.in_flight = None;
        self.dispatch_next()
    }

    /// Reports a failed turn. History is left untouched.
    pub fn fail_turn(&mut self, id: u64, error: &TurnError) -> Option<TurnTicket> {
        if !self.is_current(id) {
            return None;
        }
        self.push_entry(TranscriptEntry::app_error(format!("Error: {error}")));
        self.in_flight = None;
        self.dispatch_next()
    }

    pub fn request_exit(&mut self) {
        self.ui.exit_requested = true;
    }
}

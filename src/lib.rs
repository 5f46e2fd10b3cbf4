//! Standin is a terminal chat that answers as a specific person.
//!
//! Every reply is drafted by one chat-completion backend and checked by a
//! second one before it is shown; a rejected draft is rewritten once with the
//! evaluator's feedback.
//!
//! - [`core`] owns the turn pipeline: prompts, the backend client, the
//!   evaluator, the orchestrator, persona loading and configuration.
//! - [`ui`] renders the terminal interface and runs the event loop that
//!   dispatches turns to background tasks.
//! - [`api`] defines the chat-completions wire payloads.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;

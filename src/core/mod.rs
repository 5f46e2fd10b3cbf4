pub mod app;
pub mod completion;
pub mod config;
pub mod document;
pub mod evaluator;
pub mod message;
pub mod orchestrator;
pub mod persona;
pub mod prompt;

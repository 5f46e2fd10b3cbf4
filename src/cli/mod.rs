//! Process entry point.
//!
//! Startup is strictly ordered: environment (with an optional `.env`), config
//! file, logging, persona documents, backends, UI. Anything that fails before
//! the UI starts is printed to stderr and ends the process with status 1.

use std::error::Error;
use std::sync::Arc;

use tracing::info;

use crate::core::completion::{CompletionClient, HttpCompletionClient};
use crate::core::config::settings::Settings;
use crate::core::orchestrator::Orchestrator;
use crate::core::persona::PersonaContext;
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::init_file_logging;

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {message}");
    std::process::exit(1);
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_process_env().unwrap_or_else(|err| exit_with(err));

    if let Some(log_file) = &settings.log_file {
        if let Err(err) = init_file_logging(log_file, &settings.log_filter) {
            exit_with(format!(
                "Failed to open log file {}: {err}",
                log_file.display()
            ));
        }
    }

    let persona = PersonaContext::load(
        &settings.persona_name,
        &settings.biography_path,
        &settings.profile_path,
    )
    .unwrap_or_else(|err| exit_with(err));

    info!(
        responder = %settings.responder.model,
        evaluator = %settings.evaluator.model,
        "starting chat"
    );

    let responder: Arc<dyn CompletionClient> = Arc::new(
        HttpCompletionClient::new(settings.responder.clone())
            .unwrap_or_else(|err| exit_with(format!("Failed to create HTTP client: {err}"))),
    );
    let evaluator: Arc<dyn CompletionClient> = Arc::new(
        HttpCompletionClient::new(settings.evaluator.clone())
            .unwrap_or_else(|err| exit_with(format!("Failed to create HTTP client: {err}"))),
    );

    let call_timeout = settings.responder.timeout.max(settings.evaluator.timeout);
    let orchestrator = Orchestrator::for_persona(&persona, responder, evaluator)
        .with_policy(settings.regeneration)
        .with_call_timeout(call_timeout);

    run_chat(Arc::new(orchestrator), persona.name).await
}

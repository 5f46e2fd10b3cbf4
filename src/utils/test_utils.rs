use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::completion::{CompletionClient, CompletionRequest, RequestError};

/// Completion client that replays canned results and records every request.
pub struct ScriptedClient {
    label: String,
    responses: Mutex<VecDeque<Result<String, RequestError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(
        label: &str,
        responses: impl IntoIterator<Item = Result<String, RequestError>>,
    ) -> Self {
        Self {
            label: label.to_string(),
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn label(&self) -> &str {
        &self.label
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, RequestError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RequestError::Malformed("script exhausted".to_string())))
    }
}

/// Completion client whose calls never finish.
pub struct HangingClient;

#[async_trait]
impl CompletionClient for HangingClient {
    fn label(&self) -> &str {
        "hanging"
    }

    fn default_model(&self) -> &str {
        "hanging-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, RequestError> {
        std::future::pending().await
    }
}

pub fn transport_error(message: &str) -> RequestError {
    RequestError::Transport(message.to_string().into())
}

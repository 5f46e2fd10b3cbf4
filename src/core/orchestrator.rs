//! The generate → evaluate → (regenerate once) pipeline behind every turn.
//!
//! A turn moves through `Generating → Evaluating → Accepted`, or
//! `Generating → Evaluating → Regenerating → Resolved` when the evaluator
//! rejects the draft. The corrected reply is accepted without a second
//! evaluation. [`Orchestrator::run_turn`] works on a history snapshot and never
//! mutates it; committing the result is the caller's job (or use
//! [`Orchestrator::handle`], which commits on success).

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::completion::{CompletionClient, CompletionRequest, RequestError};
use crate::core::evaluator::{Evaluation, EvaluationError, Evaluator};
use crate::core::message::{ConversationHistory, Message};
use crate::core::persona::PersonaContext;
use crate::core::prompt::{
    apply_trigger_rule, build_evaluator_prompt, build_rejection_prompt, build_system_prompt,
};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How the correction pass builds its system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenerationPolicy {
    /// Build the correction prompt on top of the trigger-mutated prompt instead
    /// of the plain base prompt. Off by default, so a corrected reply drops the
    /// pig-latin instruction even when the user message triggered it.
    pub keep_trigger_instruction: bool,
}

/// A draft the evaluator turned down, fed back into the correction pass.
#[derive(Debug, Clone, Copy)]
pub struct Rejection<'a> {
    pub draft: &'a str,
    pub feedback: &'a str,
}

/// Progress notifications emitted while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    EvaluationPassed,
    EvaluationFailed { feedback: String },
    Regenerating,
}

pub trait TurnObserver: Send + Sync {
    fn notify(&self, event: TurnEvent);
}

impl TurnObserver for () {
    fn notify(&self, _event: TurnEvent) {}
}

impl TurnObserver for mpsc::UnboundedSender<TurnEvent> {
    fn notify(&self, event: TurnEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Corrected { feedback: String },
}

/// Outcome of a turn that has not been committed to history yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTurn {
    pub user_message: String,
    pub reply: String,
    pub verdict: Verdict,
}

impl CompletedTurn {
    pub fn commit(&self, history: &mut ConversationHistory) {
        history.commit_turn(self.user_message.clone(), self.reply.clone());
    }
}

#[derive(Debug)]
pub enum TurnError {
    /// The responder call failed (first draft or correction pass).
    Generation(RequestError),
    Evaluation(EvaluationError),
    Cancelled,
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Generation(err) => write!(f, "chat completion error: {err}"),
            TurnError::Evaluation(err) => write!(f, "evaluation error: {err}"),
            TurnError::Cancelled => write!(f, "turn cancelled"),
        }
    }
}

impl StdError for TurnError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TurnError::Generation(err) => Some(err),
            TurnError::Evaluation(err) => Some(err),
            TurnError::Cancelled => None,
        }
    }
}

enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

async fn bounded<F>(
    cancel: &CancellationToken,
    limit: Duration,
    call: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        outcome = tokio::time::timeout(limit, call) => {
            outcome.map_err(|_| Interrupted::TimedOut(limit))
        }
    }
}

pub struct Orchestrator {
    responder: Arc<dyn CompletionClient>,
    evaluator: Evaluator,
    base_prompt: String,
    policy: RegenerationPolicy,
    call_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        responder: Arc<dyn CompletionClient>,
        evaluator: Evaluator,
        base_prompt: impl Into<String>,
    ) -> Self {
        Self {
            responder,
            evaluator,
            base_prompt: base_prompt.into(),
            policy: RegenerationPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Derives both system prompts from the persona.
    pub fn for_persona(
        persona: &PersonaContext,
        responder: Arc<dyn CompletionClient>,
        evaluator_client: Arc<dyn CompletionClient>,
    ) -> Self {
        let base_prompt =
            build_system_prompt(&persona.name, &persona.summary, &persona.profile_text);
        let evaluator_prompt =
            build_evaluator_prompt(&persona.name, &persona.summary, &persona.profile_text);
        Self::new(
            responder,
            Evaluator::new(evaluator_client, evaluator_prompt),
            base_prompt,
        )
    }

    pub fn with_policy(mut self, policy: RegenerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn base_prompt(&self) -> &str {
        &self.base_prompt
    }

    /// System prompt for a generation call. The first pass applies the trigger
    /// rule; the correction pass wraps the foundation chosen by the policy.
    pub fn system_prompt_for(
        &self,
        user_message: &str,
        rejection: Option<&Rejection<'_>>,
    ) -> String {
        match rejection {
            None => apply_trigger_rule(&self.base_prompt, user_message).into_owned(),
            Some(rejection) => {
                let foundation = if self.policy.keep_trigger_instruction {
                    apply_trigger_rule(&self.base_prompt, user_message)
                } else {
                    self.base_prompt.as_str().into()
                };
                build_rejection_prompt(&foundation, rejection.draft, rejection.feedback)
            }
        }
    }

    fn generation_request(
        &self,
        user_message: &str,
        history: &[Message],
        rejection: Option<&Rejection<'_>>,
    ) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt_for(user_message, rejection)));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(user_message));
        CompletionRequest::new(messages)
    }

    /// Single generation path shared by the first draft and the correction pass.
    pub async fn generate(
        &self,
        user_message: &str,
        history: &[Message],
        rejection: Option<&Rejection<'_>>,
    ) -> Result<String, RequestError> {
        let request = self.generation_request(user_message, history, rejection);
        self.responder.complete(request).await
    }

    async fn generate_bounded(
        &self,
        user_message: &str,
        history: &[Message],
        rejection: Option<&Rejection<'_>>,
        cancel: &CancellationToken,
    ) -> Result<String, TurnError> {
        match bounded(
            cancel,
            self.call_timeout,
            self.generate(user_message, history, rejection),
        )
        .await
        {
            Ok(result) => result.map_err(TurnError::Generation),
            Err(Interrupted::Cancelled) => Err(TurnError::Cancelled),
            Err(Interrupted::TimedOut(limit)) => {
                Err(TurnError::Generation(RequestError::Timeout(limit)))
            }
        }
    }

    async fn evaluate_bounded(
        &self,
        draft: &str,
        user_message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Evaluation, TurnError> {
        match bounded(
            cancel,
            self.call_timeout,
            self.evaluator.evaluate(draft, user_message, history),
        )
        .await
        {
            Ok(result) => result.map_err(TurnError::Evaluation),
            Err(Interrupted::Cancelled) => Err(TurnError::Cancelled),
            Err(Interrupted::TimedOut(limit)) => Err(TurnError::Evaluation(
                EvaluationError::Request(RequestError::Timeout(limit)),
            )),
        }
    }

    /// Runs one turn against a history snapshot without committing it.
    pub async fn run_turn(
        &self,
        user_message: &str,
        history: &[Message],
        observer: &dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> Result<CompletedTurn, TurnError> {
        debug!(history = history.len(), "generating draft reply");
        let draft = self
            .generate_bounded(user_message, history, None, cancel)
            .await?;

        let evaluation = self
            .evaluate_bounded(&draft, user_message, history, cancel)
            .await?;

        if evaluation.is_acceptable {
            info!("draft accepted by evaluator");
            observer.notify(TurnEvent::EvaluationPassed);
            return Ok(CompletedTurn {
                user_message: user_message.to_string(),
                reply: draft,
                verdict: Verdict::Accepted,
            });
        }

        info!(feedback = %evaluation.feedback, "draft rejected by evaluator");
        observer.notify(TurnEvent::EvaluationFailed {
            feedback: evaluation.feedback.clone(),
        });
        observer.notify(TurnEvent::Regenerating);

        let rejection = Rejection {
            draft: &draft,
            feedback: &evaluation.feedback,
        };
        let reply = self
            .generate_bounded(user_message, history, Some(&rejection), cancel)
            .await?;

        Ok(CompletedTurn {
            user_message: user_message.to_string(),
            reply,
            verdict: Verdict::Corrected {
                feedback: evaluation.feedback,
            },
        })
    }

    /// Runs a turn and, on success, appends (user, reply) to `history`.
    pub async fn handle(
        &self,
        user_message: &str,
        history: &mut ConversationHistory,
        observer: &dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> Result<String, TurnError> {
        let turn = self
            .run_turn(user_message, history.messages(), observer, cancel)
            .await?;
        turn.commit(history);
        Ok(turn.reply)
    }
}

//! Background turn execution.
//!
//! Each turn runs on its own tokio task against a history snapshot. Progress
//! and the final outcome travel back to the UI loop as [`UiEvent::Turn`]
//! messages; nothing here touches [`crate::core::app::App`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::UiEvent;
use crate::core::app::TurnTicket;
use crate::core::orchestrator::{CompletedTurn, Orchestrator, TurnError, TurnEvent, TurnObserver};

#[derive(Debug)]
pub enum TurnUpdate {
    Progress { id: u64, event: TurnEvent },
    Completed { id: u64, turn: CompletedTurn },
    Failed { id: u64, error: TurnError },
}

/// Forwards orchestrator progress for one turn onto the UI channel.
struct TurnProgress {
    id: u64,
    event_tx: mpsc::UnboundedSender<UiEvent>,
}

impl TurnObserver for TurnProgress {
    fn notify(&self, event: TurnEvent) {
        let _ = self.event_tx.send(UiEvent::Turn(TurnUpdate::Progress { id: self.id, event }));
    }
}

pub struct TurnRunner {
    orchestrator: Arc<Orchestrator>,
    event_tx: mpsc::UnboundedSender<UiEvent>,
    cancel: CancellationToken,
}

impl TurnRunner {
    /// Turns spawned by this runner are cancelled when `cancel` is.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        event_tx: mpsc::UnboundedSender<UiEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            event_tx,
            cancel,
        }
    }

    pub fn spawn(&self, ticket: TurnTicket) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let event_tx = self.event_tx.clone();
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let TurnTicket {
                id,
                user_message,
                history,
            } = ticket;
            debug!(turn = id, "turn started");

            let progress = TurnProgress {
                id,
                event_tx: event_tx.clone(),
            };
            let update = match orchestrator
                .run_turn(&user_message, &history, &progress, &cancel)
                .await
            {
                Ok(turn) => TurnUpdate::Completed { id, turn },
                Err(error) => {
                    warn!(turn = id, error = %error, "turn failed");
                    TurnUpdate::Failed { id, error }
                }
            };

            // The loop may already be gone during shutdown.
            let _ = event_tx.send(UiEvent::Turn(update));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::completion::CompletionClient;
    use crate::core::evaluator::Evaluator;
    use crate::core::message::Message;
    use crate::utils::test_utils::{transport_error, HangingClient, ScriptedClient};

    fn runner_with(
        responder: Arc<dyn CompletionClient>,
        evaluator: Arc<dyn CompletionClient>,
    ) -> (TurnRunner, mpsc::UnboundedReceiver<UiEvent>, CancellationToken) {
        let orchestrator = Orchestrator::new(responder, Evaluator::new(evaluator, "judge"), "base");
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        (
            TurnRunner::new(Arc::new(orchestrator), event_tx, cancel.clone()),
            event_rx,
            cancel,
        )
    }

    fn ticket(id: u64, message: &str) -> TurnTicket {
        TurnTicket {
            id,
            user_message: message.to_string(),
            history: vec![Message::user("earlier"), Message::assistant("reply")],
        }
    }

    async fn next_update(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> TurnUpdate {
        match rx.recv().await {
            Some(UiEvent::Turn(update)) => update,
            other => panic!("expected a turn update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn accepted_turn_reports_progress_then_completion() {
        let responder = Arc::new(ScriptedClient::new("responder", [Ok("draft".to_string())]));
        let evaluator = Arc::new(ScriptedClient::new(
            "evaluator",
            [Ok(r#"{"is_acceptable": true, "feedback": ""}"#.to_string())],
        ));
        let (runner, mut rx, _cancel) = runner_with(responder.clone(), evaluator);

        runner.spawn(ticket(4, "hi")).await.unwrap();

        assert!(matches!(
            next_update(&mut rx).await,
            TurnUpdate::Progress {
                id: 4,
                event: TurnEvent::EvaluationPassed
            }
        ));
        match next_update(&mut rx).await {
            TurnUpdate::Completed { id, turn } => {
                assert_eq!(id, 4);
                assert_eq!(turn.reply, "draft");
                assert_eq!(turn.user_message, "hi");
            }
            other => panic!("expected completion, got {other:?}"),
        }

        // The snapshot was sent ahead of the new user message.
        let sent = &responder.requests()[0].messages;
        assert_eq!(sent[1].content, "earlier");
        assert_eq!(sent.last().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn failed_turn_reports_error() {
        let responder = Arc::new(ScriptedClient::new(
            "responder",
            [Err(transport_error("connection refused"))],
        ));
        let evaluator = Arc::new(ScriptedClient::new("evaluator", []));
        let (runner, mut rx, _cancel) = runner_with(responder, evaluator);

        runner.spawn(ticket(1, "hi")).await.unwrap();

        assert!(matches!(
            next_update(&mut rx).await,
            TurnUpdate::Failed {
                id: 1,
                error: TurnError::Generation(_)
            }
        ));
    }

    #[tokio::test]
    async fn cancelling_the_root_token_stops_running_turns() {
        let evaluator = Arc::new(ScriptedClient::new("evaluator", []));
        let (runner, mut rx, cancel) = runner_with(Arc::new(HangingClient), evaluator);

        let handle = runner.spawn(ticket(2, "hi"));
        cancel.cancel();
        handle.await.unwrap();

        assert!(matches!(
            next_update(&mut rx).await,
            TurnUpdate::Failed {
                id: 2,
                error: TurnError::Cancelled
            }
        ));
    }
}

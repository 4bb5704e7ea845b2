//! Session runtime executor

use super::{SessionSnapshot, SseEvent, Submission};
use crate::state_machine::{
    transition, ChatMessage, Effect, ErrorKind, Event, Session, SessionContext, TransitionError,
};
use crate::workflow::{WorkflowClient, WorkflowError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Drives one game: owns its session and transcript, and is the only
/// place either is mutated
pub struct SessionRuntime<C>
where
    C: WorkflowClient + 'static,
{
    context: SessionContext,
    session: Session,
    transcript: Vec<ChatMessage>,
    client: Arc<C>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    /// User submissions that expect an answer
    submit_rx: mpsc::Receiver<Submission>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Token to cancel the workflow call in flight
    call_cancel_token: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl<C> SessionRuntime<C>
where
    C: WorkflowClient + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        client: C,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        submit_rx: mpsc::Receiver<Submission>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            session: Session::new(),
            transcript: Vec::new(),
            client: Arc::new(client),
            event_rx,
            event_tx,
            submit_rx,
            broadcast_tx,
            snapshot_tx,
            call_cancel_token: None,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(game_id = %self.context.game_id, "Starting session runtime");

        // Process events in a loop - no recursion
        loop {
            // Queued events (including resets) go before submissions sent after them
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => {
                    let _ = self.process_event(event);
                }
                Some(submission) = self.submit_rx.recv() => {
                    let outcome = self.process_event(Event::UserSubmit { text: submission.text });
                    // The caller may have gone away
                    let _ = submission.reply.send(outcome);
                }
                else => break,
            }
        }

        if let Some(token) = self.call_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(game_id = %self.context.game_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = match transition(&self.session, &self.context, event) {
            Ok(r) => r,
            Err(e) if e.is_silent() => {
                tracing::debug!(game_id = %self.context.game_id, reason = %e, "Event ignored");
                return Err(e);
            }
            Err(e) => {
                // Transition errors are user-facing (e.g., "still waiting")
                tracing::warn!(game_id = %self.context.game_id, error = %e, "Event rejected");
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if result.new_session.state.name() != self.session.state.name() {
            tracing::info!(
                game_id = %self.context.game_id,
                generation = result.new_session.generation,
                from = self.session.state.name(),
                to = result.new_session.state.name(),
                "Session state changed"
            );
        }
        self.session = result.new_session;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage { role, content } => {
                let message = ChatMessage::new(role, content);
                self.transcript.push(message.clone());
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(SseEvent::Message { message });
            }

            Effect::ClearTranscript => {
                self.transcript.clear();
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(SseEvent::TranscriptCleared);
            }

            Effect::ClearInput => {
                let _ = self.broadcast_tx.send(SseEvent::InputCleared);
            }

            Effect::CancelInFlight => {
                if let Some(token) = self.call_cancel_token.take() {
                    tracing::info!(game_id = %self.context.game_id, "Cancelling workflow call in flight");
                    token.cancel();
                }
            }

            Effect::PublishState => {
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    state: self.session.state.clone(),
                    won: self.session.won(),
                    accepting_input: self.session.state.accepts_input(),
                });
            }

            Effect::StartRun { generation, input } => {
                let client = self.client.clone();
                self.spawn_call(generation, async move {
                    start_run(client.as_ref(), generation, &input).await
                });
            }

            Effect::ResumeRun {
                generation,
                run_id,
                step,
                resume_data,
            } => {
                let client = self.client.clone();
                self.spawn_call(generation, async move {
                    match client.resume_run(&run_id, &step, &resume_data).await {
                        Ok(result) => Event::RunResumed { generation, result },
                        Err(e) => call_failed(generation, &e),
                    }
                });
            }

            Effect::NotifyError { message } => {
                let _ = self.broadcast_tx.send(SseEvent::Error { message });
            }
        }
    }

    /// Run a workflow call as a background task, raced against a fresh
    /// cancellation token
    fn spawn_call<F>(&mut self, generation: u64, call: F)
    where
        F: std::future::Future<Output = Event> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.call_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let event_tx = self.event_tx.clone();
        let game_id = self.context.game_id.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(game_id = %game_id, generation, "Workflow call cancelled");
                }

                event = call => {
                    let _ = event_tx.send(event).await;
                }
            }
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot::new(
            &self.context.game_id,
            &self.session,
            &self.transcript,
        ));
    }
}

/// Create a run and start it, reporting the outcome as an event
async fn start_run<C: WorkflowClient + ?Sized>(client: &C, generation: u64, input: &Value) -> Event {
    let handle = match client.create_run().await {
        Ok(handle) => handle,
        Err(e) => return call_failed(generation, &e),
    };

    match client.start_run(&handle.run_id, input).await {
        Ok(result) => Event::RunStarted {
            generation,
            run_id: handle.run_id,
            result,
        },
        Err(e) => {
            tracing::warn!(run_id = %handle.run_id, "Run created but failed to start");
            call_failed(generation, &e)
        }
    }
}

fn call_failed(generation: u64, error: &WorkflowError) -> Event {
    Event::CallFailed {
        generation,
        message: error.message.clone(),
        error_kind: ErrorKind::from(error.kind),
    }
}

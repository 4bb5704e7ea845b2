//! Mock implementations for testing
//!
//! These mocks enable integration testing without a workflow service.

use crate::runtime::{SessionRuntime, SessionSnapshot, SseEvent, Submission};
use crate::state_machine::{ChatMessage, Event, Session, SessionContext, TransitionError};
use crate::workflow::{RunHandle, WorkflowClient, WorkflowError, WorkflowResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Workflow Client
// ============================================================================

/// A call received by a mock client
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowCall {
    Create,
    Start {
        run_id: String,
        input: Value,
    },
    Resume {
        run_id: String,
        step: String,
        resume_data: Value,
    },
}

/// Mock workflow client that returns queued results
pub struct MockWorkflowClient {
    starts: Mutex<VecDeque<Result<WorkflowResult, WorkflowError>>>,
    resumes: Mutex<VecDeque<Result<WorkflowResult, WorkflowError>>>,
    runs_created: Mutex<u64>,
    /// Record of all calls made
    pub calls: Mutex<Vec<WorkflowCall>>,
}

impl MockWorkflowClient {
    pub fn new() -> Self {
        Self {
            starts: Mutex::new(VecDeque::new()),
            resumes: Mutex::new(VecDeque::new()),
            runs_created: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue the result of the next start
    pub fn queue_start(&self, result: Result<WorkflowResult, WorkflowError>) {
        self.starts.lock().unwrap().push_back(result);
    }

    /// Queue the result of the next resume
    pub fn queue_resume(&self, result: Result<WorkflowResult, WorkflowError>) {
        self.resumes.lock().unwrap().push_back(result);
    }

    pub fn recorded_calls(&self) -> Vec<WorkflowCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resume_calls(&self) -> Vec<WorkflowCall> {
        self.recorded_calls()
            .into_iter()
            .filter(|c| matches!(c, WorkflowCall::Resume { .. }))
            .collect()
    }

    fn next_resume(&self) -> Result<WorkflowResult, WorkflowError> {
        self.resumes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WorkflowError::network("No mock resume result queued")))
    }
}

impl Default for MockWorkflowClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowClient for MockWorkflowClient {
    async fn create_run(&self) -> Result<RunHandle, WorkflowError> {
        self.calls.lock().unwrap().push(WorkflowCall::Create);
        let mut created = self.runs_created.lock().unwrap();
        *created += 1;
        Ok(RunHandle {
            run_id: format!("run-{created}"),
        })
    }

    async fn start_run(&self, run_id: &str, input: &Value) -> Result<WorkflowResult, WorkflowError> {
        self.calls.lock().unwrap().push(WorkflowCall::Start {
            run_id: run_id.to_string(),
            input: input.clone(),
        });
        self.starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WorkflowError::network("No mock start result queued")))
    }

    async fn resume_run(
        &self,
        run_id: &str,
        step: &str,
        resume_data: &Value,
    ) -> Result<WorkflowResult, WorkflowError> {
        self.calls.lock().unwrap().push(WorkflowCall::Resume {
            run_id: run_id.to_string(),
            step: step.to_string(),
            resume_data: resume_data.clone(),
        });
        self.next_resume()
    }

    fn workflow_id(&self) -> &str {
        "mock-workflow"
    }
}

// ============================================================================
// Delayed Mock Workflow Client (for cancellation testing)
// ============================================================================

/// Mock client whose resumes take `resume_delay`; starts are instant
pub struct DelayedMockWorkflowClient {
    pub inner: MockWorkflowClient,
    resume_delay: Duration,
    /// Notified when a resume starts (for test synchronization)
    pub resume_started: Arc<Notify>,
}

impl DelayedMockWorkflowClient {
    pub fn new(resume_delay: Duration) -> Self {
        Self {
            inner: MockWorkflowClient::new(),
            resume_delay,
            resume_started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl WorkflowClient for DelayedMockWorkflowClient {
    async fn create_run(&self) -> Result<RunHandle, WorkflowError> {
        self.inner.create_run().await
    }

    async fn start_run(&self, run_id: &str, input: &Value) -> Result<WorkflowResult, WorkflowError> {
        self.inner.start_run(run_id, input).await
    }

    async fn resume_run(
        &self,
        run_id: &str,
        step: &str,
        resume_data: &Value,
    ) -> Result<WorkflowResult, WorkflowError> {
        self.inner.calls.lock().unwrap().push(WorkflowCall::Resume {
            run_id: run_id.to_string(),
            step: step.to_string(),
            resume_data: resume_data.clone(),
        });
        self.resume_started.notify_one();
        tokio::time::sleep(self.resume_delay).await;
        self.inner.next_resume()
    }

    fn workflow_id(&self) -> &str {
        self.inner.workflow_id()
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// A spawned `SessionRuntime` wired to channels the test holds
pub struct TestRuntime<C: WorkflowClient + 'static> {
    pub client: Arc<C>,
    pub event_tx: mpsc::Sender<Event>,
    pub submit_tx: mpsc::Sender<Submission>,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    shutdown: CancellationToken,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl<C: WorkflowClient + 'static> TestRuntime<C> {
    pub fn spawn(client: C) -> Self {
        let client = Arc::new(client);
        let context = SessionContext::new("test-game", Default::default());
        let (event_tx, event_rx) = mpsc::channel(32);
        let (submit_tx, submit_rx) = mpsc::channel(8);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::new("test-game", &Session::new(), &[]));
        let shutdown = CancellationToken::new();

        let runtime = SessionRuntime::new(
            context,
            client.clone(),
            event_rx,
            event_tx.clone(),
            submit_rx,
            broadcast_tx,
            snapshot_tx,
            shutdown.clone(),
        );
        let handle = tokio::spawn(runtime.run());

        Self {
            client,
            event_tx,
            submit_tx,
            broadcast_rx,
            snapshot_rx,
            shutdown,
            _runtime_handle: handle,
        }
    }

    async fn send(&self, event: Event) {
        self.event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    pub async fn start(&self) {
        self.send(Event::Start).await;
    }

    pub async fn submit(&self, text: &str) {
        self.send(Event::UserSubmit {
            text: text.to_string(),
        })
        .await;
    }

    /// Submit through the reply channel and return the runtime's verdict
    pub async fn submit_checked(&self, text: &str) -> Result<(), TransitionError> {
        let (reply, outcome) = oneshot::channel();
        self.submit_tx
            .send(Submission {
                text: text.to_string(),
                reply,
            })
            .await
            .expect("Failed to send submission");
        outcome.await.expect("Runtime dropped the reply")
    }

    pub async fn reset(&self) {
        self.send(Event::Reset).await;
    }

    /// Wait until the published snapshot satisfies `pred`
    pub async fn wait_for_snapshot(
        &mut self,
        timeout: Duration,
        pred: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let snapshot = tokio::time::timeout(timeout, self.snapshot_rx.wait_for(pred))
            .await
            .ok()?
            .ok()?;
        Some((*snapshot).clone())
    }

    /// Wait until the session accepts input again
    pub async fn wait_for_input(&mut self) -> SessionSnapshot {
        self.wait_for_snapshot(Duration::from_secs(2), |s| s.accepting_input)
            .await
            .expect("Session never accepted input")
    }

    /// Wait for an SSE error event and return its message
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SseEvent::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.snapshot().messages
    }
}

impl<C: WorkflowClient + 'static> Drop for TestRuntime<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{ErrorKind, Role, SessionState};
    use serde_json::json;

    const OPENING: &str = "I'm thinking of a famous person. Ask me yes or no questions!";

    fn question(message: &str) -> Result<WorkflowResult, WorkflowError> {
        Ok(WorkflowResult::suspended(
            "question-step",
            json!({ "message": message }),
        ))
    }

    fn contents(messages: &[ChatMessage]) -> Vec<(Role, &str)> {
        messages.iter().map(|m| (m.role, m.content.as_str())).collect()
    }

    #[tokio::test]
    async fn test_mock_client_records_calls() {
        let client = MockWorkflowClient::new();
        client.queue_start(question("hi"));

        let handle = client.create_run().await.unwrap();
        assert_eq!(handle.run_id, "run-1");
        client.start_run("run-1", &json!({ "start": true })).await.unwrap();
        let err = client
            .resume_run("run-1", "question-step", &json!({}))
            .await
            .unwrap_err();
        assert!(err.message.contains("No mock resume"));

        assert_eq!(client.recorded_calls().len(), 3);
        assert_eq!(client.recorded_calls()[0], WorkflowCall::Create);
    }

    /// Integration test: a full game from opening message to win
    #[tokio::test]
    async fn test_full_game() {
        let client = MockWorkflowClient::new();
        client.queue_start(question(OPENING));
        client.queue_resume(question("No."));
        client.queue_resume(Ok(WorkflowResult::success(
            "win-step",
            json!({ "agentResponse": "Correct!", "guessCount": 5 }),
        )));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        let snapshot = rt.wait_for_input().await;
        assert_eq!(contents(&snapshot.messages), vec![(Role::Assistant, OPENING)]);

        rt.submit("Is it a woman?").await;
        rt.wait_for_snapshot(Duration::from_secs(2), |s| s.messages.len() == 3)
            .await
            .unwrap();

        rt.submit("Is it Einstein?").await;
        let snapshot = rt
            .wait_for_snapshot(Duration::from_secs(2), |s| s.won)
            .await
            .unwrap();

        assert_eq!(
            contents(&snapshot.messages),
            vec![
                (Role::Assistant, OPENING),
                (Role::User, "Is it a woman?"),
                (Role::Assistant, "No."),
                (Role::User, "Is it Einstein?"),
                (Role::Assistant, "Correct! You got it in 5 guesses!"),
            ]
        );
        assert!(!snapshot.accepting_input);
        assert_eq!(
            snapshot.state,
            SessionState::Completed {
                run_id: "run-1".to_string()
            }
        );

        assert_eq!(
            rt.client.resume_calls(),
            vec![
                WorkflowCall::Resume {
                    run_id: "run-1".to_string(),
                    step: "question-step".to_string(),
                    resume_data: json!({ "userMessage": "Is it a woman?" }),
                },
                WorkflowCall::Resume {
                    run_id: "run-1".to_string(),
                    step: "question-step".to_string(),
                    resume_data: json!({ "userMessage": "Is it Einstein?" }),
                },
            ]
        );
    }

    /// Integration test: input after the win is refused until reset
    #[tokio::test]
    async fn test_reset_after_win() {
        let client = MockWorkflowClient::new();
        client.queue_start(Ok(WorkflowResult::success(
            "win-game-step",
            json!({ "famousPerson": "Marie Curie" }),
        )));
        client.queue_start(question("New game!"));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        rt.wait_for_snapshot(Duration::from_secs(2), |s| s.won)
            .await
            .unwrap();

        rt.submit("Is it Curie?").await;
        let error = rt.wait_for_error(Duration::from_secs(2)).await.unwrap();
        assert!(error.contains("reset"));
        assert!(rt.client.resume_calls().is_empty());

        rt.reset().await;
        let snapshot = rt.wait_for_input().await;
        assert_eq!(snapshot.generation, 2);
        assert!(!snapshot.won);
        assert_eq!(contents(&snapshot.messages), vec![(Role::Assistant, "New game!")]);
        assert_eq!(snapshot.state.run_id(), Some("run-2"));
    }

    /// Integration test: reset while a resume is in flight discards its reply
    #[tokio::test]
    async fn test_reset_discards_in_flight_resume() {
        let client = DelayedMockWorkflowClient::new(Duration::from_millis(300));
        client.inner.queue_start(question(OPENING));
        client.inner.queue_start(question("Fresh start"));
        client.inner.queue_resume(question("Stale answer"));
        let resume_started = client.resume_started.clone();

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        rt.wait_for_input().await;

        rt.submit("Is it a singer?").await;
        tokio::time::timeout(Duration::from_secs(2), resume_started.notified())
            .await
            .unwrap();
        rt.reset().await;

        let snapshot = rt
            .wait_for_snapshot(Duration::from_secs(2), |s| {
                s.generation == 2 && s.accepting_input
            })
            .await
            .unwrap();
        assert_eq!(contents(&snapshot.messages), vec![(Role::Assistant, "Fresh start")]);

        // Outlive the cancelled call
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            contents(&rt.messages()),
            vec![(Role::Assistant, "Fresh start")]
        );
    }

    /// Integration test: a result tagged with an old generation is ignored
    #[tokio::test]
    async fn test_stale_result_ignored() {
        let client = MockWorkflowClient::new();
        client.queue_start(question(OPENING));
        client.queue_start(question("Fresh start"));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        rt.wait_for_input().await;
        rt.reset().await;
        rt.wait_for_snapshot(Duration::from_secs(2), |s| {
            s.generation == 2 && s.accepting_input
        })
        .await
        .unwrap();

        rt.event_tx
            .send(Event::RunResumed {
                generation: 1,
                result: question("Late reply").unwrap(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(contents(&rt.messages()), vec![(Role::Assistant, "Fresh start")]);
    }

    /// Integration test: a failed resume surfaces an error and can be retried
    #[tokio::test]
    async fn test_call_failure_is_recoverable() {
        let client = MockWorkflowClient::new();
        client.queue_start(question(OPENING));
        client.queue_resume(Err(WorkflowError::network("connection refused")));
        client.queue_resume(question("Yes."));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        rt.wait_for_input().await;

        rt.submit("Is it an actor?").await;
        let snapshot = rt
            .wait_for_snapshot(Duration::from_secs(2), |s| {
                matches!(s.state, SessionState::Error { .. })
            })
            .await
            .unwrap();
        match &snapshot.state {
            SessionState::Error {
                message,
                error_kind,
                run_id,
            } => {
                assert_eq!(message, "connection refused");
                assert_eq!(*error_kind, ErrorKind::Network);
                assert_eq!(run_id.as_deref(), Some("run-1"));
            }
            other => panic!("Expected error state, got {other:?}"),
        }
        assert!(snapshot.accepting_input);

        rt.submit("Is it an actor?").await;
        let snapshot = rt
            .wait_for_snapshot(Duration::from_secs(2), |s| {
                matches!(s.state, SessionState::AwaitingInput { .. })
            })
            .await
            .unwrap();
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.messages[3].content, "Yes.");
    }

    /// Integration test: a failed start leaves nothing to resume
    #[tokio::test]
    async fn test_start_failure_requires_reset() {
        let client = MockWorkflowClient::new();
        client.queue_start(Err(WorkflowError::server_error("Internal Server Error")));
        client.queue_start(question(OPENING));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        let snapshot = rt
            .wait_for_snapshot(Duration::from_secs(2), |s| {
                matches!(s.state, SessionState::Error { .. })
            })
            .await
            .unwrap();
        assert!(!snapshot.accepting_input);
        assert!(snapshot.messages.is_empty());
        assert_eq!(
            rt.wait_for_error(Duration::from_secs(2)).await.as_deref(),
            Some("Internal Server Error")
        );

        assert_eq!(rt.submit_checked("Hello?").await, Err(TransitionError::NoActiveRun));
        assert_eq!(
            rt.wait_for_error(Duration::from_secs(2)).await,
            Some(TransitionError::NoActiveRun.to_string())
        );
        assert!(rt.client.resume_calls().is_empty());

        rt.reset().await;
        let snapshot = rt.wait_for_input().await;
        assert_eq!(contents(&snapshot.messages), vec![(Role::Assistant, OPENING)]);
    }

    /// Integration test: a suspended result with nothing to show
    #[tokio::test]
    async fn test_missing_message_is_visible() {
        let client = MockWorkflowClient::new();
        client.queue_start(Ok(WorkflowResult::suspended("question-step", json!({}))));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        let snapshot = rt
            .wait_for_snapshot(Duration::from_secs(2), |s| {
                matches!(s.state, SessionState::Error { .. })
            })
            .await
            .unwrap();
        assert!(matches!(
            snapshot.state,
            SessionState::Error {
                error_kind: ErrorKind::MissingMessage,
                ..
            }
        ));
        assert!(snapshot.messages.is_empty());
    }

    /// Integration test: a second submission while waiting is rejected
    #[tokio::test]
    async fn test_submit_while_busy_rejected() {
        let client = DelayedMockWorkflowClient::new(Duration::from_millis(200));
        client.inner.queue_start(question(OPENING));
        client.inner.queue_resume(question("No."));
        let resume_started = client.resume_started.clone();

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        rt.wait_for_input().await;

        rt.submit("First?").await;
        tokio::time::timeout(Duration::from_secs(2), resume_started.notified())
            .await
            .unwrap();
        assert_eq!(rt.submit_checked("Second?").await, Err(TransitionError::Busy));

        let error = rt.wait_for_error(Duration::from_secs(2)).await.unwrap();
        assert_eq!(error, TransitionError::Busy.to_string());

        let snapshot = rt.wait_for_input().await;
        assert_eq!(
            contents(&snapshot.messages),
            vec![
                (Role::Assistant, OPENING),
                (Role::User, "First?"),
                (Role::Assistant, "No."),
            ]
        );
        assert_eq!(rt.client.inner.resume_calls().len(), 1);
    }

    /// Integration test: blank input changes nothing
    #[tokio::test]
    async fn test_blank_input_ignored() {
        let client = MockWorkflowClient::new();
        client.queue_start(question(OPENING));

        let mut rt = TestRuntime::spawn(client);
        rt.start().await;
        rt.wait_for_input().await;

        assert_eq!(rt.submit_checked("   ").await, Err(TransitionError::EmptyInput));

        assert_eq!(rt.messages().len(), 1);
        assert!(rt.client.resume_calls().is_empty());
        assert!(rt.snapshot().accepting_input);
    }
}

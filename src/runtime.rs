//! Runtime for executing game sessions
//!
//! Each game gets its own `SessionRuntime` task. The `SessionManager` owns
//! the handles used to talk to them.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::state_machine::{
    ChatMessage, Event, Session, SessionContext, SessionState, TransitionError,
};
use crate::workflow::{ResponseMapping, WorkflowClient};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = SessionRuntime<Arc<dyn WorkflowClient>>;

/// Point-in-time view of a game, served to newly connected clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub game_id: String,
    pub generation: u64,
    pub state: SessionState,
    pub messages: Vec<ChatMessage>,
    pub won: bool,
    /// A workflow call is in flight
    pub working: bool,
    pub accepting_input: bool,
}

impl SessionSnapshot {
    pub fn new(game_id: &str, session: &Session, messages: &[ChatMessage]) -> Self {
        Self {
            game_id: game_id.to_string(),
            generation: session.generation,
            state: session.state.clone(),
            messages: messages.to_vec(),
            won: session.won(),
            working: session.state.is_working(),
            accepting_input: session.state.accepts_input(),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: SessionSnapshot },
    Message { message: ChatMessage },
    StateChange {
        state: SessionState,
        won: bool,
        accepting_input: bool,
    },
    TranscriptCleared,
    InputCleared,
    Error { message: String },
}

/// A user message together with where to report whether it was accepted
#[derive(Debug)]
pub struct Submission {
    pub text: String,
    pub reply: oneshot::Sender<Result<(), TransitionError>>,
}

/// Why a submission did not reach the workflow
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Game not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Game runtime stopped")]
    Stopped,
}

/// Handle to interact with a running game
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub submit_tx: mpsc::Sender<Submission>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub shutdown: CancellationToken,
    last_active: Arc<Mutex<Instant>>,
}

impl SessionHandle {
    fn touch(&self) {
        if let Ok(mut last_active) = self.last_active.lock() {
            *last_active = Instant::now();
        }
    }

    /// Nobody is streaming the game and nobody has used it for `max_idle`
    fn is_abandoned(&self, max_idle: Duration) -> bool {
        let idle = self
            .last_active
            .lock()
            .map(|last_active| last_active.elapsed())
            .unwrap_or_default();
        self.broadcast_tx.receiver_count() == 0 && idle >= max_idle
    }
}

/// Manager for all game runtimes
pub struct SessionManager {
    client: Arc<dyn WorkflowClient>,
    mapping: ResponseMapping,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(client: Arc<dyn WorkflowClient>, mapping: ResponseMapping) -> Self {
        Self {
            client,
            mapping,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a game, spawn its runtime, and kick off its first run
    pub async fn create(&self) -> Result<String, String> {
        let game_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&game_id, self.mapping.clone());

        let (event_tx, event_rx) = mpsc::channel(32);
        let (submit_tx, submit_rx) = mpsc::channel(8);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::new(&game_id, &Session::new(), &[]));
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            context,
            self.client.clone(),
            event_rx,
            event_tx.clone(),
            submit_rx,
            broadcast_tx.clone(),
            snapshot_tx,
            shutdown.clone(),
        );
        tokio::spawn(runtime.run());

        event_tx
            .send(Event::Start)
            .await
            .map_err(|e| format!("Failed to start game: {e}"))?;

        self.sessions.write().await.insert(
            game_id.clone(),
            SessionHandle {
                event_tx,
                submit_tx,
                broadcast_tx,
                snapshot_rx,
                shutdown,
                last_active: Arc::new(Mutex::new(Instant::now())),
            },
        );

        tracing::info!(game_id = %game_id, "Game created");
        Ok(game_id)
    }

    /// Look up a game; counts as activity for idle eviction
    pub async fn get(&self, game_id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(game_id).cloned()?;
        handle.touch();
        Some(handle)
    }

    pub async fn snapshot(&self, game_id: &str) -> Option<SessionSnapshot> {
        let handle = self.get(game_id).await?;
        let snapshot = handle.snapshot_rx.borrow().clone();
        Some(snapshot)
    }

    /// Queue an event for a game's runtime
    pub async fn send_event(&self, game_id: &str, event: Event) -> Result<(), String> {
        let handle = self
            .get(game_id)
            .await
            .ok_or_else(|| format!("Game not found: {game_id}"))?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|e| format!("Game runtime stopped: {e}"))
    }

    /// Submit a user message and wait for the runtime to accept or reject it
    pub async fn submit(&self, game_id: &str, text: String) -> Result<(), SubmitError> {
        let handle = self
            .get(game_id)
            .await
            .ok_or_else(|| SubmitError::NotFound(game_id.to_string()))?;
        let (reply, outcome) = oneshot::channel();
        handle
            .submit_tx
            .send(Submission { text, reply })
            .await
            .map_err(|_| SubmitError::Stopped)?;
        outcome.await.map_err(|_| SubmitError::Stopped)??;
        Ok(())
    }

    /// Current snapshot plus a receiver for everything after it
    pub async fn subscribe(
        &self,
        game_id: &str,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SseEvent>), String> {
        let handle = self
            .get(game_id)
            .await
            .ok_or_else(|| format!("Game not found: {game_id}"))?;
        let rx = handle.broadcast_tx.subscribe();
        let snapshot = handle.snapshot_rx.borrow().clone();
        Ok((snapshot, rx))
    }

    /// Stop a game's runtime and forget it
    pub async fn remove(&self, game_id: &str) -> bool {
        let Some(handle) = self.sessions.write().await.remove(game_id) else {
            return false;
        };
        handle.shutdown.cancel();
        tracing::info!(game_id = %game_id, "Game removed");
        true
    }

    /// Stop and forget games with no stream subscribers that have been idle
    /// for at least `max_idle`. Returns the evicted ids.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let evicted: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| handle.is_abandoned(max_idle))
            .map(|(id, _)| id.clone())
            .collect();

        for game_id in &evicted {
            if let Some(handle) = sessions.remove(game_id) {
                handle.shutdown.cancel();
            }
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), remaining = sessions.len(), "Evicted idle games");
        }
        evicted
    }

    /// Periodically evict idle games until `shutdown` is cancelled
    pub async fn run_eviction(
        self: Arc<Self>,
        max_idle: Duration,
        period: Duration,
        shutdown: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.evict_idle(max_idle).await;
                }
            }
        }
    }
}

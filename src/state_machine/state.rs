//! Session state types

use crate::workflow::{ResponseMapping, WorkflowErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Transcript
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Classification of a visible session error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    /// The service rejected or could not serve the call
    Workflow,
    /// The result carried no message to display
    MissingMessage,
    /// The workflow run itself failed
    WorkflowFailed,
    Unknown,
}

impl From<WorkflowErrorKind> for ErrorKind {
    fn from(kind: WorkflowErrorKind) -> Self {
        match kind {
            WorkflowErrorKind::Network => ErrorKind::Network,
            WorkflowErrorKind::Timeout => ErrorKind::Timeout,
            WorkflowErrorKind::NotFound
            | WorkflowErrorKind::ServerError
            | WorkflowErrorKind::InvalidRequest
            | WorkflowErrorKind::InvalidResponse => ErrorKind::Workflow,
            WorkflowErrorKind::Unknown => ErrorKind::Unknown,
        }
    }
}

/// Where the game session currently is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// No run exists yet
    #[default]
    Idle,

    /// Creating and starting a run
    Starting,

    /// Run suspended, waiting for the next user message
    AwaitingInput {
        run_id: String,
        /// Step the next message resumes
        pending_step: String,
    },

    /// Resume call in flight
    Resuming { run_id: String },

    /// Game won; no input accepted until reset
    Completed { run_id: String },

    /// A call failed or returned nothing displayable. If the run survived,
    /// `run_id` is kept so the next submission retries against it.
    Error {
        message: String,
        error_kind: ErrorKind,
        run_id: Option<String>,
    },
}

impl SessionState {
    /// Run backing this session, if any
    pub fn run_id(&self) -> Option<&str> {
        match self {
            SessionState::Idle | SessionState::Starting => None,
            SessionState::AwaitingInput { run_id, .. }
            | SessionState::Resuming { run_id }
            | SessionState::Completed { run_id } => Some(run_id),
            SessionState::Error { run_id, .. } => run_id.as_deref(),
        }
    }

    pub fn is_won(&self) -> bool {
        matches!(self, SessionState::Completed { .. })
    }

    /// A workflow call is in flight
    pub fn is_working(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Resuming { .. })
    }

    /// A submission would be relayed to the workflow
    pub fn accepts_input(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingInput { .. } | SessionState::Error { run_id: Some(_), .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::AwaitingInput { .. } => "awaiting_input",
            SessionState::Resuming { .. } => "resuming",
            SessionState::Completed { .. } => "completed",
            SessionState::Error { .. } => "error",
        }
    }
}

/// One game session. Replaced wholesale on reset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    /// Bumped on every (re)start; workflow calls are tagged with it so
    /// results from a previous session are discarded
    pub generation: u64,
    pub state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn won(&self) -> bool {
        self.state.is_won()
    }

    /// Next session, replacing this one
    pub fn restarted(&self) -> Self {
        Self {
            generation: self.generation + 1,
            state: SessionState::Starting,
        }
    }

    pub fn with_state(&self, state: SessionState) -> Self {
        Self {
            generation: self.generation,
            state,
        }
    }
}

/// Immutable configuration of a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub game_id: String,
    pub mapping: ResponseMapping,
}

impl SessionContext {
    pub fn new(game_id: impl Into<String>, mapping: ResponseMapping) -> Self {
        Self {
            game_id: game_id.into(),
            mapping,
        }
    }
}

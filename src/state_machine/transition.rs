//! Pure state transition function

use super::{Effect, ErrorKind, Event, Session, SessionContext, SessionState};
use crate::workflow::{WorkflowOutcome, WorkflowResult};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            new_session: session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("No game is running, reset to start a new one")]
    NoActiveRun,
    #[error("Still waiting for the previous reply")]
    Busy,
    #[error("Game is over, reset to play again")]
    GameOver,
    #[error("Session already started")]
    AlreadyStarted,
    #[error("Discarded result from previous session generation {0}")]
    StaleResult(u64),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Rejections that are dropped without telling the user
    pub fn is_silent(&self) -> bool {
        matches!(self, TransitionError::EmptyInput | TransitionError::StaleResult(_))
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    session: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&session.state, event) {
        // ============================================================
        // Session start and reset
        // ============================================================
        (SessionState::Idle, Event::Start) => Ok(begin_session(session.restarted(), false)),

        (_, Event::Start) => Err(TransitionError::AlreadyStarted),

        // Reset is accepted from every state, including mid-call
        (_, Event::Reset) => Ok(begin_session(session.restarted(), true)),

        // ============================================================
        // User submissions
        // ============================================================
        (_, Event::UserSubmit { text }) if text.trim().is_empty() => Err(TransitionError::EmptyInput),

        (SessionState::AwaitingInput { run_id, pending_step }, Event::UserSubmit { text }) => {
            Ok(submit(session, run_id, pending_step, &text))
        }

        // Error recovery: retry against the surviving run
        (SessionState::Error { run_id: Some(run_id), .. }, Event::UserSubmit { text }) => {
            Ok(submit(session, run_id, &context.mapping.question_step, &text))
        }

        (SessionState::Starting | SessionState::Resuming { .. }, Event::UserSubmit { .. }) => {
            Err(TransitionError::Busy)
        }

        (SessionState::Completed { .. }, Event::UserSubmit { .. }) => Err(TransitionError::GameOver),

        (SessionState::Idle | SessionState::Error { run_id: None, .. }, Event::UserSubmit { .. }) => {
            Err(TransitionError::NoActiveRun)
        }

        // ============================================================
        // Workflow results
        // ============================================================
        (_, event) if event.generation().is_some_and(|g| g != session.generation) => Err(
            TransitionError::StaleResult(event.generation().unwrap_or_default()),
        ),

        (SessionState::Starting, Event::RunStarted { run_id, result, .. }) => {
            Ok(apply_result(session, context, run_id, &result))
        }

        (SessionState::Resuming { run_id }, Event::RunResumed { result, .. }) => {
            Ok(apply_result(session, context, run_id.clone(), &result))
        }

        (
            SessionState::Starting | SessionState::Resuming { .. },
            Event::CallFailed {
                message,
                error_kind,
                ..
            },
        ) => {
            // A failed resume leaves the run suspended; a failed start leaves nothing
            let run_id = session.state.run_id().map(ToString::to_string);
            Ok(fail(session, message, error_kind, run_id))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn begin_session(next: Session, reset: bool) -> TransitionResult {
    let generation = next.generation;
    let result = TransitionResult::new(next);
    let result = if reset {
        result.with_effects([
            Effect::CancelInFlight,
            Effect::ClearTranscript,
            Effect::ClearInput,
        ])
    } else {
        result
    };
    result
        .with_effect(Effect::PublishState)
        .with_effect(Effect::start_run(generation))
}

fn submit(session: &Session, run_id: &str, step: &str, text: &str) -> TransitionResult {
    TransitionResult::new(session.with_state(SessionState::Resuming {
        run_id: run_id.to_string(),
    }))
    .with_effect(Effect::user_message(text))
    .with_effect(Effect::ClearInput)
    .with_effect(Effect::PublishState)
    .with_effect(Effect::resume_run(session.generation, run_id, step, text))
}

fn apply_result(
    session: &Session,
    context: &SessionContext,
    run_id: String,
    result: &WorkflowResult,
) -> TransitionResult {
    match context.mapping.interpret(result) {
        WorkflowOutcome::Suspended {
            message: Some(message),
            ..
        } => TransitionResult::new(session.with_state(SessionState::AwaitingInput {
            run_id,
            pending_step: context.mapping.question_step.clone(),
        }))
        .with_effect(Effect::assistant_message(message))
        .with_effect(Effect::PublishState),

        WorkflowOutcome::Suspended {
            message: None,
            step,
        } => fail(
            session,
            format!(
                "The workflow paused at {} without a message to show",
                step.as_deref().unwrap_or("an unnamed step")
            ),
            ErrorKind::MissingMessage,
            Some(run_id),
        ),

        WorkflowOutcome::Won(summary) => {
            TransitionResult::new(session.with_state(SessionState::Completed { run_id }))
                .with_effect(Effect::assistant_message(summary.message()))
                .with_effect(Effect::PublishState)
        }

        WorkflowOutcome::CompletedWithoutSummary => fail(
            session,
            "The game finished but the workflow returned no result to show".to_string(),
            ErrorKind::MissingMessage,
            None,
        ),

        WorkflowOutcome::Failed { message } => fail(
            session,
            format!("The workflow run failed: {message}"),
            ErrorKind::WorkflowFailed,
            None,
        ),

        WorkflowOutcome::Unexpected { status } => fail(
            session,
            format!("Unexpected workflow status: {status}"),
            ErrorKind::Workflow,
            Some(run_id),
        ),
    }
}

fn fail(
    session: &Session,
    message: String,
    error_kind: ErrorKind,
    run_id: Option<String>,
) -> TransitionResult {
    TransitionResult::new(session.with_state(SessionState::Error {
        message: message.clone(),
        error_kind,
        run_id,
    }))
    .with_effect(Effect::PublishState)
    .with_effect(Effect::NotifyError { message })
}

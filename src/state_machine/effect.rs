//! Effects produced by state transitions

use super::state::Role;
use serde_json::{json, Value};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the transcript
    AppendMessage { role: Role, content: String },

    /// Drop every transcript message
    ClearTranscript,

    /// Tell clients to empty their input box
    ClearInput,

    /// Cancel the workflow call in flight, if any
    CancelInFlight,

    /// Publish the new session state
    PublishState,

    /// Create a run and start it (spawns as background task)
    StartRun { generation: u64, input: Value },

    /// Resume a suspended run (spawns as background task)
    ResumeRun {
        generation: u64,
        run_id: String,
        step: String,
        resume_data: Value,
    },

    /// Surface an error to connected clients
    NotifyError { message: String },
}

impl Effect {
    pub fn user_message(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant_message(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Start a run with the fixed initial payload
    pub fn start_run(generation: u64) -> Self {
        Effect::StartRun {
            generation,
            input: json!({ "start": true }),
        }
    }

    /// Resume with the user's message as resumption data
    pub fn resume_run(
        generation: u64,
        run_id: impl Into<String>,
        step: impl Into<String>,
        text: &str,
    ) -> Self {
        Effect::ResumeRun {
            generation,
            run_id: run_id.into(),
            step: step.into(),
            resume_data: json!({ "userMessage": text }),
        }
    }

    pub fn is_workflow_call(&self) -> bool {
        matches!(self, Effect::StartRun { .. } | Effect::ResumeRun { .. })
    }
}

//! Events that can occur in a session

use super::state::ErrorKind;
use crate::workflow::WorkflowResult;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Initial page load
    Start,
    UserSubmit {
        text: String,
    },
    Reset,

    // Workflow events (tagged with the session generation that issued the call)
    RunStarted {
        generation: u64,
        run_id: String,
        result: WorkflowResult,
    },
    RunResumed {
        generation: u64,
        result: WorkflowResult,
    },
    CallFailed {
        generation: u64,
        message: String,
        error_kind: ErrorKind,
    },
}

impl Event {
    /// Generation of the call this event reports on, for workflow events
    pub fn generation(&self) -> Option<u64> {
        match self {
            Event::RunStarted { generation, .. }
            | Event::RunResumed { generation, .. }
            | Event::CallFailed { generation, .. } => Some(*generation),
            Event::Start | Event::UserSubmit { .. } | Event::Reset => None,
        }
    }
}

//! Reading workflow results
//!
//! Different revisions of the game workflow disagree on step and field
//! names (`message` vs `agentResponse`, `question-step` vs `game-step`).
//! `ResponseMapping` names them explicitly so the controller can be pointed
//! at any revision.

use super::types::{WorkflowResult, WorkflowStatus};
use serde_json::Value;

pub const DEFAULT_QUESTION_STEP: &str = "question-step";
pub const DEFAULT_MESSAGE_FIELDS: &[&str] = &["message", "agentResponse"];
pub const DEFAULT_WIN_STEPS: &[&str] = &["win-game-step", "win-step", "game-step", "question-step"];

/// Step and field names used to interpret a [`WorkflowResult`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMapping {
    /// Step resumed with each user message
    pub question_step: String,
    /// Suspend-payload fields holding the message to display, in priority order
    pub message_fields: Vec<String>,
    /// Steps whose output carries the win summary, in priority order
    pub win_steps: Vec<String>,
}

impl Default for ResponseMapping {
    fn default() -> Self {
        Self {
            question_step: DEFAULT_QUESTION_STEP.to_string(),
            message_fields: DEFAULT_MESSAGE_FIELDS.iter().map(ToString::to_string).collect(),
            win_steps: DEFAULT_WIN_STEPS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// What a workflow result means for the chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Waiting for the next user message
    Suspended {
        step: Option<String>,
        message: Option<String>,
    },
    /// Terminal success carrying a win summary
    Won(WinSummary),
    /// Terminal success with no readable summary
    CompletedWithoutSummary,
    Failed { message: String },
    Unexpected { status: String },
}

/// Output fields of the step that ended the game
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinSummary {
    pub agent_response: Option<String>,
    pub famous_person: Option<String>,
    pub guess_count: Option<u64>,
}

impl WinSummary {
    fn from_output(output: &Value) -> Option<Self> {
        let obj = output.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(ToString::to_string)
        };
        let summary = Self {
            agent_response: text("agentResponse"),
            famous_person: text("famousPerson"),
            guess_count: obj.get("guessCount").and_then(parse_count),
        };
        (summary.agent_response.is_some() || summary.famous_person.is_some()).then_some(summary)
    }

    /// Final assistant message announcing the win
    pub fn message(&self) -> String {
        let text = match (&self.agent_response, &self.famous_person) {
            (Some(response), _) => response.clone(),
            (None, Some(person)) => format!(
                "🎉 Congratulations! You guessed correctly! The famous person was {person}."
            ),
            (None, None) => "🎉 Congratulations! You guessed correctly!".to_string(),
        };
        match self.guess_count {
            Some(count) => format!("{text} You got it in {count} guesses!"),
            None => text,
        }
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_count)),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse::<f64>().ok().and_then(whole_count))
        }
        _ => None,
    }
}

/// `5.0` counts as 5; fractional or negative counts are dropped
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_count(value: f64) -> Option<u64> {
    let in_range = value >= 0.0 && value < 18_446_744_073_709_551_616.0;
    (in_range && value.fract().abs() < f64::EPSILON).then(|| value as u64)
}

impl ResponseMapping {
    /// Classify a start or resume result
    pub fn interpret(&self, result: &WorkflowResult) -> WorkflowOutcome {
        match result.status() {
            WorkflowStatus::Suspended => {
                let (step, message) = self.suspended_message(result);
                WorkflowOutcome::Suspended { step, message }
            }
            WorkflowStatus::Success => self
                .win_summary(result)
                .map_or(WorkflowOutcome::CompletedWithoutSummary, WorkflowOutcome::Won),
            WorkflowStatus::Failed => WorkflowOutcome::Failed {
                message: result
                    .error_message()
                    .unwrap_or_else(|| "Workflow run failed".to_string()),
            },
            WorkflowStatus::Other(status) => WorkflowOutcome::Unexpected { status },
        }
    }

    /// First suspended step name, and the first message found on any
    /// suspended step
    fn suspended_message(&self, result: &WorkflowResult) -> (Option<String>, Option<String>) {
        let first_step = result
            .suspended
            .iter()
            .flatten()
            .next()
            .cloned();

        for step_name in result.suspended.iter().flatten() {
            let Some(payload) = result
                .steps
                .get(step_name)
                .and_then(|s| s.suspend_payload.as_ref())
            else {
                continue;
            };
            if let Some(message) = self.payload_message(payload) {
                return (Some(step_name.clone()), Some(message));
            }
        }

        (first_step, None)
    }

    fn payload_message(&self, payload: &Value) -> Option<String> {
        self.message_fields.iter().find_map(|field| {
            payload
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        })
    }

    fn win_summary(&self, result: &WorkflowResult) -> Option<WinSummary> {
        self.win_steps
            .iter()
            .filter_map(|name| result.steps.get(name))
            .filter(|step| step.status == "success")
            .filter_map(|step| step.output.as_ref())
            .find_map(WinSummary::from_output)
            .or_else(|| result.result.as_ref().and_then(WinSummary::from_output))
    }
}

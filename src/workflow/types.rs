//! Wire types returned by the workflow service

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Handle to a created workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHandle {
    pub run_id: String,
}

/// Overall status of a workflow result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    Success,
    Suspended,
    Failed,
    /// Any status string the controller does not interpret
    Other(String),
}

impl WorkflowStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "suspended" => Self::Suspended,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Result of a single step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Result of a start or resume call
///
/// Only the fields the session controller reads are modelled; everything
/// else in the service's response is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub steps: HashMap<String, StepResult>,
    /// Suspended step paths, outermost step first
    #[serde(default)]
    pub suspended: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl WorkflowResult {
    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus::parse(&self.status)
    }

    /// Human-readable failure reason, if the service reported one
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Result suspended at `step` with the given payload
    #[cfg(test)]
    pub fn suspended(step: &str, payload: Value) -> Self {
        let mut steps = HashMap::new();
        steps.insert(
            step.to_string(),
            StepResult {
                status: "suspended".to_string(),
                suspend_payload: Some(payload),
                ..StepResult::default()
            },
        );
        Self {
            status: "suspended".to_string(),
            steps,
            suspended: vec![vec![step.to_string()]],
            ..Self::default()
        }
    }

    /// Successful result whose `step` produced `output`
    #[cfg(test)]
    pub fn success(step: &str, output: Value) -> Self {
        let mut steps = HashMap::new();
        steps.insert(
            step.to_string(),
            StepResult {
                status: "success".to_string(),
                output: Some(output),
                ..StepResult::default()
            },
        );
        Self {
            status: "success".to_string(),
            steps,
            ..Self::default()
        }
    }
}

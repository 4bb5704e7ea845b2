//! Workflow service configuration

use super::mapping::ResponseMapping;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4111";
pub const DEFAULT_WORKFLOW_ID: &str = "headsUpWorkflow";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection and interpretation settings for the workflow service
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub base_url: String,
    pub workflow_id: String,
    pub request_timeout: Duration,
    pub mapping: ResponseMapping,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            workflow_id: DEFAULT_WORKFLOW_ID.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mapping: ResponseMapping::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or blank values keep
    /// their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mut mapping = defaults.mapping;
        if let Some(step) = get("HEADSUP_QUESTION_STEP") {
            mapping.question_step = step.trim().to_string();
        }
        if let Some(fields) = get("HEADSUP_MESSAGE_FIELDS").map(|v| split_list(&v)) {
            if !fields.is_empty() {
                mapping.message_fields = fields;
            }
        }
        if let Some(steps) = get("HEADSUP_WIN_STEPS").map(|v| split_list(&v)) {
            if !steps.is_empty() {
                mapping.win_steps = steps;
            }
        }

        let request_timeout = get("HEADSUP_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(defaults.request_timeout, Duration::from_secs);

        Self {
            base_url: get("HEADSUP_WORKFLOW_URL")
                .map_or(defaults.base_url, |url| url.trim().trim_end_matches('/').to_string()),
            workflow_id: get("HEADSUP_WORKFLOW_ID")
                .map_or(defaults.workflow_id, |id| id.trim().to_string()),
            request_timeout,
            mapping,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

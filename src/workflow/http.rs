//! HTTP client for the workflow service's REST API

use super::config::WorkflowConfig;
use super::types::{RunHandle, WorkflowResult};
use super::{WorkflowClient, WorkflowError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Workflow client speaking `/api/workflows/{id}/...`
pub struct HttpWorkflowClient {
    client: Client,
    base_url: String,
    workflow_id: String,
}

impl HttpWorkflowClient {
    pub fn new(config: &WorkflowConfig) -> Result<Self, WorkflowError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkflowError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            workflow_id: config.workflow_id.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/api/workflows/{}/{action}",
            self.base_url, self.workflow_id
        )
    }

    async fn post<T: DeserializeOwned>(
        &self,
        action: &str,
        run_id: Option<&str>,
        body: &Value,
    ) -> Result<T, WorkflowError> {
        let mut request = self.client.post(self.endpoint(action)).json(body);
        if let Some(run_id) = run_id {
            request = request.query(&[("runId", run_id)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                WorkflowError::timeout(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                WorkflowError::network(format!("Connection failed: {e}"))
            } else {
                WorkflowError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WorkflowError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            WorkflowError::invalid_response(format!(
                "Failed to parse response: {e} - body: {}",
                truncate_body(&body)
            ))
        })
    }
}

/// Response bodies end up in client-visible error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

fn truncate_body(body: &str) -> String {
    let mut chars = body.chars();
    let prefix: String = chars.by_ref().take(MAX_ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{prefix}...")
    } else {
        prefix
    }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> WorkflowError {
    // The service wraps errors as {"error": "..."}; fall back to the raw body
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(ToString::to_string))
        .map_or_else(|| truncate_body(body), |m| truncate_body(&m));

    match status.as_u16() {
        404 => WorkflowError::not_found(format!("Not found: {message}")),
        408 | 504 => WorkflowError::timeout(format!("Timed out: {message}")),
        400..=499 => WorkflowError::invalid_request(format!("Invalid request: {message}")),
        500..=599 => WorkflowError::server_error(format!("Server error: {message}")),
        _ => WorkflowError::unknown(format!("HTTP {status}: {message}")),
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn create_run(&self) -> Result<RunHandle, WorkflowError> {
        self.post("create-run", None, &json!({})).await
    }

    async fn start_run(&self, run_id: &str, input: &Value) -> Result<WorkflowResult, WorkflowError> {
        let body = json!({
            "inputData": input,
            "runtimeContext": {},
        });
        self.post("start-async", Some(run_id), &body).await
    }

    async fn resume_run(
        &self,
        run_id: &str,
        step: &str,
        resume_data: &Value,
    ) -> Result<WorkflowResult, WorkflowError> {
        let body = json!({
            "step": step,
            "resumeData": resume_data,
            "runtimeContext": {},
        });
        self.post("resume-async", Some(run_id), &body).await
    }

    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }
}

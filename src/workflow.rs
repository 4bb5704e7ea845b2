//! Workflow service abstraction
//!
//! The game itself runs inside an external workflow service. This module
//! provides the client interface the session controller consumes, the
//! result types it returns, and the mapping used to read those results.

mod config;
mod error;
mod http;
mod mapping;
mod types;

pub use config::WorkflowConfig;
pub use error::{WorkflowError, WorkflowErrorKind};
pub use http::HttpWorkflowClient;
#[allow(unused_imports)] // Public API re-exports
pub use mapping::{ResponseMapping, WinSummary, WorkflowOutcome};
#[allow(unused_imports)] // Public API re-exports
pub use types::{RunHandle, StepResult, WorkflowResult, WorkflowStatus};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Client for the external workflow service
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Create a new run of the game workflow
    async fn create_run(&self) -> Result<RunHandle, WorkflowError>;

    /// Start a created run with its initial input
    async fn start_run(&self, run_id: &str, input: &Value) -> Result<WorkflowResult, WorkflowError>;

    /// Resume a suspended step of a run
    async fn resume_run(
        &self,
        run_id: &str,
        step: &str,
        resume_data: &Value,
    ) -> Result<WorkflowResult, WorkflowError>;

    /// Identifier of the workflow this client drives
    fn workflow_id(&self) -> &str;
}

#[async_trait]
impl<T: WorkflowClient + ?Sized> WorkflowClient for Arc<T> {
    async fn create_run(&self) -> Result<RunHandle, WorkflowError> {
        (**self).create_run().await
    }

    async fn start_run(&self, run_id: &str, input: &Value) -> Result<WorkflowResult, WorkflowError> {
        (**self).start_run(run_id, input).await
    }

    async fn resume_run(
        &self,
        run_id: &str,
        step: &str,
        resume_data: &Value,
    ) -> Result<WorkflowResult, WorkflowError> {
        (**self).resume_run(run_id, step, resume_data).await
    }

    fn workflow_id(&self) -> &str {
        (**self).workflow_id()
    }
}

/// Logging wrapper for workflow clients
pub struct LoggingClient {
    inner: Arc<dyn WorkflowClient>,
    workflow_id: String,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn WorkflowClient>) -> Self {
        let workflow_id = inner.workflow_id().to_string();
        Self { inner, workflow_id }
    }

    fn log_outcome<T>(
        &self,
        call: &'static str,
        run_id: Option<&str>,
        started: std::time::Instant,
        result: &Result<T, WorkflowError>,
        status: impl Fn(&T) -> String,
    ) {
        let duration = started.elapsed();
        match result {
            Ok(value) => {
                tracing::info!(
                    workflow = %self.workflow_id,
                    call,
                    run_id = run_id.unwrap_or("-"),
                    duration_ms = %duration.as_millis(),
                    status = %status(value),
                    "Workflow call completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    workflow = %self.workflow_id,
                    call,
                    run_id = run_id.unwrap_or("-"),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Workflow call failed"
                );
            }
        }
    }
}

#[async_trait]
impl WorkflowClient for LoggingClient {
    async fn create_run(&self) -> Result<RunHandle, WorkflowError> {
        let start = std::time::Instant::now();
        let result = self.inner.create_run().await;
        self.log_outcome("create_run", None, start, &result, |h| h.run_id.clone());
        result
    }

    async fn start_run(&self, run_id: &str, input: &Value) -> Result<WorkflowResult, WorkflowError> {
        let start = std::time::Instant::now();
        let result = self.inner.start_run(run_id, input).await;
        self.log_outcome("start_run", Some(run_id), start, &result, |r| r.status.clone());
        result
    }

    async fn resume_run(
        &self,
        run_id: &str,
        step: &str,
        resume_data: &Value,
    ) -> Result<WorkflowResult, WorkflowError> {
        let start = std::time::Instant::now();
        let result = self.inner.resume_run(run_id, step, resume_data).await;
        self.log_outcome("resume_run", Some(run_id), start, &result, |r| r.status.clone());
        result
    }

    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }
}

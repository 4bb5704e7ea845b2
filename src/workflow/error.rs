//! Workflow client error types

use thiserror::Error;

/// Workflow call error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct WorkflowError {
    pub kind: WorkflowErrorKind,
    pub message: String,
}

impl WorkflowError {
    pub fn new(kind: WorkflowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::NotFound, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::InvalidRequest, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::InvalidResponse, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(WorkflowErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowErrorKind {
    /// Connection refused, reset, DNS failure
    Network,
    /// Request exceeded the client timeout
    Timeout,
    /// Unknown workflow or run (404)
    NotFound,
    /// Server error (5xx)
    ServerError,
    /// Request rejected (4xx other than 404)
    InvalidRequest,
    /// Body could not be decoded
    InvalidResponse,
    Unknown,
}

impl WorkflowErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::ServerError)
    }
}

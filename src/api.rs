//! HTTP API for the chat front end

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::SessionManager;
use crate::workflow::{ResponseMapping, WorkflowClient};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(client: Arc<dyn WorkflowClient>, mapping: ResponseMapping) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(client, mapping)),
        }
    }
}

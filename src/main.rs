//! Heads Up chat - web front end for the famous-person guessing game
//!
//! The game itself runs as a workflow on an external service. This binary
//! relays the chat between a browser and that workflow.

mod api;
mod runtime;
mod state_machine;
mod workflow;

use api::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workflow::{HttpWorkflowClient, LoggingClient, WorkflowClient, WorkflowConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "headsup_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = WorkflowConfig::from_env();

    let port: u16 = std::env::var("HEADSUP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let game_idle = std::env::var("HEADSUP_GAME_IDLE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|secs| *secs > 0)
        .map_or(Duration::from_secs(3600), Duration::from_secs);

    tracing::info!(
        base_url = %config.base_url,
        workflow = %config.workflow_id,
        timeout_secs = config.request_timeout.as_secs(),
        question_step = %config.mapping.question_step,
        "Workflow client configured"
    );

    let http_client: Arc<dyn WorkflowClient> = Arc::new(HttpWorkflowClient::new(&config)?);
    let client: Arc<dyn WorkflowClient> = Arc::new(LoggingClient::new(http_client));

    // Create application state
    let state = AppState::new(client, config.mapping);

    // Games nobody streams or touches are stopped after `game_idle`
    let eviction_shutdown = CancellationToken::new();
    tokio::spawn(state.sessions.clone().run_eviction(
        game_idle,
        (game_idle / 4).max(Duration::from_secs(1)),
        eviction_shutdown.clone(),
    ));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Heads Up chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    eviction_shutdown.cancel();
    Ok(())
}

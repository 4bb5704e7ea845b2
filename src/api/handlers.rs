//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, CreateGameResponse, ErrorResponse, ResetResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{SessionSnapshot, SseEvent, SubmitError};
use crate::state_machine::{Event, SessionState, TransitionError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Game lifecycle
        .route("/api/games", post(create_game))
        .route("/api/games/:id", get(get_game).delete(delete_game))
        // SSE streaming
        .route("/api/games/:id/stream", get(stream_game))
        // User actions
        .route("/api/games/:id/chat", post(send_chat))
        .route("/api/games/:id/reset", post(reset_game))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Game Lifecycle
// ============================================================

async fn create_game(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateGameResponse>), AppError> {
    let game_id = state.sessions.create().await.map_err(AppError::Internal)?;
    Ok((StatusCode::CREATED, Json(CreateGameResponse { game_id })))
}

async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state
        .sessions
        .snapshot(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Game not found: {id}")))
}

async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.sessions.remove(&id).await {
        return Err(AppError::NotFound(format!("Game not found: {id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (snapshot, broadcast_rx) = state
        .sessions
        .subscribe(&id)
        .await
        .map_err(AppError::NotFound)?;

    Ok(sse_stream(SseEvent::Init { snapshot }, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let snapshot = state
        .sessions
        .snapshot(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Game not found: {id}")))?;

    // Fast path; the runtime's answer below is authoritative
    if let Some(rejection) = submit_rejection(&snapshot.state, &req.text) {
        return Err(AppError::from(SubmitError::Rejected(rejection)));
    }

    state.sessions.submit(&id, req.text).await?;

    Ok(Json(ChatResponse { queued: true }))
}

async fn reset_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    state
        .sessions
        .send_event(&id, Event::Reset)
        .await
        .map_err(AppError::NotFound)?;

    Ok(Json(ResetResponse { ok: true }))
}

/// Why a submission of `text` would be refused in `state`, if it would be
fn submit_rejection(state: &SessionState, text: &str) -> Option<TransitionError> {
    if text.trim().is_empty() {
        return Some(TransitionError::EmptyInput);
    }
    match state {
        SessionState::Starting | SessionState::Resuming { .. } => Some(TransitionError::Busy),
        SessionState::Completed { .. } => Some(TransitionError::GameOver),
        s if !s.accepts_input() => Some(TransitionError::NoActiveRun),
        _ => None,
    }
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("headsup-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::NotFound(_) => AppError::NotFound(err.to_string()),
            SubmitError::Rejected(TransitionError::EmptyInput) => AppError::BadRequest(err.to_string()),
            SubmitError::Rejected(_) => AppError::Conflict(err.to_string()),
            SubmitError::Stopped => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

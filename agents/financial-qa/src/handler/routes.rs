//! Route definitions for the QA API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::{
    AppState, ChatRequest, ChatResponse, EndSessionRequest, EndSessionResponse, ErrorInfo,
    ErrorResponse, HealthResponse, SessionResponse,
};
use crate::contracts::{SessionId, SessionStatus};
use crate::error::QaError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::InternalError(msg) => {
                msg
            }
        };
        let response = ErrorResponse::new(ErrorInfo::new(self.error_code(), message));

        (status, Json(response)).into_response()
    }
}

impl From<QaError> for ApiError {
    fn from(err: QaError) -> Self {
        if err.is_user_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::InternalError(format!("Chat processing failed: {}", err))
        }
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid session id '{}'", raw)))
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Conversation endpoints
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/sessions", post(start_session))
        .route("/api/v1/sessions/:id/end", post(end_session))
        // Operational endpoints
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// POST /api/v1/chat - Answer a question within a session
///
/// Starts a session when none is given and registers ids this process has
/// not seen. Questions on an ended session are rejected. A session started
/// by a request whose question fails is closed and forgotten, since the error
/// response carries no session id.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }

    let session_id = match request.session_id.as_deref() {
        Some(raw) => parse_session_id(raw)?,
        None => Uuid::new_v4(),
    };

    let created = state.sessions.open(session_id);
    if created {
        state
            .chatbot
            .start_conversation_session(Some(session_id))
            .await;
    } else if state.sessions.status(session_id) == Some(SessionStatus::Ended) {
        return Err(ApiError::BadRequest(format!(
            "Session {} has ended",
            session_id
        )));
    }

    let history = state.sessions.history(session_id);
    let exchange = match state
        .chatbot
        .ask_question_in_session(session_id, &request.question, &history)
        .await
    {
        Ok(exchange) => exchange,
        Err(e) => {
            if created {
                state
                    .chatbot
                    .end_conversation_session(
                        session_id,
                        Some("Session closed after failed question"),
                    )
                    .await;
                state.sessions.remove(session_id);
            }
            return Err(e.into());
        }
    };

    let response = ChatResponse {
        answer: exchange.answer().to_string(),
        sources: exchange.sources().to_vec(),
        company_identified: exchange.company_identified(),
        document_count: exchange.document_count(),
        session_id: session_id.to_string(),
    };
    state.sessions.append(session_id, exchange)?;

    Ok(Json(response))
}

/// POST /api/v1/sessions - Start a new session
pub async fn start_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let session_id = state.chatbot.start_conversation_session(None).await;
    state.sessions.open(session_id);

    Json(SessionResponse {
        session_id: session_id.to_string(),
    })
}

/// POST /api/v1/sessions/:id/end - End a session
///
/// Ending a session twice succeeds and reports `already_ended`.
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    body: Option<Json<EndSessionRequest>>,
) -> Result<Json<EndSessionResponse>, ApiError> {
    let session_id = parse_session_id(&raw_id)?;
    let summary = body.and_then(|Json(request)| request.summary);

    if state.sessions.get(session_id).is_none() {
        return Err(ApiError::NotFound(format!(
            "Session {} not found",
            session_id
        )));
    }

    let ended = state.sessions.end(session_id, summary.clone())?;
    if ended {
        state
            .chatbot
            .end_conversation_session(session_id, summary.as_deref())
            .await;
    }

    Ok(Json(EndSessionResponse {
        message: "Session ended".to_string(),
        session_id: session_id.to_string(),
        already_ended: !ended,
    }))
}

/// GET /health - Health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        tracing_enabled: state.chatbot.tracer().is_enabled(),
        project: state.project.clone(),
        active_sessions: state.sessions.active_count(),
        version: crate::AGENT_VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let registry = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Metrics are not enabled".to_string()))?;

    let body = registry
        .encode_text()
        .map_err(|e| ApiError::InternalError(format!("Failed to encode metrics: {}", e)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

//! HTTP API for the financial QA assistant
//!
//! - `routes`: axum router and endpoint handlers
//!
//! Request and response bodies live here. Successful responses are plain
//! JSON bodies; failures use the [`ErrorResponse`] envelope.

pub mod routes;

pub use routes::{chat, create_router, end_session, health_check, metrics, start_session, ApiError};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::engine::QaChatbot;
use crate::session::SessionRegistry;
use crate::telemetry::QaMetricsRegistry;

/// Shared state of the HTTP API
pub struct AppState {
    pub chatbot: QaChatbot,
    pub sessions: SessionRegistry,
    pub metrics: Option<Arc<QaMetricsRegistry>>,
    pub project: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(chatbot: QaChatbot, project: impl Into<String>) -> Self {
        Self {
            chatbot,
            sessions: SessionRegistry::new(),
            metrics: None,
            project: project.into(),
            start_time: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<QaMetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// `POST /api/v1/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    /// Existing session to continue. A new session is started when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub company_identified: bool,
    pub document_count: usize,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

/// `POST /api/v1/sessions/:id/end`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub message: String,
    pub session_id: String,
    pub already_ended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub tracing_enabled: bool,
    pub project: String,
    pub active_sessions: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Error envelope returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub metadata: ResponseMetadata,
}

impl ErrorResponse {
    pub fn new(error: ErrorInfo) -> Self {
        Self {
            success: false,
            error,
            metadata: ResponseMetadata::new(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Response metadata for tracing and debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    /// ISO 8601
    pub timestamp: String,
    pub version: String,
}

impl ResponseMetadata {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: crate::AGENT_VERSION.to_string(),
        }
    }
}

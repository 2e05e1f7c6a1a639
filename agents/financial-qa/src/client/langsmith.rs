//! LangSmith runs API client
//!
//! Creates and closes runs over HTTP:
//! - `POST {endpoint}/runs` when a span opens
//! - `PATCH {endpoint}/runs/{id}` when it closes
//!
//! Transient failures (network errors, 5xx, 429) are retried with
//! exponential backoff. Rejections (4xx) are not.

use chrono::{DateTime, Utc};
use finqa_span::{Fields, SpanId, SpanOutcome, SpanRequest};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::DEFAULT_LANGSMITH_ENDPOINT;
use crate::telemetry::{Result, TelemetryError};

/// Configuration for the LangSmith client
#[derive(Debug, Clone)]
pub struct LangSmithClientConfig {
    /// Base URL of the LangSmith API
    pub endpoint: String,

    /// API key sent as `x-api-key`
    pub api_key: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for LangSmithClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LANGSMITH_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout_ms: 5000,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Body of `POST /runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCreate {
    pub id: SpanId,
    pub name: String,
    pub run_type: String,
    pub inputs: Fields,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<SpanId>,
    pub session_name: String,
    pub start_time: DateTime<Utc>,
}

impl RunCreate {
    pub fn from_request(request: SpanRequest, project: &str) -> Self {
        Self {
            id: request.id,
            name: request.name,
            run_type: "chain".to_string(),
            inputs: request.inputs,
            tags: request.tags,
            parent_run_id: request.parent_id,
            session_name: project.to_string(),
            start_time: Utc::now(),
        }
    }
}

/// Body of `PATCH /runs/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub end_time: DateTime<Utc>,
}

impl RunUpdate {
    pub fn from_outcome(outcome: SpanOutcome) -> Self {
        let (outputs, error) = match outcome {
            SpanOutcome::Completed(outputs) => (Some(outputs), None),
            SpanOutcome::Failed(error) => (None, Some(error.to_string())),
        };
        Self {
            outputs,
            error,
            end_time: Utc::now(),
        }
    }
}

/// HTTP client for the LangSmith runs API
pub struct LangSmithClient {
    client: Client,
    config: LangSmithClientConfig,
}

impl LangSmithClient {
    /// Create a client with default retry settings
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(LangSmithClientConfig {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    /// Create a client with custom configuration
    pub fn with_config(config: LangSmithClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TelemetryError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Record the start of a run
    pub async fn create_run(&self, run: &RunCreate) -> Result<()> {
        let url = format!("{}/runs", self.base_url());
        self.send_with_retry(Method::POST, &url, run, run.id).await
    }

    /// Record the end of a run
    pub async fn update_run(&self, id: SpanId, update: &RunUpdate) -> Result<()> {
        let url = format!("{}/runs/{}", self.base_url(), id);
        self.send_with_retry(Method::PATCH, &url, update, id).await
    }

    async fn send_with_retry<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: &B,
        run_id: SpanId,
    ) -> Result<()> {
        let mut last_error = None;
        let mut backoff_ms = self.config.initial_backoff_ms;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    attempt = attempt,
                    backoff_ms = backoff_ms,
                    run_id = %run_id,
                    "Retrying LangSmith request"
                );
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms as f64 * self.config.backoff_multiplier) as u64;
                backoff_ms = backoff_ms.min(self.config.max_backoff_ms);
            }

            match self.send_once(method.clone(), url, body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        error = %e,
                        run_id = %run_id,
                        "LangSmith request failed"
                    );
                    let permanent = is_permanent_error(&e);
                    last_error = Some(e);
                    if permanent {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TelemetryError::EmissionFailed("Unknown error during run delivery".to_string())
        }))
    }

    async fn send_once<B: Serialize + ?Sized>(&self, method: Method, url: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .request(method, url)
            .header("x-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| TelemetryError::HttpError(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else if status == StatusCode::BAD_REQUEST
            || status == StatusCode::UNPROCESSABLE_ENTITY
            || status == StatusCode::CONFLICT
        {
            let error_text = response.text().await.unwrap_or_default();
            Err(TelemetryError::EmissionFailed(format!(
                "Bad request: {}",
                error_text
            )))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(TelemetryError::EmissionFailed(format!(
                "Authentication failed: {}",
                status
            )))
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(TelemetryError::HttpError(format!("Server error: {}", status)))
        } else {
            Err(TelemetryError::HttpError(format!(
                "Unexpected status: {}",
                status
            )))
        }
    }

    pub fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

/// Determine if an error is permanent (should not retry)
fn is_permanent_error(error: &TelemetryError) -> bool {
    match error {
        TelemetryError::EmissionFailed(msg) => {
            msg.contains("Bad request") || msg.contains("Authentication failed")
        }
        TelemetryError::SerializationFailed(_) => true,
        TelemetryError::ConfigError(_) => true,
        _ => false,
    }
}

/// Builder for LangSmithClient
pub struct LangSmithClientBuilder {
    config: LangSmithClientConfig,
}

impl LangSmithClientBuilder {
    pub fn new() -> Self {
        Self {
            config: LangSmithClientConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.config.timeout_ms = timeout;
        self
    }

    /// Set retry attempts and the initial backoff delay
    pub fn retry_config(mut self, max_retries: u32, initial_backoff_ms: u64) -> Self {
        self.config.max_retries = max_retries;
        self.config.initial_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn build(self) -> Result<LangSmithClient> {
        LangSmithClient::with_config(self.config)
    }
}

impl Default for LangSmithClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

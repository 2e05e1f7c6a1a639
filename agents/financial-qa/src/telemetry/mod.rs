//! Telemetry module for the financial QA assistant
//!
//! - `emitter`: non-blocking span delivery to LangSmith
//! - `metrics`: Prometheus metrics for exchanges, stages and span delivery
//!
//! [`build_tracer`] turns a [`TracingConfig`] into the process tracer.

pub mod emitter;
pub mod metrics;

pub use emitter::{RemoteSpanSink, SpanEvent};
pub use metrics::{QaMetrics, QaMetricsRegistry, StageTimer};

use finqa_span::Tracer;
use std::sync::Arc;
use thiserror::Error;

use crate::client::langsmith::{LangSmithClient, LangSmithClientConfig};
use crate::config::TracingConfig;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to emit span event: {0}")]
    EmissionFailed(String),

    #[error("Failed to serialize event: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(String),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Build the process tracer from configuration.
///
/// Returns a tracer backed by [`RemoteSpanSink`] when tracing is enabled and
/// a disabled tracer otherwise. A client that cannot be constructed also
/// yields a disabled tracer. Must be called inside a Tokio runtime.
pub fn build_tracer(config: &TracingConfig, metrics: Option<Arc<QaMetrics>>) -> Tracer {
    if !config.is_enabled() {
        tracing::info!("LangSmith tracing disabled");
        return Tracer::disabled();
    }

    let client_config = LangSmithClientConfig {
        endpoint: config.endpoint.clone(),
        api_key: config.api_key.clone().unwrap_or_default(),
        timeout_ms: config.timeout_ms,
        max_retries: config.max_retries,
        initial_backoff_ms: config.initial_backoff_ms,
        ..Default::default()
    };

    match LangSmithClient::with_config(client_config) {
        Ok(client) => {
            tracing::info!(
                project = %config.project,
                endpoint = %config.endpoint,
                "LangSmith tracing enabled"
            );
            let sink = RemoteSpanSink::new(client, &config.project, config.queue_size, metrics);
            Tracer::new(Arc::new(sink))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create LangSmith client, tracing disabled");
            Tracer::disabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_builds_disabled_tracer() {
        let tracer = build_tracer(&TracingConfig::default(), None);
        assert!(!tracer.is_enabled());
    }

    #[tokio::test]
    async fn test_enabled_config_builds_remote_tracer() {
        let config = TracingConfig {
            enabled: true,
            api_key: Some("ls-key".to_string()),
            endpoint: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };

        let tracer = build_tracer(&config, None);
        assert!(tracer.is_enabled());
        assert_eq!(tracer.sink_name(), "langsmith");
    }

    #[test]
    fn test_error_display() {
        let err = TelemetryError::HttpError("Server error: 502".to_string());
        assert_eq!(err.to_string(), "HTTP client error: Server error: 502");
    }
}

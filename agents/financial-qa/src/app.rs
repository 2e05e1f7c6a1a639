//! Application wiring
//!
//! Builds the tracer, the model and search clients, the two agents and the
//! chatbot from an [`AppConfig`]. Everything is constructed once and passed
//! down; nothing is global.

use finqa_span::{MemorySink, Tracer};
use std::sync::Arc;

use crate::agent::{AgentRuntime, AnswerGenerationAgent, ChatModel, CompanyExtractionAgent, ModelParams};
use crate::client::{AzureChatClient, HttpDocumentSearcher};
use crate::config::AppConfig;
use crate::engine::QaChatbot;
use crate::error::{QaError, Result};
use crate::handler::AppState;
use crate::telemetry::{build_tracer, QaMetricsRegistry};

/// A fully wired assistant.
pub struct Application {
    config: AppConfig,
    chatbot: QaChatbot,
    metrics: Arc<QaMetricsRegistry>,
    local_sink: Option<Arc<MemorySink>>,
}

impl Application {
    /// Wire the production clients.
    ///
    /// With `local_trace` spans are kept in memory instead of being sent to
    /// LangSmith. Must be called inside a Tokio runtime.
    pub fn build(config: AppConfig, local_trace: bool) -> Result<Self> {
        let metrics = Arc::new(QaMetricsRegistry::new().map_err(|e| {
            QaError::configuration(format!("Failed to create metrics registry: {}", e))
        })?);

        let (tracer, local_sink) = if local_trace {
            let sink = Arc::new(MemorySink::new());
            (Tracer::new(sink.clone()), Some(sink))
        } else {
            (build_tracer(&config.tracing, Some(metrics.metrics())), None)
        };

        let model: Arc<dyn ChatModel> = Arc::new(AzureChatClient::from_config(&config.model)?);
        let runtime = AgentRuntime::new(tracer.clone(), model).with_params(ModelParams {
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            context_window: config.model.context_window,
        });

        let chatbot = QaChatbot::new(
            tracer,
            Arc::new(CompanyExtractionAgent::new(runtime.clone())),
            Arc::new(HttpDocumentSearcher::from_config(&config.search)?),
            Arc::new(AnswerGenerationAgent::new(runtime)),
        )
        .with_metrics(metrics.metrics());

        tracing::info!(
            project = %config.tracing.project,
            tracing_enabled = chatbot.tracer().is_enabled(),
            sink = chatbot.tracer().sink_name(),
            "Financial QA assistant initialized"
        );

        Ok(Self {
            config,
            chatbot,
            metrics,
            local_sink,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn chatbot(&self) -> &QaChatbot {
        &self.chatbot
    }

    pub fn metrics(&self) -> &Arc<QaMetricsRegistry> {
        &self.metrics
    }

    /// Rendered span tree when running with a local trace.
    pub fn local_trace(&self) -> Option<String> {
        self.local_sink.as_ref().map(|sink| sink.render_tree())
    }

    /// Hand the chatbot over to the HTTP API.
    pub fn into_state(self) -> AppState {
        AppState::new(self.chatbot, self.config.tracing.project).with_metrics(self.metrics)
    }
}

//! Conversational orchestrator
//!
//! [`QaChatbot`] answers one question as a root span with three nested
//! stages (company extraction, document search, answer generation) and
//! manages session spans. Stages run strictly in order; the first failing
//! stage aborts the exchange and its error is returned unchanged.

pub mod collaborators;

pub use collaborators::{AnswerGenerator, CompanyExtractor, DocumentSearcher};

use finqa_span::{traced_with, ErrorKind, Fields, Operation, SpanOutcome, Tracer};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::{CompanyInfo, Exchange, SessionId};
use crate::error::QaError;
use crate::telemetry::QaMetrics;

pub const DEFAULT_CHATBOT_NAME: &str = "QaChatbot";

pub const STAGE_COMPANY_EXTRACTION: &str = "company_extraction";
pub const STAGE_DOCUMENT_SEARCH: &str = "document_search";
pub const STAGE_ANSWER_GENERATION: &str = "answer_generation";

const QUESTION_PREVIEW_CHARS: usize = 100;

fn single_field<T: Serialize>(key: &str, value: T) -> Fields {
    let mut fields = Fields::new();
    fields.insert(
        key.to_string(),
        serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
    );
    fields
}

fn preview(question: &str) -> String {
    if question.chars().count() > QUESTION_PREVIEW_CHARS {
        let cut: String = question.chars().take(QUESTION_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        question.to_string()
    }
}

/// Question answering orchestrator.
pub struct QaChatbot {
    name: String,
    tracer: Tracer,
    extractor: Arc<dyn CompanyExtractor>,
    searcher: Arc<dyn DocumentSearcher>,
    generator: Arc<dyn AnswerGenerator>,
    metrics: Option<Arc<QaMetrics>>,
}

impl QaChatbot {
    pub fn new(
        tracer: Tracer,
        extractor: Arc<dyn CompanyExtractor>,
        searcher: Arc<dyn DocumentSearcher>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            name: DEFAULT_CHATBOT_NAME.to_string(),
            tracer,
            extractor,
            searcher,
            generator,
            metrics: None,
        }
    }

    /// Override the name used as span name prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<QaMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// AND a chatbot-level tracing flag into the process flag.
    pub fn with_local_tracing(mut self, enabled: bool) -> Self {
        self.tracer = self.tracer.with_local_flag(enabled);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Answer a question outside of any session.
    pub async fn ask_question(
        &self,
        question: &str,
        history: &[Exchange],
    ) -> Result<Exchange, QaError> {
        self.answer(question, history, None).await
    }

    /// Answer a question; the query span is parented to the session span.
    pub async fn ask_question_in_session(
        &self,
        session_id: SessionId,
        question: &str,
        history: &[Exchange],
    ) -> Result<Exchange, QaError> {
        self.answer(question, history, Some(session_id)).await
    }

    async fn answer(
        &self,
        question: &str,
        history: &[Exchange],
        session_id: Option<SessionId>,
    ) -> Result<Exchange, QaError> {
        if question.trim().is_empty() {
            return Err(QaError::invalid_input("question must not be empty"));
        }

        let root = self
            .tracer
            .start(
                Operation::new(format!("{}_query", self.name))
                    .input("question", question)
                    .input("conversation_history", history)
                    .tags(["chatbot", "qa", "query"])
                    .parent(session_id),
            )
            .await;

        tracing::info!(
            question = %preview(question),
            tracing_enabled = self.tracer.is_enabled(),
            "Processing question"
        );

        let result = self.run_stages(question, root.id()).await;

        match &result {
            Ok(exchange) => {
                tracing::info!(
                    document_count = exchange.document_count(),
                    has_company = exchange.company_identified(),
                    "Question processed successfully"
                );
            }
            Err(e) => {
                tracing::error!(error_type = e.kind(), error = %e, "Failed to process question");
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_exchange(result.is_ok());
        }

        root.finish(result, Exchange::to_fields).await
    }

    async fn run_stages(&self, question: &str, root_id: Option<Uuid>) -> Result<Exchange, QaError> {
        let company_info = self
            .stage(
                Operation::new(STAGE_COMPANY_EXTRACTION)
                    .input("question", question)
                    .tags(["chatbot", "company-extraction"])
                    .parent(root_id),
                |info: &CompanyInfo| single_field("company_info", info),
                || self.extractor.extract_company_info(question),
            )
            .await?;

        let sources = self
            .stage(
                Operation::new(STAGE_DOCUMENT_SEARCH)
                    .input("company_info", &company_info)
                    .input("question", question)
                    .tags(["chatbot", "document-search"])
                    .parent(root_id),
                |docs: &Vec<String>| single_field("document_count", docs.len()),
                || self.searcher.search_documents(&company_info, question),
            )
            .await?;

        let answer = self
            .stage(
                Operation::new(STAGE_ANSWER_GENERATION)
                    .input("question", question)
                    .input("document_count", sources.len())
                    .input("company_info", &company_info)
                    .tags(["chatbot", "answer-generation"])
                    .parent(root_id),
                |answer: &String| single_field("answer", answer),
                || self.generator.generate_answer(question, &sources, &company_info),
            )
            .await?;

        Ok(Exchange::new(question, answer, company_info, sources))
    }

    async fn stage<T, F, Fut, P>(
        &self,
        operation: Operation,
        to_outputs: P,
        thunk: F,
    ) -> Result<T, QaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QaError>>,
        P: FnOnce(&T) -> Fields,
    {
        let stage = operation.name().to_string();
        let _timer = self.metrics.as_deref().map(|m| m.start_stage_timer(&stage));

        let result = traced_with(&self.tracer, operation, to_outputs, thunk).await;

        if let (Err(e), Some(metrics)) = (&result, &self.metrics) {
            metrics.record_stage_failure(&stage, e.kind());
        }
        result
    }

    /// Open a session span and return the session id.
    ///
    /// Generates a v4 id when none is given. Never fails and does not check
    /// for duplicates.
    pub async fn start_conversation_session(&self, session_id: Option<SessionId>) -> SessionId {
        let session_id = session_id.unwrap_or_else(Uuid::new_v4);

        self.tracer
            .create_span(
                Operation::new(format!("{}_session", self.name))
                    .with_id(session_id)
                    .input("session_id", session_id)
                    .tags(["chatbot", "session"])
                    .into_request(),
            )
            .await;

        tracing::info!(session_id = %session_id, "Conversation session started");
        session_id
    }

    /// Close a session span. Closing twice is a no-op.
    pub async fn end_conversation_session(&self, session_id: SessionId, summary: Option<&str>) {
        let mut outputs = single_field("session_ended", true);
        if let Some(summary) = summary {
            outputs.insert(
                "summary".to_string(),
                serde_json::Value::String(summary.to_string()),
            );
        }

        self.tracer
            .end_span(session_id, SpanOutcome::Completed(outputs))
            .await;

        tracing::info!(session_id = %session_id, "Conversation session ended");
    }

    /// Record a point-in-time event, optionally under a session span.
    pub async fn trace_custom_event(
        &self,
        event_name: &str,
        data: Fields,
        session_id: Option<SessionId>,
    ) {
        if !self.tracer.is_enabled() {
            return;
        }

        let handle = self
            .tracer
            .create_span(
                Operation::new(event_name)
                    .inputs(data)
                    .tag("custom-event")
                    .parent(session_id)
                    .into_request(),
            )
            .await;

        match handle {
            Some(handle) => {
                self.tracer
                    .end_span(
                        handle.id,
                        SpanOutcome::Completed(single_field("event_processed", true)),
                    )
                    .await;
            }
            None => {
                tracing::error!(event_name = %event_name, "Failed to trace custom event");
            }
        }
    }
}

//! Span emitter for LangSmith
//!
//! Queues span start and end records on a bounded channel and delivers them
//! from a background task, so traced operations never wait on the network.
//!
//! # Features
//!
//! - `try_send` onto the queue: a full queue drops the record and counts it
//! - Records are delivered in the order they were queued
//! - Retry logic with exponential backoff (via the LangSmith client)

use async_trait::async_trait;
use finqa_span::{SinkError, SpanId, SpanOutcome, SpanRequest, SpanSink};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::metrics::QaMetrics;
use crate::client::langsmith::{LangSmithClient, RunCreate, RunUpdate};

/// One queued delivery.
#[derive(Debug, Clone)]
pub enum SpanEvent {
    Create(RunCreate),
    Update { id: SpanId, update: RunUpdate },
}

impl SpanEvent {
    pub fn run_id(&self) -> SpanId {
        match self {
            SpanEvent::Create(run) => run.id,
            SpanEvent::Update { id, .. } => *id,
        }
    }
}

/// Async, non-blocking span sink backed by the LangSmith runs API
pub struct RemoteSpanSink {
    project: String,
    sender: mpsc::Sender<SpanEvent>,
    open: Mutex<HashSet<SpanId>>,
    metrics: Option<Arc<QaMetrics>>,
}

impl RemoteSpanSink {
    /// Create the sink and spawn its delivery task.
    pub fn new(
        client: LangSmithClient,
        project: impl Into<String>,
        queue_size: usize,
        metrics: Option<Arc<QaMetrics>>,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SpanEvent>(queue_size.max(1));

        let task_metrics = metrics.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let run_id = event.run_id();
                let result = match &event {
                    SpanEvent::Create(run) => client.create_run(run).await,
                    SpanEvent::Update { id, update } => client.update_run(*id, update).await,
                };

                match result {
                    Ok(()) => {
                        if let Some(m) = &task_metrics {
                            m.record_span_sent();
                        }
                        tracing::debug!(run_id = %run_id, "Delivered span event");
                    }
                    Err(e) => {
                        if let Some(m) = &task_metrics {
                            m.record_span_failed();
                        }
                        tracing::warn!(run_id = %run_id, error = %e, "Failed to deliver span event");
                    }
                }
            }
        });

        Self {
            project: project.into(),
            sender,
            open: Mutex::new(HashSet::new()),
            metrics,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Whether a span opened through this sink is still waiting for its close.
    pub fn is_open(&self, id: SpanId) -> bool {
        self.open
            .lock()
            .map(|open| open.contains(&id))
            .unwrap_or(false)
    }

    fn enqueue(&self, event: SpanEvent) -> Result<(), SinkError> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                if let Some(m) = &self.metrics {
                    m.record_span_dropped();
                }
                Err(SinkError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                Err(SinkError::Unavailable("span delivery task stopped".to_string()))
            }
        }
    }
}

#[async_trait]
impl SpanSink for RemoteSpanSink {
    fn name(&self) -> &str {
        "langsmith"
    }

    async fn create_span(&self, request: SpanRequest) -> Result<(), SinkError> {
        let id = request.id;
        self.enqueue(SpanEvent::Create(RunCreate::from_request(request, &self.project)))?;
        if let Ok(mut open) = self.open.lock() {
            open.insert(id);
        }
        Ok(())
    }

    async fn end_span(&self, id: SpanId, outcome: SpanOutcome) -> Result<(), SinkError> {
        // Only spans this sink opened can be closed, and only once.
        let was_open = self
            .open
            .lock()
            .map(|mut open| open.remove(&id))
            .unwrap_or(false);
        if !was_open {
            return Err(SinkError::UnknownSpan(id));
        }

        let result = self.enqueue(SpanEvent::Update {
            id,
            update: RunUpdate::from_outcome(outcome),
        });
        // A close that was not queued can be retried.
        if result.is_err() {
            if let Ok(mut open) = self.open.lock() {
                open.insert(id);
            }
        }
        result
    }
}

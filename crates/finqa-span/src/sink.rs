//! Span sinks: where span start and end records go.
//!
//! A sink only reports transport problems through [`SinkError`]; callers go
//! through [`Tracer`](crate::Tracer), which logs and swallows them.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

use crate::span::{Span, SpanId, SpanOutcome, SpanRequest, SpanStatus};

/// Transport-level failures of a sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Tracing backend unavailable: {0}")]
    Unavailable(String),

    #[error("Tracing backend rejected the record: {0}")]
    Rejected(String),

    #[error("Unknown span: {0}")]
    UnknownSpan(SpanId),

    #[error("Span already closed: {0}")]
    AlreadyClosed(SpanId),

    #[error("Span queue is full")]
    QueueFull,
}

/// Destination for span records.
#[async_trait]
pub trait SpanSink: Send + Sync {
    /// Sink identifier used in log lines.
    fn name(&self) -> &str;

    /// Record the start of a span.
    async fn create_span(&self, request: SpanRequest) -> Result<(), SinkError>;

    /// Record the terminal outcome of a span.
    async fn end_span(&self, id: SpanId, outcome: SpanOutcome) -> Result<(), SinkError>;
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl SpanSink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    async fn create_span(&self, _request: SpanRequest) -> Result<(), SinkError> {
        Ok(())
    }

    async fn end_span(&self, _id: SpanId, _outcome: SpanOutcome) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Process-local sink keeping every span in creation order.
#[derive(Debug, Default)]
pub struct MemorySink {
    spans: Mutex<Vec<Span>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans in creation order.
    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Look up a span by id.
    pub fn get(&self, id: SpanId) -> Option<Span> {
        self.spans
            .lock()
            .ok()
            .and_then(|s| s.iter().find(|span| span.id == id).cloned())
    }

    /// Spans with the given name, in creation order.
    pub fn by_name(&self, name: &str) -> Vec<Span> {
        self.spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }

    /// Direct children of a span, in creation order.
    pub fn children_of(&self, parent: SpanId) -> Vec<Span> {
        self.spans()
            .into_iter()
            .filter(|span| span.parent_id == Some(parent))
            .collect()
    }

    /// Spans that have neither outputs nor an error yet.
    pub fn open_spans(&self) -> Vec<Span> {
        self.spans()
            .into_iter()
            .filter(|span| span.status == SpanStatus::Running)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the recorded spans as an indented tree, one span per line.
    pub fn render_tree(&self) -> String {
        let spans = self.spans();
        let mut out = String::new();
        for root in spans.iter().filter(|s| {
            s.parent_id
                .map(|p| !spans.iter().any(|o| o.id == p))
                .unwrap_or(true)
        }) {
            render_node(&spans, root, 0, &mut out);
        }
        out
    }
}

fn render_node(spans: &[Span], node: &Span, depth: usize, out: &mut String) {
    out.push_str(&format!(
        "{}{} [{:?}] {}ms\n",
        "  ".repeat(depth),
        node.name,
        node.status,
        node.duration_ms.unwrap_or(0)
    ));
    for child in spans.iter().filter(|s| s.parent_id == Some(node.id)) {
        render_node(spans, child, depth + 1, out);
    }
}

#[async_trait]
impl SpanSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_span(&self, request: SpanRequest) -> Result<(), SinkError> {
        let mut spans = self
            .spans
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("span store poisoned: {}", e)))?;
        spans.push(Span::open(request));
        Ok(())
    }

    async fn end_span(&self, id: SpanId, outcome: SpanOutcome) -> Result<(), SinkError> {
        let mut spans = self
            .spans
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("span store poisoned: {}", e)))?;
        // Session ids may be reused as span ids; close the most recent open one.
        let open = spans
            .iter()
            .rposition(|span| span.id == id && !span.is_terminal());

        match open {
            Some(index) => {
                spans[index].close(outcome);
                Ok(())
            }
            None if spans.iter().any(|span| span.id == id) => Err(SinkError::AlreadyClosed(id)),
            None => Err(SinkError::UnknownSpan(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Fields, SpanError};
    use uuid::Uuid;

    fn request(name: &str, parent_id: Option<SpanId>) -> SpanRequest {
        SpanRequest {
            id: Uuid::new_v4(),
            name: name.to_string(),
            inputs: Fields::new(),
            tags: vec!["chatbot".to_string()],
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_memory_sink_records_and_closes() {
        let sink = MemorySink::new();
        let req = request("QaChatbot_query", None);
        let id = req.id;

        sink.create_span(req).await.unwrap();
        assert_eq!(sink.open_spans().len(), 1);

        sink.end_span(id, SpanOutcome::Completed(Fields::new()))
            .await
            .unwrap();
        assert!(sink.open_spans().is_empty());
        assert_eq!(sink.get(id).unwrap().status, SpanStatus::Completed);
    }

    #[tokio::test]
    async fn test_memory_sink_rejects_unknown_and_double_close() {
        let sink = MemorySink::new();
        let unknown = Uuid::new_v4();
        assert_eq!(
            sink.end_span(unknown, SpanOutcome::Completed(Fields::new()))
                .await,
            Err(SinkError::UnknownSpan(unknown))
        );

        let req = request("QaChatbot_session", None);
        let id = req.id;
        sink.create_span(req).await.unwrap();
        sink.end_span(id, SpanOutcome::Completed(Fields::new()))
            .await
            .unwrap();
        assert_eq!(
            sink.end_span(id, SpanOutcome::Failed(SpanError::cancelled()))
                .await,
            Err(SinkError::AlreadyClosed(id))
        );
    }

    #[tokio::test]
    async fn test_memory_sink_children_and_tree() {
        let sink = MemorySink::new();
        let root = request("QaChatbot_query", None);
        let root_id = root.id;
        sink.create_span(root).await.unwrap();
        sink.create_span(request("company_extraction", Some(root_id)))
            .await
            .unwrap();
        sink.create_span(request("document_search", Some(root_id)))
            .await
            .unwrap();

        let children = sink.children_of(root_id);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "company_extraction");

        let tree = sink.render_tree();
        assert!(tree.starts_with("QaChatbot_query"));
        assert!(tree.contains("\n  company_extraction"));
    }

    #[tokio::test]
    async fn test_noop_sink_accepts_everything() {
        let sink = NoopSink;
        let id = Uuid::new_v4();
        assert!(sink.create_span(request("x", None)).await.is_ok());
        assert!(sink
            .end_span(id, SpanOutcome::Completed(Fields::new()))
            .await
            .is_ok());
    }
}

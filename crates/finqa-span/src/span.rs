//! Span records for the question-answering pipeline.
//!
//! Defines `Span`, `SpanStatus`, `SpanError` and the request/outcome types
//! exchanged with a [`SpanSink`](crate::SpanSink).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Identifier of a span. Session ids double as root span ids.
pub type SpanId = Uuid;

/// JSON object used for span inputs and outputs.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Running,
    Completed,
    Failed,
}

/// Error kinds that can be attached to a span.
///
/// Implemented by every error type that may flow through a traced
/// operation so that the recorded failure carries a stable tag.
pub trait ErrorKind {
    /// Short, stable identifier for the error variant (e.g. `"extraction"`).
    fn kind(&self) -> &'static str;
}

/// Failure descriptor recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanError {
    pub kind: String,
    pub message: String,
}

impl SpanError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Build a descriptor from any error in the taxonomy.
    pub fn from_error<E: ErrorKind + fmt::Display + ?Sized>(error: &E) -> Self {
        Self::new(error.kind(), error.to_string())
    }

    /// Descriptor used when a span is dropped before it was finished.
    pub fn cancelled() -> Self {
        Self::new("cancelled", "operation dropped before completion")
    }
}

impl fmt::Display for SpanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Everything a sink needs to open a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRequest {
    pub id: SpanId,
    pub name: String,
    pub inputs: Fields,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
}

/// Terminal record of a span: outputs or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanOutcome {
    Completed(Fields),
    Failed(SpanError),
}

impl SpanOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SpanOutcome::Failed(_))
    }
}

/// Capability to close a span that was successfully opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanHandle {
    pub id: SpanId,
}

/// A recorded span.
///
/// Created in `Running` state and moved to a terminal state exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
    pub inputs: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SpanError>,
    pub tags: BTreeSet<String>,
    pub status: SpanStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Span {
    /// Open a new span from a request.
    pub fn open(request: SpanRequest) -> Self {
        Self {
            id: request.id,
            name: request.name,
            parent_id: request.parent_id,
            inputs: request.inputs,
            outputs: None,
            error: None,
            tags: request.tags.into_iter().collect(),
            status: SpanStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
        }
    }

    /// Whether the span already carries outputs or an error.
    pub fn is_terminal(&self) -> bool {
        self.status != SpanStatus::Running
    }

    /// Apply the terminal outcome. Returns `false` if the span was already closed.
    pub fn close(&mut self, outcome: SpanOutcome) -> bool {
        if self.is_terminal() {
            return false;
        }

        let now = Utc::now();
        match outcome {
            SpanOutcome::Completed(outputs) => {
                self.status = SpanStatus::Completed;
                self.outputs = Some(outputs);
            }
            SpanOutcome::Failed(error) => {
                self.status = SpanStatus::Failed;
                self.error = Some(error);
            }
        }
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        true
    }
}

/// Convert any serializable value into span fields.
///
/// Objects become the field map directly; any other value is stored under
/// `"output"`. Serialization failures are recorded rather than raised.
pub fn fields_of<T: Serialize + ?Sized>(value: &T) -> Fields {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Fields::new();
            map.insert("output".to_string(), other);
            map
        }
        Err(e) => {
            let mut map = Fields::new();
            map.insert(
                "serialization_error".to_string(),
                serde_json::Value::String(e.to_string()),
            );
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(name: &str) -> SpanRequest {
        SpanRequest {
            id: Uuid::new_v4(),
            name: name.to_string(),
            inputs: fields_of(&json!({"question": "What is the revenue?"})),
            tags: vec!["qa".to_string(), "chatbot".to_string(), "qa".to_string()],
            parent_id: None,
        }
    }

    #[test]
    fn test_open_span_is_running() {
        let span = Span::open(request("company_extraction"));
        assert_eq!(span.status, SpanStatus::Running);
        assert!(!span.is_terminal());
        assert!(span.outputs.is_none());
        assert!(span.error.is_none());
        // tags are a set
        assert_eq!(span.tags.len(), 2);
    }

    #[test]
    fn test_close_completed() {
        let mut span = Span::open(request("document_search"));
        assert!(span.close(SpanOutcome::Completed(fields_of(&json!({"document_count": 2})))));

        assert_eq!(span.status, SpanStatus::Completed);
        assert_eq!(span.outputs.unwrap()["document_count"], json!(2));
        assert!(span.error.is_none());
        assert!(span.ended_at.is_some());
        assert!(span.duration_ms.is_some());
    }

    #[test]
    fn test_close_failed() {
        let mut span = Span::open(request("answer_generation"));
        assert!(span.close(SpanOutcome::Failed(SpanError::new("generation", "model down"))));

        assert_eq!(span.status, SpanStatus::Failed);
        assert!(span.outputs.is_none());
        assert_eq!(span.error.unwrap().message, "model down");
    }

    #[test]
    fn test_second_close_is_rejected() {
        let mut span = Span::open(request("QaChatbot_session"));
        assert!(span.close(SpanOutcome::Completed(Fields::new())));
        assert!(!span.close(SpanOutcome::Failed(SpanError::cancelled())));

        assert_eq!(span.status, SpanStatus::Completed);
        assert!(span.error.is_none());
    }

    #[test]
    fn test_fields_of_object_and_scalar() {
        let fields = fields_of(&json!({"answer": "Test answer"}));
        assert_eq!(fields["answer"], json!("Test answer"));

        let fields = fields_of(&42);
        assert_eq!(fields["output"], json!(42));

        let fields = fields_of(&vec!["doc1", "doc2"]);
        assert_eq!(fields["output"], json!(["doc1", "doc2"]));
    }

    #[test]
    fn test_span_error_display() {
        let err = SpanError::new("search", "index unavailable");
        assert_eq!(err.to_string(), "search: index unavailable");
        assert_eq!(SpanError::cancelled().kind, "cancelled");
    }

    #[test]
    fn test_json_serialization_roundtrip() {
        let mut span = Span::open(request("QaChatbot_query"));
        span.close(SpanOutcome::Completed(fields_of(&json!({"answer": "ok"}))));

        let json = serde_json::to_string(&span).unwrap();
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, span.id);
        assert_eq!(back.status, SpanStatus::Completed);
        assert!(!json.contains("\"error\""));
    }
}

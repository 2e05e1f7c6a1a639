//! Traced-operation combinators.
//!
//! Run an async thunk inside a span: open it, await the thunk, close it with
//! outputs or the error, and return the thunk's result unchanged.

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;

use crate::span::{fields_of, ErrorKind, Fields};
use crate::tracer::{Operation, Tracer};

/// Run `thunk` inside a span, recording the serialized result as outputs.
pub async fn traced<T, E, F, Fut>(tracer: &Tracer, operation: Operation, thunk: F) -> Result<T, E>
where
    T: Serialize,
    E: ErrorKind + Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    traced_with(tracer, operation, |value: &T| fields_of(value), thunk).await
}

/// Run `thunk` inside a span, recording `to_outputs(&value)` as outputs.
///
/// `to_outputs` is not called when tracing is off.
pub async fn traced_with<T, E, F, Fut, P>(
    tracer: &Tracer,
    operation: Operation,
    to_outputs: P,
    thunk: F,
) -> Result<T, E>
where
    E: ErrorKind + Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnOnce(&T) -> Fields,
{
    let span = tracer.start(operation).await;
    let result = thunk().await;
    span.finish(result, to_outputs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::span::SpanStatus;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct LookupFailure(String);

    impl Display for LookupFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "lookup failed: {}", self.0)
        }
    }

    impl ErrorKind for LookupFailure {
        fn kind(&self) -> &'static str {
            "search"
        }
    }

    #[tokio::test]
    async fn test_traced_records_outputs() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());

        let result: Result<Vec<&str>, LookupFailure> = traced(
            &tracer,
            Operation::new("document_search").input("question", "Q"),
            || async { Ok(vec!["doc1", "doc2"]) },
        )
        .await;

        assert_eq!(result.unwrap(), vec!["doc1", "doc2"]);
        let span = &sink.by_name("document_search")[0];
        assert_eq!(span.status, SpanStatus::Completed);
        assert_eq!(span.outputs.as_ref().unwrap()["output"], json!(["doc1", "doc2"]));
        assert_eq!(span.inputs["question"], json!("Q"));
    }

    #[tokio::test]
    async fn test_traced_preserves_error() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());

        let result: Result<u32, LookupFailure> = traced(
            &tracer,
            Operation::new("document_search"),
            || async { Err(LookupFailure("index offline".to_string())) },
        )
        .await;

        assert_eq!(result, Err(LookupFailure("index offline".to_string())));
        let span = &sink.by_name("document_search")[0];
        assert_eq!(span.status, SpanStatus::Failed);
        assert!(span.outputs.is_none());
        let error = span.error.as_ref().unwrap();
        assert_eq!(error.kind, "search");
        assert_eq!(error.message, "lookup failed: index offline");
    }

    #[tokio::test]
    async fn test_traced_with_custom_outputs() {
        let sink = Arc::new(MemorySink::new());
        let tracer = Tracer::new(sink.clone());

        let docs = traced_with(
            &tracer,
            Operation::new("document_search"),
            |docs: &Vec<String>| {
                let mut fields = Fields::new();
                fields.insert("document_count".to_string(), json!(docs.len()));
                fields
            },
            || async { Ok::<_, LookupFailure>(vec!["a".to_string(), "b".to_string()]) },
        )
        .await
        .unwrap();

        assert_eq!(docs.len(), 2);
        let span = &sink.by_name("document_search")[0];
        assert_eq!(span.outputs.as_ref().unwrap()["document_count"], json!(2));
    }

    #[tokio::test]
    async fn test_disabled_tracer_skips_output_projection() {
        let called = AtomicBool::new(false);
        let tracer = Tracer::disabled();

        let value = traced_with(
            &tracer,
            Operation::new("answer_generation"),
            |_: &String| {
                called.store(true, Ordering::SeqCst);
                Fields::new()
            },
            || async { Ok::<_, LookupFailure>("answer".to_string()) },
        )
        .await
        .unwrap();

        assert_eq!(value, "answer");
        assert!(!called.load(Ordering::SeqCst));
    }
}

//! Tracer facade over a [`SpanSink`].
//!
//! The tracer owns the enabled flag and turns every sink failure into a log
//! line. Nothing here returns an error to the caller.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::sink::{NoopSink, SinkError, SpanSink};
use crate::span::{
    ErrorKind, Fields, SpanError, SpanHandle, SpanId, SpanOutcome, SpanRequest,
};

/// Entry point for opening and closing spans.
#[derive(Clone)]
pub struct Tracer {
    sink: Arc<dyn SpanSink>,
    enabled: bool,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("sink", &self.sink.name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Tracer {
    /// Create an enabled tracer writing to `sink`.
    pub fn new(sink: Arc<dyn SpanSink>) -> Self {
        Self {
            sink,
            enabled: true,
        }
    }

    /// Tracer that never touches a sink.
    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(NoopSink),
            enabled: false,
        }
    }

    /// Derive a tracer whose flag is this tracer's flag AND `enabled`.
    pub fn with_local_flag(&self, enabled: bool) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            enabled: self.enabled && enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Open a span. Returns `None` when disabled or when the sink fails.
    pub async fn create_span(&self, request: SpanRequest) -> Option<SpanHandle> {
        if !self.enabled {
            return None;
        }

        let id = request.id;
        let name = request.name.clone();
        match self.sink.create_span(request).await {
            Ok(()) => Some(SpanHandle { id }),
            Err(e) => {
                tracing::warn!(
                    span_id = %id,
                    span_name = %name,
                    sink = self.sink.name(),
                    error = %e,
                    "Failed to create span"
                );
                None
            }
        }
    }

    /// Close a span. Failures are logged and dropped.
    pub async fn end_span(&self, id: SpanId, outcome: SpanOutcome) {
        if !self.enabled {
            return;
        }

        match self.sink.end_span(id, outcome).await {
            Ok(()) => {}
            Err(e @ (SinkError::AlreadyClosed(_) | SinkError::UnknownSpan(_))) => {
                tracing::debug!(span_id = %id, reason = %e, "Nothing to close, ignoring");
            }
            Err(e) => {
                tracing::warn!(
                    span_id = %id,
                    sink = self.sink.name(),
                    error = %e,
                    "Failed to end span"
                );
            }
        }
    }

    /// Open a span for `operation` and return a guard that closes it.
    pub async fn start(&self, operation: Operation) -> ActiveSpan {
        let handle = if self.enabled {
            self.create_span(operation.into_request()).await
        } else {
            None
        };

        ActiveSpan {
            tracer: self.clone(),
            handle,
            finished: false,
        }
    }
}

/// Description of a traced operation: name, inputs, tags and parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    id: Option<SpanId>,
    inputs: Fields,
    tags: Vec<String>,
    parent_id: Option<SpanId>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            inputs: Fields::new(),
            tags: Vec::new(),
            parent_id: None,
        }
    }

    /// Use a caller-chosen span id instead of a generated one.
    pub fn with_id(mut self, id: SpanId) -> Self {
        self.id = Some(id);
        self
    }

    /// Add one input field. Values that fail to serialize are recorded as null.
    pub fn input<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.inputs.insert(key.into(), value);
        self
    }

    /// Merge a whole map of inputs.
    pub fn inputs(mut self, fields: Fields) -> Self {
        self.inputs.extend(fields);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn parent(mut self, parent_id: Option<SpanId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the sink request, generating a fresh id unless one was set.
    pub fn into_request(self) -> SpanRequest {
        SpanRequest {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name: self.name,
            inputs: self.inputs,
            tags: self.tags,
            parent_id: self.parent_id,
        }
    }
}

/// An open span owned by the call stack that opened it.
///
/// Closing consumes the guard. A guard dropped without being closed (for
/// example when the enclosing future is cancelled) records a `cancelled`
/// failure in the background when a Tokio runtime is available.
pub struct ActiveSpan {
    tracer: Tracer,
    handle: Option<SpanHandle>,
    finished: bool,
}

impl ActiveSpan {
    /// Id of the underlying span, if it was opened.
    pub fn id(&self) -> Option<SpanId> {
        self.handle.map(|h| h.id)
    }

    pub async fn complete(mut self, outputs: Fields) {
        self.close(SpanOutcome::Completed(outputs)).await;
    }

    pub async fn fail(mut self, error: SpanError) {
        self.close(SpanOutcome::Failed(error)).await;
    }

    /// Close the span from `result` and hand the result back untouched.
    pub async fn finish<T, E, P>(mut self, result: Result<T, E>, to_outputs: P) -> Result<T, E>
    where
        E: ErrorKind + fmt::Display,
        P: FnOnce(&T) -> Fields,
    {
        if self.handle.is_none() {
            self.finished = true;
            return result;
        }

        let outcome = match &result {
            Ok(value) => SpanOutcome::Completed(to_outputs(value)),
            Err(error) => SpanOutcome::Failed(SpanError::from_error(error)),
        };
        self.close(outcome).await;
        result
    }

    async fn close(&mut self, outcome: SpanOutcome) {
        self.finished = true;
        if let Some(handle) = self.handle {
            self.tracer.end_span(handle.id, outcome).await;
        }
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let tracer = self.tracer.clone();
                runtime.spawn(async move {
                    tracer
                        .end_span(handle.id, SpanOutcome::Failed(SpanError::cancelled()))
                        .await;
                });
            }
            Err(_) => {
                tracing::warn!(span_id = %handle.id, "Span dropped outside a runtime, left open");
            }
        }
    }
}

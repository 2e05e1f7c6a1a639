//! Span tracing for the financial QA assistant.
//!
//! Provides the span model, the [`SpanSink`] abstraction, a [`Tracer`] that
//! never lets a sink failure escape, and the [`traced`] combinator used to
//! wrap every pipeline stage.
//!
//! ```rust,ignore
//! use finqa_span::{traced, MemorySink, Operation, Tracer};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let tracer = Tracer::new(sink.clone());
//! let docs = traced(&tracer, Operation::new("document_search"), || async {
//!     Ok::<_, MyError>(vec!["doc1"])
//! })
//! .await?;
//! ```

pub mod sink;
pub mod span;
pub mod traced;
pub mod tracer;

pub use sink::{MemorySink, NoopSink, SinkError, SpanSink};
pub use span::{
    fields_of, ErrorKind, Fields, Span, SpanError, SpanHandle, SpanId, SpanOutcome, SpanRequest,
    SpanStatus,
};
pub use traced::{traced, traced_with};
pub use tracer::{ActiveSpan, Operation, Tracer};

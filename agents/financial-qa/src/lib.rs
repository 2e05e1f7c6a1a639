//! Financial QA Assistant
//!
//! Answers questions about company financial documents. Each question runs
//! three stages in order: company extraction, document search and answer
//! generation. Every exchange, stage, agent run and model call is recorded as
//! a span and delivered to LangSmith when tracing is enabled.
//!
//! # Components
//! - `agent`: the agent execution contract and the two model-backed agents
//! - `engine`: the `QaChatbot` orchestrator and its collaborator traits
//! - `session`: caller-held session state
//! - `telemetry`: span delivery to LangSmith and Prometheus metrics
//! - `client`: HTTP clients for LangSmith, Azure OpenAI and document search
//! - `handler`: HTTP API
//! - `cli`: command line interface
//!
//! # Design Principles
//! - Tracing never changes results: sink failures are logged and dropped
//! - Errors pass through unchanged: no retries, no fallback answers
//! - Explicit wiring: configuration and tracer are passed at construction

pub mod agent;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod logging;
pub mod session;
pub mod telemetry;

#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use agent::{Agent, AgentRuntime, AnswerGenerationAgent, ChatModel, CompanyExtractionAgent};
pub use app::Application;
pub use config::AppConfig;
pub use contracts::{CompanyInfo, Exchange, Session, SessionId, SessionStatus};
pub use engine::{AnswerGenerator, CompanyExtractor, DocumentSearcher, QaChatbot};
pub use error::{ModelError, QaError, Result, SearchError};
pub use session::SessionRegistry;

/// Agent version, reported by `/health` and response metadata.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

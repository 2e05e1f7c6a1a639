//! Error types for the financial QA assistant
//!
//! `QaError` is the functional taxonomy returned by the pipeline. Stage
//! variants carry the collaborator's own error as a boxed source so callers
//! can downcast to it.

use finqa_span::ErrorKind;
use thiserror::Error;

/// Boxed error produced by a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for question answering
#[derive(Error, Debug)]
pub enum QaError {
    /// Company extraction failed
    #[error("Company extraction failed: {0}")]
    Extraction(#[source] BoxError),

    /// Document search failed
    #[error("Document search failed: {0}")]
    Search(#[source] BoxError),

    /// Answer generation failed
    #[error("Answer generation failed: {0}")]
    Generation(#[source] BoxError),

    /// Language model call failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Agent business logic failed
    #[error("Agent {agent} failed: {message}")]
    Agent { agent: String, message: String },

    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QaError {
    pub fn extraction(source: impl Into<BoxError>) -> Self {
        QaError::Extraction(source.into())
    }

    pub fn search(source: impl Into<BoxError>) -> Self {
        QaError::Search(source.into())
    }

    pub fn generation(source: impl Into<BoxError>) -> Self {
        QaError::Generation(source.into())
    }

    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        QaError::Agent {
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        QaError::InvalidInput(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        QaError::Configuration(msg.into())
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(self, QaError::InvalidInput(_))
    }
}

impl ErrorKind for QaError {
    fn kind(&self) -> &'static str {
        match self {
            QaError::Extraction(_) => "extraction",
            QaError::Search(_) => "search",
            QaError::Generation(_) => "generation",
            QaError::Model(_) => "model",
            QaError::Agent { .. } => "agent",
            QaError::InvalidInput(_) => "invalid_input",
            QaError::Configuration(_) => "configuration",
        }
    }
}

/// Chat model failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Http(String),

    #[error("Model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl ErrorKind for ModelError {
    fn kind(&self) -> &'static str {
        "model"
    }
}

/// Document search backend failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Http(String),

    #[error("Search service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed search response: {0}")]
    MalformedResponse(String),
}

impl From<toml::de::Error> for QaError {
    fn from(err: toml::de::Error) -> Self {
        QaError::Configuration(format!("TOML error: {}", err))
    }
}

/// Result type alias for QA operations
pub type Result<T> = std::result::Result<T, QaError>;

//! Financial QA contract definitions
//!
//! Data exchanged between the orchestrator, its callers and its
//! collaborators:
//!
//! - `Exchange`: one answered question, appended to a caller-owned history
//! - `Session`: lifecycle record of a conversation
//! - `messages`: chat messages and model envelopes used by agents

pub mod messages;

use chrono::{DateTime, Utc};
use finqa_span::{fields_of, Fields};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use messages::{ChatMessage, ModelOptions, ModelResponse, Role};

/// Identifier of a conversation session. Doubles as the session span id.
pub type SessionId = Uuid;

/// Structured description of the company a question refers to.
///
/// May be empty when no company was identified.
pub type CompanyInfo = serde_json::Map<String, serde_json::Value>;

/// Result of answering one question.
///
/// Built once through [`Exchange::new`] and never mutated; `document_count`
/// is derived from `sources` at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    question: String,
    answer: String,
    company_info: CompanyInfo,
    sources: Vec<String>,
    document_count: usize,
}

impl Exchange {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        company_info: CompanyInfo,
        sources: Vec<String>,
    ) -> Self {
        let document_count = sources.len();
        Self {
            question: question.into(),
            answer: answer.into(),
            company_info,
            sources,
            document_count,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn company_info(&self) -> &CompanyInfo {
        &self.company_info
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Whether extraction identified a company.
    pub fn company_identified(&self) -> bool {
        !self.company_info.is_empty()
    }

    /// The exchange as span outputs: exactly its five fields.
    pub fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// A conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            ended_at: None,
            summary: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.ended_at.is_some() {
            SessionStatus::Ended
        } else {
            SessionStatus::Active
        }
    }
}

//! Collaborators called by the orchestrator, one per pipeline stage.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::contracts::CompanyInfo;
use crate::error::QaError;

/// Identifies the company a question is about.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CompanyExtractor: Send + Sync {
    /// Returns an empty mapping when no company is mentioned.
    async fn extract_company_info(&self, question: &str) -> Result<CompanyInfo, QaError>;
}

/// Retrieves source identifiers relevant to a question.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentSearcher: Send + Sync {
    /// An empty result is not an error.
    async fn search_documents(
        &self,
        company_info: &CompanyInfo,
        question: &str,
    ) -> Result<Vec<String>, QaError>;
}

/// Produces the final answer text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_answer(
        &self,
        question: &str,
        sources: &[String],
        company_info: &CompanyInfo,
    ) -> Result<String, QaError>;
}

//! Company extraction agent.

use async_trait::async_trait;
use finqa_span::Fields;
use serde_json::Value;

use super::{Agent, AgentRuntime};
use crate::contracts::{ChatMessage, CompanyInfo, ModelOptions};
use crate::engine::CompanyExtractor;
use crate::error::QaError;

const SYSTEM_PROMPT: &str = "You identify the company a financial question refers to. \
Reply with a single JSON object with the keys \"name\", \"ticker\" and \"fiscal_year\" \
where known. Omit unknown keys. Reply with {} when no company is mentioned.";

/// Asks the model which company a question is about.
pub struct CompanyExtractionAgent {
    runtime: AgentRuntime,
}

impl CompanyExtractionAgent {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime }
    }
}

/// Parse the first JSON object found in a model reply.
///
/// Replies without a parsable object yield an empty mapping.
pub fn parse_company_info(reply: &str) -> CompanyInfo {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return CompanyInfo::new();
    };
    if end < start {
        return CompanyInfo::new();
    }

    match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect(),
        _ => CompanyInfo::new(),
    }
}

#[async_trait]
impl Agent for CompanyExtractionAgent {
    fn name(&self) -> &str {
        "CompanyExtractionAgent"
    }

    fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    async fn run(&self, input: Fields) -> Result<Fields, QaError> {
        let question = input
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| QaError::agent(self.name(), "input has no question"))?;

        let reply = self
            .call_model(
                vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(question)],
                ModelOptions::default().max_tokens(256),
            )
            .await?;

        let mut output = Fields::new();
        output.insert(
            "company_info".to_string(),
            Value::Object(parse_company_info(&reply)),
        );
        Ok(output)
    }
}

#[async_trait]
impl CompanyExtractor for CompanyExtractionAgent {
    async fn extract_company_info(&self, question: &str) -> Result<CompanyInfo, QaError> {
        let mut input = Fields::new();
        input.insert("question".to_string(), Value::String(question.to_string()));

        let mut output = self.execute(input).await.map_err(QaError::extraction)?;
        match output.remove("company_info") {
            Some(Value::Object(info)) => Ok(info),
            _ => Ok(CompanyInfo::new()),
        }
    }
}

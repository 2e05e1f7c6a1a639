//! Answer generation agent.

use async_trait::async_trait;
use finqa_span::Fields;
use serde_json::Value;

use super::{Agent, AgentRuntime};
use crate::contracts::{ChatMessage, CompanyInfo, ModelOptions};
use crate::engine::AnswerGenerator;
use crate::error::QaError;

const SYSTEM_PROMPT: &str = "You are a financial analyst assistant. Answer the question using \
only the provided document excerpts and cite them by number. If the excerpts do not contain \
the answer, say that the documents do not cover it.";

/// Produces a grounded answer from retrieved sources.
pub struct AnswerGenerationAgent {
    runtime: AgentRuntime,
}

impl AnswerGenerationAgent {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime }
    }
}

/// Build the user prompt from the question, sources and company info.
pub fn build_prompt(question: &str, sources: &[String], company_info: &CompanyInfo) -> String {
    let mut prompt = String::new();

    if !company_info.is_empty() {
        prompt.push_str("Company: ");
        prompt.push_str(&Value::Object(company_info.clone()).to_string());
        prompt.push_str("\n\n");
    }

    if sources.is_empty() {
        prompt.push_str("No relevant documents were found.\n\n");
    } else {
        prompt.push_str("Documents:\n");
        for (i, source) in sources.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", i + 1, source));
        }
        prompt.push('\n');
    }

    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt
}

#[async_trait]
impl Agent for AnswerGenerationAgent {
    fn name(&self) -> &str {
        "AnswerGenerationAgent"
    }

    fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    async fn run(&self, input: Fields) -> Result<Fields, QaError> {
        let question = input
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| QaError::agent(self.name(), "input has no question"))?;
        let sources: Vec<String> = match input.get("sources") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| QaError::agent(self.name(), format!("invalid sources: {}", e)))?,
            None => Vec::new(),
        };
        let company_info = match input.get("company_info") {
            Some(Value::Object(info)) => info.clone(),
            _ => CompanyInfo::new(),
        };

        let reply = self
            .call_model(
                vec![
                    ChatMessage::system(SYSTEM_PROMPT),
                    ChatMessage::user(build_prompt(question, &sources, &company_info)),
                ],
                ModelOptions::default(),
            )
            .await?;

        let mut output = Fields::new();
        output.insert("answer".to_string(), Value::String(reply.trim().to_string()));
        Ok(output)
    }
}

#[async_trait]
impl AnswerGenerator for AnswerGenerationAgent {
    async fn generate_answer(
        &self,
        question: &str,
        sources: &[String],
        company_info: &CompanyInfo,
    ) -> Result<String, QaError> {
        let mut input = Fields::new();
        input.insert("question".to_string(), Value::String(question.to_string()));
        input.insert("sources".to_string(), serde_json::json!(sources));
        input.insert("company_info".to_string(), Value::Object(company_info.clone()));

        let output = self.execute(input).await.map_err(QaError::generation)?;
        match output.get("answer") {
            Some(Value::String(answer)) => Ok(answer.clone()),
            _ => Err(QaError::generation(QaError::agent(
                self.name(),
                "output has no answer",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model::MockChatModel;
    use crate::contracts::{ModelResponse, Role};
    use finqa_span::{MemorySink, Tracer};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_build_prompt() {
        let mut info = CompanyInfo::new();
        info.insert("name".to_string(), json!("Test Corp"));
        let prompt = build_prompt(
            "What is the revenue?",
            &["doc1".to_string(), "doc2".to_string()],
            &info,
        );

        assert!(prompt.starts_with("Company: {\"name\":\"Test Corp\"}"));
        assert!(prompt.contains("[1] doc1\n[2] doc2\n"));
        assert!(prompt.ends_with("Question: What is the revenue?"));

        let prompt = build_prompt("Q", &[], &CompanyInfo::new());
        assert!(prompt.starts_with("No relevant documents were found."));
    }

    #[tokio::test]
    async fn test_generates_trimmed_answer() {
        let mut model = MockChatModel::new();
        model.expect_model_name().return_const("fake-model".to_string());
        model
            .expect_invoke()
            .withf(|messages, _| {
                messages.len() == 2
                    && messages[0].role == Role::System
                    && messages[1].content.contains("[1] doc1")
            })
            .times(1)
            .returning(|_, _| Ok(ModelResponse::text("  Revenue was $10M [1].\n")));

        let sink = Arc::new(MemorySink::new());
        let agent = AnswerGenerationAgent::new(AgentRuntime::new(
            Tracer::new(sink.clone()),
            Arc::new(model),
        ));

        let answer = agent
            .generate_answer("What is the revenue?", &["doc1".to_string()], &CompanyInfo::new())
            .await
            .unwrap();

        assert_eq!(answer, "Revenue was $10M [1].");
        let span = &sink.by_name("AnswerGenerationAgent_execute")[0];
        assert_eq!(span.inputs["sources"], json!(["doc1"]));
    }
}

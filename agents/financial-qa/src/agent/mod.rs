//! Agent execution contract
//!
//! Every agent implements [`Agent::run`] with its business logic and gets two
//! traced entry points for free:
//!
//! - [`Agent::execute`]: runs `run` inside a `{Agent}_execute` span
//! - [`Agent::call_model`]: calls the chat model inside a `{Agent}_llm_call` span
//!
//! Both log start, completion and failure, and return errors unchanged.
//! Nothing is retried.

pub mod answer;
pub mod company;
pub mod model;

pub use answer::AnswerGenerationAgent;
pub use company::CompanyExtractionAgent;
pub use model::{ChatModel, ModelParams};

use async_trait::async_trait;
use finqa_span::{fields_of, traced_with, ErrorKind, Fields, Operation, Tracer};
use std::sync::Arc;

use crate::contracts::{ChatMessage, ModelOptions};
use crate::error::QaError;

/// Shared state composed into every agent: tracer, model and parameters.
#[derive(Clone)]
pub struct AgentRuntime {
    tracer: Tracer,
    model: Arc<dyn ChatModel>,
    params: ModelParams,
}

impl AgentRuntime {
    pub fn new(tracer: Tracer, model: Arc<dyn ChatModel>) -> Self {
        Self {
            tracer,
            model,
            params: ModelParams::default(),
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// AND a per-agent tracing flag into the process flag.
    pub fn with_local_tracing(mut self, enabled: bool) -> Self {
        self.tracer = self.tracer.with_local_flag(enabled);
        self
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }
}

/// Two-phase agent contract.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name used for span names, tags and log lines.
    fn name(&self) -> &str;

    fn runtime(&self) -> &AgentRuntime;

    /// Business logic. No tracing concerns.
    async fn run(&self, input: Fields) -> Result<Fields, QaError>;

    /// Run the agent inside a traced, logged invocation.
    async fn execute(&self, input: Fields) -> Result<Fields, QaError> {
        let name = self.name();
        let tracer = self.runtime().tracer();
        let input_keys: Vec<&String> = input.keys().collect();

        tracing::info!(
            agent = %name,
            input_keys = ?input_keys,
            tracing_enabled = tracer.is_enabled(),
            "Agent execution started"
        );

        let operation = Operation::new(format!("{}_execute", name))
            .inputs(input.clone())
            .tags(["agent", "agent_execute"])
            .tag(name.to_lowercase());

        let result = traced_with(tracer, operation, |output: &Fields| output.clone(), || {
            self.run(input)
        })
        .await;

        match &result {
            Ok(output) => {
                let result_keys: Vec<&String> = output.keys().collect();
                tracing::info!(agent = %name, result_keys = ?result_keys, "Agent execution completed");
            }
            Err(e) => {
                tracing::error!(
                    agent = %name,
                    error_type = e.kind(),
                    error = %e,
                    "Agent execution failed"
                );
            }
        }

        result
    }

    /// Call the chat model and return the reply text.
    async fn call_model(
        &self,
        messages: Vec<ChatMessage>,
        options: ModelOptions,
    ) -> Result<String, QaError> {
        let name = self.name();
        let runtime = self.runtime();
        let options = runtime.params().apply(options);

        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        let operation = Operation::new(format!("{}_llm_call", name))
            .inputs(fields_of(&options))
            .input("messages", &contents)
            .tags(["llm", name.to_lowercase().as_str()]);

        let result = traced_with(
            runtime.tracer(),
            operation,
            |text: &String| {
                let mut outputs = Fields::new();
                outputs.insert("response".to_string(), serde_json::Value::String(text.clone()));
                outputs
            },
            || async {
                let response = runtime.model().invoke(messages, options).await?;
                Ok::<_, QaError>(response.into_text())
            },
        )
        .await;

        if let Err(e) = &result {
            tracing::error!(
                agent = %name,
                model = runtime.model().model_name(),
                error = %e,
                "LLM call failed"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::model::MockChatModel;
    use super::*;
    use crate::contracts::ModelResponse;
    use crate::error::ModelError;
    use finqa_span::{MemorySink, SpanStatus};
    use serde_json::json;

    struct EchoAgent {
        runtime: AgentRuntime,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        fn name(&self) -> &str {
            "EchoAgent"
        }

        fn runtime(&self) -> &AgentRuntime {
            &self.runtime
        }

        async fn run(&self, input: Fields) -> Result<Fields, QaError> {
            let text = input
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| QaError::agent(self.name(), "missing text"))?;
            let reply = self
                .call_model(vec![ChatMessage::user(text)], ModelOptions::default())
                .await?;
            let mut output = Fields::new();
            output.insert("reply".to_string(), json!(reply));
            Ok(output)
        }
    }

    fn echo_model() -> MockChatModel {
        let mut model = MockChatModel::new();
        model.expect_model_name().return_const("fake-model".to_string());
        model
    }

    fn agent(model: MockChatModel, sink: Arc<MemorySink>) -> EchoAgent {
        EchoAgent {
            runtime: AgentRuntime::new(Tracer::new(sink), Arc::new(model)),
        }
    }

    fn input(text: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("text".to_string(), json!(text));
        fields
    }

    #[tokio::test]
    async fn test_execute_traces_run_and_model_call() {
        let mut model = echo_model();
        model
            .expect_invoke()
            .withf(|messages, options| {
                messages.len() == 1 && options.max_tokens == Some(2000)
            })
            .times(1)
            .returning(|messages, _| Ok(ModelResponse::text(messages[0].content.to_uppercase())));

        let sink = Arc::new(MemorySink::new());
        let output = agent(model, sink.clone()).execute(input("hello")).await.unwrap();
        assert_eq!(output["reply"], json!("HELLO"));

        let execute = &sink.by_name("EchoAgent_execute")[0];
        assert_eq!(execute.status, SpanStatus::Completed);
        assert_eq!(execute.outputs.as_ref().unwrap()["reply"], json!("HELLO"));
        assert!(execute.tags.contains("agent"));
        assert!(execute.tags.contains("echoagent"));

        let llm = &sink.by_name("EchoAgent_llm_call")[0];
        assert_eq!(llm.inputs["messages"], json!(["hello"]));
        assert_eq!(llm.inputs["max_tokens"], json!(2000));
        assert_eq!(llm.outputs.as_ref().unwrap()["response"], json!("HELLO"));
        assert!(llm.tags.contains("llm"));
    }

    #[tokio::test]
    async fn test_model_failure_is_reraised() {
        let mut model = echo_model();
        model
            .expect_invoke()
            .returning(|_, _| Err(ModelError::Http("connection reset".to_string())));

        let sink = Arc::new(MemorySink::new());
        let err = agent(model, sink.clone())
            .execute(input("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, QaError::Model(ModelError::Http(_))));
        assert_eq!(sink.by_name("EchoAgent_llm_call")[0].status, SpanStatus::Failed);
        let execute = &sink.by_name("EchoAgent_execute")[0];
        assert_eq!(execute.error.as_ref().unwrap().kind, "model");
        assert!(sink.open_spans().is_empty());
    }

    #[tokio::test]
    async fn test_run_error_is_reraised_without_model_call() {
        let mut model = echo_model();
        model.expect_invoke().never();

        let sink = Arc::new(MemorySink::new());
        let err = agent(model, sink.clone())
            .execute(Fields::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Agent EchoAgent failed: missing text");
        assert!(sink.by_name("EchoAgent_llm_call").is_empty());
    }

    #[tokio::test]
    async fn test_local_flag_disables_agent_spans() {
        let mut model = echo_model();
        model
            .expect_invoke()
            .returning(|_, _| Ok(ModelResponse::text("ok")));

        let sink = Arc::new(MemorySink::new());
        let agent = EchoAgent {
            runtime: AgentRuntime::new(Tracer::new(sink.clone()), Arc::new(model))
                .with_local_tracing(false),
        };

        agent.execute(input("hello")).await.unwrap();
        assert!(sink.is_empty());
    }
}

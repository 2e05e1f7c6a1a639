//! Azure OpenAI chat completions client
//!
//! `POST {endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
//! with the key in the `api-key` header. No retries: a failed call surfaces
//! to the agent as [`ModelError`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::agent::ChatModel;
use crate::config::ModelConfig;
use crate::contracts::{ChatMessage, ModelOptions, ModelResponse};
use crate::error::{ModelError, QaError};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat model backed by an Azure OpenAI deployment
pub struct AzureChatClient {
    client: Client,
    url: String,
    api_key: String,
    deployment: String,
}

impl AzureChatClient {
    /// Build a client from configuration, failing on missing settings.
    pub fn from_config(config: &ModelConfig) -> Result<Self, QaError> {
        config.validate()?;

        let (Some(endpoint), Some(api_key), Some(deployment)) = (
            config.endpoint.as_deref(),
            config.api_key.as_deref(),
            config.deployment.as_deref(),
        ) else {
            return Err(QaError::configuration("Missing model settings"));
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| QaError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            config.api_version
        );

        Ok(Self {
            client,
            url,
            api_key: api_key.to_string(),
            deployment: deployment.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Pull `choices[0].message.content` out of a completion envelope.
fn extract_content(raw: &Value) -> Option<String> {
    raw.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl ChatModel for AzureChatClient {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        options: ModelOptions,
    ) -> Result<ModelResponse, ModelError> {
        let body = CompletionRequest {
            messages: &messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

        if raw.get("choices").and_then(Value::as_array).is_none() {
            return Err(ModelError::MalformedResponse(
                "response has no choices".to_string(),
            ));
        }

        Ok(ModelResponse {
            content: extract_content(&raw),
            raw,
        })
    }
}

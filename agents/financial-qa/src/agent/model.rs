//! Chat model abstraction and generation parameters.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::contracts::{ChatMessage, ModelOptions, ModelResponse};
use crate::error::ModelError;

/// A chat-completion backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier used in log lines.
    fn model_name(&self) -> &str;

    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        options: ModelOptions,
    ) -> Result<ModelResponse, ModelError>;
}

/// Generation parameters fixed when an agent is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2000,
            context_window: 4096,
        }
    }
}

impl ModelParams {
    /// Fill the unset fields of `options` from these parameters.
    pub fn apply(&self, options: ModelOptions) -> ModelOptions {
        ModelOptions {
            temperature: options.temperature.or(Some(self.temperature)),
            max_tokens: options.max_tokens.or(Some(self.max_tokens)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = ModelParams::default();
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.max_tokens, 2000);
        assert_eq!(params.context_window, 4096);
    }

    #[test]
    fn test_apply_keeps_explicit_options() {
        let params = ModelParams::default();
        let options = params.apply(ModelOptions::default().max_tokens(200));
        assert_eq!(options.max_tokens, Some(200));
        assert_eq!(options.temperature, Some(0.0));
    }
}

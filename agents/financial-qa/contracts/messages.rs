//! Chat messages and model envelopes

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message sent to a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call model options. Unset values fall back to the agent's parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelOptions {
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Raw model reply: the extracted text content, if any, plus the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub raw: serde_json::Value,
}

impl ModelResponse {
    /// Response carrying plain text content.
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            raw: serde_json::Value::String(content.clone()),
            content: Some(content),
        }
    }

    /// Text of the reply, or the envelope's string form when there is no
    /// content field.
    pub fn into_text(self) -> String {
        match self.content {
            Some(content) => content,
            None => self.raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").content, "a");

        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_response_text_fallback() {
        assert_eq!(ModelResponse::text("Revenue was $10M").into_text(), "Revenue was $10M");

        let response = ModelResponse {
            content: None,
            raw: json!({"choices": []}),
        };
        assert_eq!(response.into_text(), r#"{"choices":[]}"#);
    }

    #[test]
    fn test_options_skip_unset() {
        let json = serde_json::to_value(ModelOptions::default().max_tokens(100)).unwrap();
        assert_eq!(json, json!({"max_tokens": 100}));
    }
}

//! Application configuration
//!
//! Every section has defaults and can be read from the environment. A TOML
//! file may provide the base values; environment variables win over it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{QaError, Result};

pub const DEFAULT_PROJECT: &str = "financial-ai";
pub const DEFAULT_LANGSMITH_ENDPOINT: &str = "https://api.smith.langchain.com";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Remote span tracing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Tracing requested by the operator
    pub enabled: bool,

    /// LangSmith API key; tracing is disabled without one
    pub api_key: Option<String>,

    /// Project the runs are filed under
    pub project: String,

    /// LangSmith API base URL
    pub endpoint: String,

    /// Capacity of the span event queue
    pub queue_size: usize,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum retry attempts per span event
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            project: DEFAULT_PROJECT.to_string(),
            endpoint: DEFAULT_LANGSMITH_ENDPOINT.to_string(),
            queue_size: 1000,
            timeout_ms: 5000,
            max_retries: 3,
            initial_backoff_ms: 100,
        }
    }
}

impl TracingConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(&|key| std::env::var(key).ok());
        config.resolve()
    }

    /// Overlay values found through `lookup`.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LANGSMITH_TRACING") {
            self.enabled = parse_flag(&v);
        }
        if let Some(v) = non_empty(lookup("LANGSMITH_API_KEY")) {
            self.api_key = Some(v);
        }
        if let Some(v) = non_empty(lookup("LANGSMITH_PROJECT")) {
            self.project = v;
        }
        if let Some(v) = non_empty(lookup("LANGSMITH_ENDPOINT")) {
            self.endpoint = v;
        }
        self.queue_size = parse_or(lookup("TRACING_QUEUE_SIZE"), self.queue_size);
        self.timeout_ms = parse_or(lookup("TRACING_TIMEOUT_MS"), self.timeout_ms);
    }

    /// Downgrade to disabled when tracing is on but no API key is set.
    pub fn resolve(mut self) -> Self {
        if self.enabled && self.api_key.is_none() {
            tracing::warn!("LangSmith tracing enabled but LANGSMITH_API_KEY not set, disabling tracing");
            self.enabled = false;
        }
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

/// Azure OpenAI chat model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    pub deployment: Option<String>,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            deployment: None,
            timeout_ms: 60_000,
            temperature: 0.0,
            max_tokens: 2000,
            context_window: 4096,
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(&|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(v) = non_empty(lookup("AZURE_OPENAI_ENDPOINT")) {
            self.endpoint = Some(v);
        }
        if let Some(v) = non_empty(lookup("AZURE_OPENAI_API_KEY")) {
            self.api_key = Some(v);
        }
        if let Some(v) = non_empty(lookup("AZURE_OPENAI_API_VERSION")) {
            self.api_version = v;
        }
        if let Some(v) = non_empty(lookup("AZURE_OPENAI_CHAT_DEPLOYMENT")) {
            self.deployment = Some(v);
        }
    }

    /// Fail when a setting required to reach the model is missing.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push("AZURE_OPENAI_ENDPOINT");
        }
        if self.api_key.is_none() {
            missing.push("AZURE_OPENAI_API_KEY");
        }
        if self.deployment.is_none() {
            missing.push("AZURE_OPENAI_CHAT_DEPLOYMENT");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(QaError::configuration(format!(
                "Missing model settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Document search service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub top_k: usize,
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8090".to_string(),
            top_k: 5,
            timeout_ms: 10_000,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(&|key| std::env::var(key).ok());
        config
    }

    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(v) = non_empty(lookup("DOCUMENT_SEARCH_URL")) {
            self.endpoint = v;
        }
        self.top_k = parse_or(lookup("DOCUMENT_SEARCH_TOP_K"), self.top_k);
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(v) = non_empty(lookup("HOST")) {
            self.host = v;
        }
        self.port = parse_or(lookup("PORT"), self.port);
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracing: TracingConfig,
    pub model: ModelConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env(&|key| std::env::var(key).ok())
    }

    /// Load a TOML file and overlay environment variables.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QaError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config.with_env(&|key| std::env::var(key).ok()))
    }

    /// Overlay values found through `lookup` on every section.
    pub fn with_env(mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        self.tracing.apply_env(lookup);
        self.model.apply_env(lookup);
        self.search.apply_env(lookup);
        self.server.apply_env(lookup);
        self.tracing = self.tracing.resolve();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.tracing.enabled);
        assert_eq!(config.tracing.project, "financial-ai");
        assert_eq!(config.tracing.endpoint, "https://api.smith.langchain.com");
        assert_eq!(config.model.api_version, "2024-02-15-preview");
        assert_eq!(config.model.max_tokens, 2000);
        assert_eq!(config.model.context_window, 4096);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_tracing_from_vars() {
        let config = AppConfig::default().with_env(&lookup(&[
            ("LANGSMITH_TRACING", "true"),
            ("LANGSMITH_API_KEY", "ls-key"),
            ("LANGSMITH_PROJECT", "annual-reports"),
            ("TRACING_QUEUE_SIZE", "50"),
        ]));

        assert!(config.tracing.is_enabled());
        assert_eq!(config.tracing.project, "annual-reports");
        assert_eq!(config.tracing.queue_size, 50);
    }

    #[test]
    fn test_tracing_without_key_is_disabled() {
        let config = AppConfig::default().with_env(&lookup(&[("LANGSMITH_TRACING", "true")]));
        assert!(!config.tracing.enabled);
        assert!(!config.tracing.is_enabled());
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = AppConfig::default().with_env(&lookup(&[
            ("PORT", "not-a-port"),
            ("DOCUMENT_SEARCH_TOP_K", "-3"),
        ]));
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.search.top_k, 5);
    }

    #[test]
    fn test_model_validation() {
        let config = ModelConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_ENDPOINT"));
        assert!(err.to_string().contains("AZURE_OPENAI_CHAT_DEPLOYMENT"));

        let mut config = ModelConfig::default();
        config.apply_env(&lookup(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "key"),
            ("AZURE_OPENAI_CHAT_DEPLOYMENT", "gpt-4o"),
        ]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finqa.toml");
        std::fs::write(
            &path,
            r#"
[search]
endpoint = "http://search:9000"
top_k = 3

[server]
port = 9100
"#,
        )
        .unwrap();

        let config = AppConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.search.endpoint, "http://search:9000");
        assert_eq!(config.tracing.project, "financial-ai");
    }

    #[test]
    fn test_from_toml_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AppConfig::from_toml_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(QaError::Configuration(_))));

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            AppConfig::from_toml_file(&path),
            Err(QaError::Configuration(_))
        ));
    }
}

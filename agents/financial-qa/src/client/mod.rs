//! HTTP clients for external services
//!
//! - `langsmith`: runs API used by the span emitter
//! - `azure`: Azure OpenAI chat completions, the production [`ChatModel`](crate::agent::ChatModel)
//! - `search`: document search service, the production [`DocumentSearcher`](crate::engine::DocumentSearcher)

pub mod azure;
pub mod langsmith;
pub mod search;

pub use azure::AzureChatClient;
pub use langsmith::{LangSmithClient, LangSmithClientBuilder, LangSmithClientConfig};
pub use search::HttpDocumentSearcher;

//! Document search service client
//!
//! `POST {endpoint}/search` with `{question, company_info, top_k}` and a
//! `{sources: [...]}` reply.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::contracts::CompanyInfo;
use crate::engine::DocumentSearcher;
use crate::error::{QaError, SearchError};

#[derive(Serialize)]
struct SearchRequest<'a> {
    question: &'a str,
    company_info: &'a CompanyInfo,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    sources: Vec<String>,
}

/// Searcher backed by the HTTP search service
pub struct HttpDocumentSearcher {
    client: Client,
    url: String,
    top_k: usize,
}

impl HttpDocumentSearcher {
    pub fn from_config(config: &SearchConfig) -> Result<Self, QaError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| QaError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/search", config.endpoint.trim_end_matches('/')),
            top_k: config.top_k,
        })
    }

    async fn search(
        &self,
        company_info: &CompanyInfo,
        question: &str,
    ) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SearchRequest {
                question,
                company_info,
                top_k: self.top_k,
            })
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;
        Ok(body.sources)
    }
}

#[async_trait]
impl DocumentSearcher for HttpDocumentSearcher {
    async fn search_documents(
        &self,
        company_info: &CompanyInfo,
        question: &str,
    ) -> Result<Vec<String>, QaError> {
        let sources = self
            .search(company_info, question)
            .await
            .map_err(QaError::search)?;

        tracing::debug!(document_count = sources.len(), "Document search completed");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::error::Error as _;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn searcher(server: &MockServer) -> HttpDocumentSearcher {
        HttpDocumentSearcher::from_config(&SearchConfig {
            endpoint: server.uri(),
            top_k: 3,
            ..Default::default()
        })
        .unwrap()
    }

    fn test_corp() -> CompanyInfo {
        let mut info = CompanyInfo::new();
        info.insert("name".to_string(), json!("Test Corp"));
        info
    }

    #[tokio::test]
    async fn test_search_returns_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(json!({
                "question": "What is the revenue?",
                "company_info": {"name": "Test Corp"},
                "top_k": 3,
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"sources": ["doc1", "doc2"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sources = searcher(&server)
            .search_documents(&test_corp(), "What is the revenue?")
            .await
            .unwrap();
        assert_eq!(sources, vec!["doc1", "doc2"]);
    }

    #[tokio::test]
    async fn test_missing_sources_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let sources = searcher(&server)
            .search_documents(&CompanyInfo::new(), "Q")
            .await
            .unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_service_error_becomes_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("index offline"))
            .mount(&server)
            .await;

        let err = searcher(&server)
            .search_documents(&test_corp(), "Q")
            .await
            .unwrap_err();

        assert!(matches!(err, QaError::Search(_)));
        let source = err.source().unwrap().downcast_ref::<SearchError>().unwrap();
        assert_eq!(
            source,
            &SearchError::Status {
                status: 503,
                body: "index offline".to_string()
            }
        );
    }
}

//! HTTP adapter for an external similarity-search service.
//!
//! The service is expected to accept `POST {base}/search` with
//! `{"query", "k", "mode"}` and answer `{"results": [{"content",
//! "metadata", "score"}, ...]}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ScoredDocument, SearchMode, VectorStore};
use crate::error::RetrievalError;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
    mode: SearchMode,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<ScoredDocument>,
}

/// Vector store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVectorStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVectorStore {
    /// Creates an adapter for the service rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
        }
    }

    /// Full URL searched.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest { query, k, mode })
            .send()
            .await
            .map_err(|e| RetrievalError::Backend {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Backend {
                message: format!("{} returned {status}", self.endpoint),
            });
        }

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| RetrievalError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let mut results = body.results;
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);
        Ok(results)
    }
}

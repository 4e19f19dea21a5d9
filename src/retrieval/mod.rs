//! Vector store adapters.
//!
//! The pipeline only needs ranked `(content, metadata, score)` hits for a
//! query string. [`VectorStore`] is that seam; [`InMemoryVectorStore`]
//! indexes a JSON corpus in-process and [`HttpVectorStore`] forwards to an
//! external similarity-search service.

pub mod http;
pub mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::core::ScoredDocument;
use crate::error::{ConfigError, RetrievalError};
pub use http::HttpVectorStore;
pub use memory::InMemoryVectorStore;

/// How a store ranks candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Plain relevance ranking.
    Similarity,
    /// Maximal marginal relevance: relevance traded against redundancy.
    #[default]
    Mmr,
}

impl SearchMode {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Mmr => "mmr",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "similarity" | "sim" => Ok(Self::Similarity),
            "mmr" | "maxmarginalrelevance" => Ok(Self::Mmr),
            _ => Err(ConfigError::InvalidValue {
                key: "search_mode",
                value: s.to_string(),
            }),
        }
    }
}

/// A similarity-search index.
///
/// Implementations must return hits ordered by descending score and must
/// be idempotent for identical inputs while the index is unchanged.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Returns up to `k` documents for `query`.
    async fn search(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<ScoredDocument>, RetrievalError>;
}

//! Contextual compression of retrieved documents.
//!
//! After retrieval, each document is handed to the reasoning model together
//! with the query, and only the passages relevant to the query are kept.
//! A document the model judges irrelevant is dropped. A document whose
//! extraction call fails is kept as retrieved.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::config::RagConfig;
use super::prompt::build_compress_prompt;
use super::provider::LlmProvider;
use super::traits::{Agent, strip_code_fence};
use crate::core::{CompressionReport, RetrievedDocument, merge_ranked};
use crate::error::GenerationError;

/// What the model answers when a document has nothing relevant.
pub const NO_OUTPUT: &str = "NO_OUTPUT";

/// Result of compressing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    /// The relevant passages, verbatim.
    Relevant(String),
    /// Nothing in the document bears on the query.
    Irrelevant,
}

/// Agent that extracts the query-relevant parts of a document.
pub struct DocumentCompressor {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    concurrency: usize,
    system_prompt: String,
}

impl DocumentCompressor {
    /// Creates a compressor using the reasoning model.
    #[must_use]
    pub fn new(config: &RagConfig, system_prompt: String) -> Self {
        Self {
            model: config.reasoning_model.clone(),
            max_tokens: config.answer_max_tokens,
            timeout: config.generation_timeout,
            concurrency: config.max_concurrency,
            system_prompt,
        }
    }

    /// Extracts the parts of `content` relevant to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] when the model call fails or times out.
    pub async fn compress(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        content: &str,
    ) -> Result<Extract, GenerationError> {
        let response = self
            .execute(provider, &build_compress_prompt(query, content))
            .await?;
        Ok(parse_extract(&response.content))
    }

    /// Compresses every document, at most `max_concurrency` calls at a time.
    ///
    /// Order, scores and attribution are preserved; documents that end up
    /// identical are merged again.
    pub async fn compress_all(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        documents: Vec<RetrievedDocument>,
    ) -> (Vec<RetrievedDocument>, CompressionReport) {
        let start = Instant::now();
        let outcomes: Vec<_> = stream::iter(documents)
            .map(move |doc| async move {
                let outcome = self.compress(provider, query, &doc.content).await;
                (doc, outcome)
            })
            .buffered(self.concurrency.max(1))
            .collect()
            .await;

        let mut report = CompressionReport::default();
        let mut kept = Vec::with_capacity(outcomes.len());
        for (mut doc, outcome) in outcomes {
            match outcome {
                Ok(Extract::Relevant(text)) => {
                    report.extracted += 1;
                    doc.content = text;
                    kept.push(doc);
                }
                Ok(Extract::Irrelevant) => report.dropped += 1,
                Err(e) => {
                    warn!(source = doc.source(), error = %e, "compression failed, keeping document");
                    report.failed += 1;
                    kept.push(doc);
                }
            }
        }

        debug!(
            extracted = report.extracted,
            dropped = report.dropped,
            failed = report.failed,
            elapsed_ms = start.elapsed().as_millis(),
            "documents compressed"
        );
        (merge_ranked(kept), report)
    }
}

/// Reads the model's extraction. Blank output or [`NO_OUTPUT`] means irrelevant.
pub fn parse_extract(content: &str) -> Extract {
    let body = strip_code_fence(content).trim();
    if body.is_empty() || body.eq_ignore_ascii_case(NO_OUTPUT) {
        Extract::Irrelevant
    } else {
        Extract::Relevant(body.to_string())
    }
}

#[async_trait]
impl Agent for DocumentCompressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

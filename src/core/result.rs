//! The orchestrator's output: ranked documents plus how they were found.

use std::time::Duration;

use serde::Serialize;

use super::document::RetrievedDocument;
use super::strategy::{Strategy, StrategyDecision};

/// Outcome of retrieval for one sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubQueryReport {
    /// Sub-question as produced by decomposition (or the query itself).
    pub text: String,
    /// Text actually sent to the vector store, after any rewrite.
    pub search_text: String,
    /// Documents returned by the store for this sub-query.
    pub hits: usize,
    /// Why retrieval failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubQueryReport {
    /// Returns `true` if the store call for this sub-query succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What contextual compression did to the retrieved documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompressionReport {
    /// Documents reduced to their relevant passages.
    pub extracted: usize,
    /// Documents judged irrelevant and removed.
    pub dropped: usize,
    /// Documents kept unchanged because extraction failed.
    pub failed: usize,
}

/// How the documents in a [`RetrievalResult`] were obtained.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMetadata {
    /// Classifier verdict (or the forced/default decision).
    pub decision: StrategyDecision,
    /// Path actually executed.
    pub strategy_used: Strategy,
    /// Number of sub-queries issued to the vector store.
    pub subquery_count: usize,
    /// Number of those calls that succeeded.
    pub successful_subqueries: usize,
    /// Per-sub-query detail, in processing order.
    pub subqueries: Vec<SubQueryReport>,
    /// Rewritten or hypothetical search text for single-search strategies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_query: Option<String>,
    /// `true` when decomposition yielded nothing new and the direct path ran instead.
    pub decomposition_fallback: bool,
    /// Present when documents went through contextual compression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionReport>,
    /// Wall time spent in retrieval.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

/// De-duplicated, relevance-sorted documents and their provenance.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    /// Documents, highest relevance first, unique by [`DocumentKey`](super::DocumentKey).
    pub documents: Vec<RetrievedDocument>,
    /// Provenance.
    pub metadata: RetrievalMetadata,
}

impl RetrievalResult {
    /// Returns `true` if no documents were retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sub-query report that produced `doc`.
    #[must_use]
    pub fn origin_of(&self, doc: &RetrievedDocument) -> Option<&SubQueryReport> {
        self.metadata.subqueries.get(doc.originating_subquery)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

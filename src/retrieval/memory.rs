//! In-process lexical index.
//!
//! Documents are tokenized into Unicode words and represented as
//! term-frequency vectors. Similarity search ranks by cosine similarity;
//! MMR search re-ranks the best candidates to penalize near-duplicates.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use rayon::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

use super::{ScoredDocument, SearchMode, VectorStore};
use crate::error::RetrievalError;

/// Relevance/diversity trade-off for MMR (1.0 = pure relevance).
const MMR_LAMBDA: f32 = 0.5;
/// Minimum candidate pool considered by MMR.
const MMR_MIN_FETCH: usize = 20;

type TermVector = HashMap<String, f32>;

fn term_vector(text: &str) -> TermVector {
    let mut terms = TermVector::new();
    for word in text.unicode_words() {
        *terms.entry(word.to_lowercase()).or_insert(0.0) += 1.0;
    }
    terms
}

fn norm(v: &TermVector) -> f32 {
    v.values().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two sparse vectors with precomputed norms.
/// Returns 0.0 when either vector is empty.
fn cosine(a: &TermVector, a_norm: f32, b: &TermVector, b_norm: f32) -> f32 {
    let denom = a_norm * b_norm;
    if denom < f32::EPSILON {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f32 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();
    (dot / denom).clamp(0.0, 1.0)
}

#[derive(Debug)]
struct Entry {
    doc: ScoredDocument,
    terms: TermVector,
    norm: f32,
}

/// A corpus held in memory and searched lexically.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: Vec<Entry>,
}

impl InMemoryVectorStore {
    /// Indexes the given documents. Incoming scores are ignored.
    #[must_use]
    pub fn from_documents(docs: impl IntoIterator<Item = ScoredDocument>) -> Self {
        let entries = docs
            .into_iter()
            .filter(|d| !d.content.trim().is_empty())
            .map(|doc| {
                let terms = term_vector(&doc.content);
                let norm = norm(&terms);
                Entry { doc, terms, norm }
            })
            .collect();
        Self { entries }
    }

    /// Loads a JSON array of `{"content": ..., "metadata": {...}}` objects.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Corpus`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RetrievalError::Corpus {
            message: format!("{}: {e}", path.display()),
        })?;
        let docs: Vec<ScoredDocument> =
            serde_json::from_str(&raw).map_err(|e| RetrievalError::Corpus {
                message: format!("{}: {e}", path.display()),
            })?;
        let store = Self::from_documents(docs);
        tracing::info!(path = %path.display(), documents = store.len(), "corpus loaded");
        Ok(store)
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries with a positive score, best first.
    fn ranked(&self, query: &TermVector) -> Vec<(usize, f32)> {
        let q_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .par_iter()
            .enumerate()
            .map(|(i, e)| (i, cosine(query, q_norm, &e.terms, e.norm)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
    }

    fn mmr(&self, candidates: &[(usize, f32)], k: usize) -> Vec<(usize, f32)> {
        let mut remaining: Vec<(usize, f32)> = candidates.to_vec();
        let mut selected: Vec<(usize, f32)> = Vec::with_capacity(k);

        while selected.len() < k && !remaining.is_empty() {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, &(idx, relevance)) in remaining.iter().enumerate() {
                let cand = &self.entries[idx];
                let redundancy = selected
                    .iter()
                    .map(|&(s, _)| {
                        let other = &self.entries[s];
                        cosine(&cand.terms, cand.norm, &other.terms, other.norm)
                    })
                    .fold(0.0_f32, f32::max);
                let score = MMR_LAMBDA.mul_add(relevance, -(1.0 - MMR_LAMBDA) * redundancy);
                if score > best_score {
                    best_score = score;
                    best = pos;
                }
            }
            selected.push(remaining.remove(best));
        }
        selected
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        let terms = term_vector(query);
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let ranked = self.ranked(&terms);
        let picked = match mode {
            SearchMode::Similarity => ranked.into_iter().take(k).collect(),
            SearchMode::Mmr => {
                let fetch_k = (k * 4).max(MMR_MIN_FETCH);
                let pool = &ranked[..ranked.len().min(fetch_k)];
                let mut picked = self.mmr(pool, k);
                // report by relevance so callers can merge on score
                picked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                picked
            }
        };

        Ok(picked
            .into_iter()
            .map(|(idx, score)| ScoredDocument {
                score,
                ..self.entries[idx].doc.clone()
            })
            .collect())
    }
}

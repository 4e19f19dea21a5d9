//! Retrieved documents and their de-duplication key.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Metadata keys consulted, in order, to identify where a document came from.
const SOURCE_KEYS: [&str; 4] = ["source", "id", "path", "url"];

/// A single hit as returned by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Document text.
    pub content: String,
    /// Source metadata (file path, title, page, ...).
    ///
    /// Stores may send any JSON values; scalars are kept as text, nested
    /// values as compact JSON and nulls are dropped.
    #[serde(default, deserialize_with = "metadata_as_text")]
    pub metadata: BTreeMap<String, String>,
    /// Relevance score, higher is better.
    #[serde(default)]
    pub score: f32,
}

fn metadata_as_text<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key, text)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// A document attributed to the sub-query that retrieved it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Document text.
    pub content: String,
    /// Source metadata.
    pub source_metadata: BTreeMap<String, String>,
    /// Relevance score, higher is better.
    pub relevance_score: f32,
    /// Index into [`RetrievalMetadata::subqueries`](super::RetrievalMetadata::subqueries).
    pub originating_subquery: usize,
}

impl RetrievedDocument {
    /// Attributes a store hit to the sub-query at `subquery`.
    #[must_use]
    pub fn from_scored(doc: ScoredDocument, subquery: usize) -> Self {
        Self {
            content: doc.content,
            source_metadata: doc.metadata,
            relevance_score: doc.score,
            originating_subquery: subquery,
        }
    }

    /// Source identifier from metadata, or the empty string.
    #[must_use]
    pub fn source(&self) -> &str {
        SOURCE_KEYS
            .iter()
            .find_map(|k| self.source_metadata.get(*k))
            .map_or("", String::as_str)
    }

    /// Uniqueness key used for de-duplication.
    #[must_use]
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            content_hash: *blake3::hash(self.content.as_bytes()).as_bytes(),
            source: self.source().to_string(),
        }
    }
}

/// Identity of a document: hash of its content plus its source identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    content_hash: [u8; 32],
    source: String,
}

/// Merges documents into a de-duplicated list sorted by descending relevance.
///
/// The first occurrence of each key is kept (including its sub-query
/// attribution) and its score is raised to the maximum seen across all
/// duplicates. The sort is stable, so ties keep first-occurrence order.
pub fn merge_ranked(docs: impl IntoIterator<Item = RetrievedDocument>) -> Vec<RetrievedDocument> {
    let mut merged: Vec<RetrievedDocument> = Vec::new();
    let mut positions: HashMap<DocumentKey, usize> = HashMap::new();

    for doc in docs {
        let key = doc.key();
        if let Some(&pos) = positions.get(&key) {
            let kept = &mut merged[pos];
            if doc.relevance_score > kept.relevance_score {
                kept.relevance_score = doc.relevance_score;
            }
        } else {
            positions.insert(key, merged.len());
            merged.push(doc);
        }
    }

    merged.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn doc(content: &str, source: &str, score: f32, subquery: usize) -> RetrievedDocument {
        let mut metadata = BTreeMap::new();
        if !source.is_empty() {
            metadata.insert("source".to_string(), source.to_string());
        }
        RetrievedDocument {
            content: content.to_string(),
            source_metadata: metadata,
            relevance_score: score,
            originating_subquery: subquery,
        }
    }

    #[test]
    fn test_duplicate_keeps_first_and_max_score() {
        let merged = merge_ranked(vec![
            doc("alpha", "a.md", 0.4, 0),
            doc("beta", "b.md", 0.5, 0),
            doc("alpha", "a.md", 0.9, 2),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "alpha");
        assert!((merged[0].relevance_score - 0.9).abs() < f32::EPSILON);
        assert_eq!(merged[0].originating_subquery, 0);
    }

    #[test]
    fn test_same_content_different_source_is_distinct() {
        let merged = merge_ranked(vec![doc("same", "a.md", 0.1, 0), doc("same", "b.md", 0.2, 1)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_source_key_fallbacks() {
        let mut d = doc("x", "", 0.0, 0);
        assert_eq!(d.source(), "");
        d.source_metadata.insert("path".to_string(), "/docs/x".to_string());
        assert_eq!(d.source(), "/docs/x");
        d.source_metadata.insert("source".to_string(), "x.md".to_string());
        assert_eq!(d.source(), "x.md");
    }

    #[test]
    fn test_scored_document_metadata_accepts_any_json() {
        let doc: ScoredDocument = serde_json::from_str(
            r#"{"content": "x", "score": 0.5, "metadata": {
                "source": "guide.pdf", "page": 3, "draft": false,
                "tags": ["a", "b"], "owner": null
            }}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(doc.metadata["source"], "guide.pdf");
        assert_eq!(doc.metadata["page"], "3");
        assert_eq!(doc.metadata["draft"], "false");
        assert_eq!(doc.metadata["tags"], r#"["a","b"]"#);
        assert!(!doc.metadata.contains_key("owner"));
    }

    #[test]
    fn test_scored_document_metadata_optional() {
        let missing: ScoredDocument =
            serde_json::from_str(r#"{"content": "x"}"#).unwrap_or_else(|_| unreachable!());
        let null: ScoredDocument = serde_json::from_str(r#"{"content": "x", "metadata": null}"#)
            .unwrap_or_else(|_| unreachable!());
        assert!(missing.metadata.is_empty());
        assert!(null.metadata.is_empty());
    }

    #[test]
    fn test_stable_order_on_ties() {
        let merged = merge_ranked(vec![doc("one", "", 0.5, 0), doc("two", "", 0.5, 1)]);
        assert_eq!(merged[0].content, "one");
        assert_eq!(merged[1].content, "two");
    }

    fn arb_docs() -> impl Strategy<Value = Vec<Vec<RetrievedDocument>>> {
        let one = (0u8..6, 0u8..3, 0.0f32..1.0).prop_map(|(c, s, score)| {
            doc(&format!("content-{c}"), &format!("src-{s}"), score, 0)
        });
        prop::collection::vec(prop::collection::vec(one, 0..8), 1..5)
    }

    proptest! {
        #[test]
        fn prop_merge_has_unique_keys(groups in arb_docs()) {
            let merged = merge_ranked(groups.into_iter().flatten());
            let keys: HashSet<DocumentKey> = merged.iter().map(RetrievedDocument::key).collect();
            prop_assert_eq!(keys.len(), merged.len());
        }

        #[test]
        fn prop_merge_is_sorted_descending(groups in arb_docs()) {
            let merged = merge_ranked(groups.into_iter().flatten());
            for pair in merged.windows(2) {
                prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
            }
        }

        #[test]
        fn prop_merge_count_bounds(groups in arb_docs()) {
            // Each group stands for one sub-query's (already unique) hits.
            let groups: Vec<Vec<RetrievedDocument>> =
                groups.into_iter().map(merge_ranked).collect();
            let sum: usize = groups.iter().map(Vec::len).sum();
            let max = groups.iter().map(Vec::len).max().unwrap_or(0);
            let merged = merge_ranked(groups.into_iter().flatten());
            prop_assert!(merged.len() <= sum);
            prop_assert!(merged.len() >= max);
        }
    }
}

//! Query types: raw user turns, standalone queries and sub-queries.

use serde::{Deserialize, Serialize};

/// One completed exchange in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// What the user asked.
    pub question: String,
    /// What the assistant answered.
    pub answer: String,
}

impl Turn {
    /// Creates a turn from a question and its answer.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A user question together with the conversation it was asked in.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    /// The new question.
    pub text: &'a str,
    /// Prior turns, oldest first.
    pub history: &'a [Turn],
}

impl<'a> Query<'a> {
    /// Creates a query over borrowed history.
    #[must_use]
    pub const fn new(text: &'a str, history: &'a [Turn]) -> Self {
        Self { text, history }
    }
}

/// A question that can be understood without any conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandaloneQuery(String);

impl StandaloneQuery {
    /// Wraps a self-contained question.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the query, returning its text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for StandaloneQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A retrieval-ready question derived from a parent query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Position among its siblings; also the stable processing order.
    pub index: usize,
    /// Sub-question text.
    pub text: String,
    /// Query this sub-query was derived from.
    pub parent: String,
}

impl SubQuery {
    /// Creates a sub-query at `index` derived from `parent`.
    pub fn new(index: usize, text: impl Into<String>, parent: &StandaloneQuery) -> Self {
        Self {
            index,
            text: text.into(),
            parent: parent.as_str().to_string(),
        }
    }

    /// Returns `true` when this sub-query only repeats its parent.
    #[must_use]
    pub fn echoes_parent(&self) -> bool {
        normalize(&self.text) == normalize(&self.parent)
    }
}

/// Lowercases and collapses whitespace and trailing punctuation for comparison.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['?', '.', '!', '？', '。'])
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subquery_echo_detection() {
        let parent = StandaloneQuery::new("What is   the retry policy?");
        assert!(SubQuery::new(0, "what is the retry policy", &parent).echoes_parent());
        assert!(!SubQuery::new(0, "What is the timeout policy?", &parent).echoes_parent());
    }

    #[test]
    fn test_standalone_query_serializes_as_string() {
        let q = StandaloneQuery::new("hello");
        let json = serde_json::to_string(&q).unwrap_or_default();
        assert_eq!(json, "\"hello\"");
    }
}

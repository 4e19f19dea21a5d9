//! Query complexity and retrieval strategy.
//!
//! The classifier speaks in free text; everything downstream speaks in
//! these enums. Labels are parsed once, here, and never compared as
//! strings again.

use serde::{Deserialize, Serialize};

/// How much retrieval work a query needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// One fact, answerable from a single search.
    Simple,
    /// Several independent facets.
    Complex,
    /// Single intent, but phrased poorly for retrieval.
    Hybrid,
}

impl Complexity {
    /// Parses a complexity label, accepting the synonyms models tend to emit.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "simple" | "basic" | "easy" | "low" => Some(Self::Simple),
            "complex" | "hard" | "high" | "multi" | "multi-part" => Some(Self::Complex),
            "hybrid" | "medium" | "moderate" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Strategy that matches this complexity.
    #[must_use]
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::Simple => Strategy::Direct,
            Self::Complex => Strategy::Decompose,
            Self::Hybrid => Strategy::Rewrite,
        }
    }

    /// Returns the label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval path taken by the orchestrator.
///
/// Variants are declared cheapest first; the derived [`Ord`] is used to
/// break ties in favor of the cheaper path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One search with the query as given.
    Direct,
    /// One rewrite, then one search.
    Rewrite,
    /// One generated hypothetical answer used as the search text.
    ///
    /// Only reachable through an explicit override; the classifier never
    /// recommends it.
    Hyde,
    /// Split into sub-queries, rewrite and search each, then merge.
    Decompose,
}

impl Strategy {
    /// Every strategy, in catalogue order.
    pub const ALL: [Self; 4] = [Self::Direct, Self::Rewrite, Self::Decompose, Self::Hyde];

    /// Parses a strategy label, accepting the synonyms models tend to emit.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "direct" | "basic" | "simple" => Some(Self::Direct),
            "rewrite" | "hybrid" | "query_rewrite" | "rewritten" => Some(Self::Rewrite),
            "decompose" | "decomposition" | "complex" | "decomposed" => Some(Self::Decompose),
            "hyde" => Some(Self::Hyde),
            _ => None,
        }
    }

    /// Complexity that naturally leads to this strategy.
    #[must_use]
    pub const fn complexity(self) -> Complexity {
        match self {
            Self::Direct => Complexity::Simple,
            Self::Rewrite | Self::Hyde => Complexity::Hybrid,
            Self::Decompose => Complexity::Complex,
        }
    }

    /// Returns the label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Rewrite => "rewrite",
            Self::Decompose => "decompose",
            Self::Hyde => "hyde",
        }
    }

    /// One-line description for the strategy catalogue.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Direct => "Search once with the question as asked. Used for simple factual questions.",
            Self::Rewrite => {
                "Rewrite the question into retrieval-friendly terms, then search once."
            }
            Self::Decompose => {
                "Split a multi-part question into sub-questions, rewrite and search each concurrently, then merge and de-duplicate."
            }
            Self::Hyde => {
                "Generate a hypothetical answer passage and search with it instead of the question."
            }
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classifier's verdict for one query.
///
/// Produced once per query and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDecision {
    /// Assessed complexity.
    pub complexity: Complexity,
    /// Strategy the orchestrator will run.
    pub strategy: Strategy,
    /// `true` when this decision is the safe default rather than model output.
    #[serde(default)]
    pub defaulted: bool,
    /// `true` when the caller forced the strategy and classification was skipped.
    #[serde(default)]
    pub forced: bool,
}

impl StrategyDecision {
    /// A decision taken from model output.
    #[must_use]
    pub const fn new(complexity: Complexity, strategy: Strategy) -> Self {
        Self {
            complexity,
            strategy,
            defaulted: false,
            forced: false,
        }
    }

    /// A decision imposed by the caller.
    #[must_use]
    pub const fn forced(strategy: Strategy) -> Self {
        Self {
            complexity: strategy.complexity(),
            strategy,
            defaulted: false,
            forced: true,
        }
    }

    /// The fallback used when classification output cannot be understood.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            complexity: Complexity::Simple,
            strategy: Strategy::Direct,
            defaulted: true,
            forced: false,
        }
    }
}

impl Default for StrategyDecision {
    fn default() -> Self {
        Self::fallback()
    }
}

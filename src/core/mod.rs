//! Core data model shared by every pipeline stage.
//!
//! These types carry no behavior beyond construction, ordering and
//! de-duplication keys, so they can be used from the HTTP layer, the
//! CLI and tests without pulling in any provider.

pub mod document;
pub mod query;
pub mod result;
pub mod strategy;

pub use document::{DocumentKey, RetrievedDocument, ScoredDocument, merge_ranked};
pub use query::{Query, StandaloneQuery, SubQuery, Turn};
pub use result::{CompressionReport, RetrievalMetadata, RetrievalResult, SubQueryReport};
pub use strategy::{Complexity, Strategy, StrategyDecision};

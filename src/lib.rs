//! # adaptive-rag
//!
//! Conversational question answering over a private document corpus with
//! adaptive retrieval.
//!
//! Each turn runs the same pipeline:
//!
//! 1. **Contextualize**: rewrite a follow-up question into a standalone one
//!    using the session's history.
//! 2. **Classify**: decide whether the question is simple, poorly phrased,
//!    or multi-part.
//! 3. **Retrieve**: search once as asked, search once with a rewritten
//!    query, or decompose into sub-questions searched concurrently and
//!    merged without duplicates.
//! 4. **Synthesize**: answer from the retrieved documents within a
//!    context budget.
//!
//! Retrieval and classification problems degrade to cheaper paths and are
//! reported in [`RetrievalMetadata`](crate::core::RetrievalMetadata); only answer generation failure
//! reaches the caller.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use adaptive_rag::agent::{AskOptions, RagConfig, RagPipeline, create_provider};
//! use adaptive_rag::memory::InMemoryStore;
//! use adaptive_rag::retrieval::InMemoryVectorStore;
//!
//! # async fn run() -> adaptive_rag::Result<()> {
//! let config = RagConfig::from_env()?;
//! let store = InMemoryVectorStore::load(std::path::Path::new("docs.json"))?;
//! let pipeline = RagPipeline::new(
//!     Arc::from(create_provider(&config)?),
//!     Arc::new(store),
//!     Arc::new(InMemoryStore::new(config.memory_retention)),
//!     &config,
//! );
//! let answer = pipeline
//!     .answer("session-1", "What is the retry policy of service B?", AskOptions::default())
//!     .await?;
//! println!("{}", answer.answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod logging;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod memory;
pub mod retrieval;
pub mod server;

pub use agent::{AskOptions, RagConfig, RagPipeline};
pub use crate::core::{RetrievalMetadata, RetrievalResult, RetrievedDocument, Strategy, StrategyDecision};
pub use error::{Error, Result};
pub use retrieval::{SearchMode, VectorStore};

//! Generation-backed components of the question-answering pipeline.
//!
//! Every component talks to the model through the pluggable
//! [`LlmProvider`] abstraction, backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! question + history → RagPipeline
//!   ├── Contextualizer (standalone query)
//!   ├── Orchestrator
//!   │   ├── Classifier (strategy decision)
//!   │   ├── QueryTransformer (rewrite / decompose / hypothetical answer)
//!   │   ├── Fan-out → N concurrent sub-query searches → merge + dedupe
//!   │   └── DocumentCompressor (optional, relevant passages only)
//!   └── Synthesizer → final answer
//! ```

pub mod classifier;
pub mod client;
pub mod compressor;
pub mod config;
pub mod contextualizer;
pub mod message;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod synthesizer;
pub mod traits;
pub mod transformer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use classifier::Classifier;
pub use client::create_provider;
pub use compressor::DocumentCompressor;
pub use config::{RagConfig, RagConfigBuilder};
pub use contextualizer::Contextualizer;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use pipeline::{Answer, AskOptions, RagPipeline};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use synthesizer::Synthesizer;
pub use traits::{Agent, AgentResponse};
pub use transformer::QueryTransformer;

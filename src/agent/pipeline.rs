//! One conversational turn, end to end.
//!
//! ```text
//! question + session history
//!   → Contextualizer  (standalone query)
//!   → Orchestrator    (classify, transform, search, merge)
//!   → Synthesizer     (answer)
//!   → memory append
//! ```
//!
//! History lives in an injected [`MemoryStore`]; the pipeline reads it
//! before answering and appends only after a successful answer. Requests
//! for the same session run one at a time.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use super::config::RagConfig;
use super::contextualizer::Contextualizer;
use super::orchestrator::Orchestrator;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::synthesizer::Synthesizer;
use crate::core::{Query, RetrievalResult, StandaloneQuery, Strategy, Turn};
use crate::error::{CommandError, MemoryError, Result};
use crate::memory::{MemoryStore, SessionLocks};
use crate::retrieval::VectorStore;

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    /// Forget the session's history before answering.
    pub clear_history: bool,
    /// Run this strategy instead of asking the classifier.
    pub strategy: Option<Strategy>,
}

/// Result of one turn.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated answer text.
    pub answer: String,
    /// Question as used for retrieval.
    pub standalone_query: StandaloneQuery,
    /// Documents and retrieval provenance.
    pub retrieval: RetrievalResult,
}

/// The question-answering pipeline.
pub struct RagPipeline {
    provider: Arc<dyn LlmProvider>,
    memory: Arc<dyn MemoryStore>,
    contextualizer: Contextualizer,
    orchestrator: Orchestrator,
    synthesizer: Synthesizer,
    locks: SessionLocks,
}

impl RagPipeline {
    /// Creates a pipeline, loading prompts from [`RagConfig::prompt_dir`].
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        memory: Arc<dyn MemoryStore>,
        config: &RagConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(provider, store, memory, config, &prompts)
    }

    /// Creates a pipeline with an explicit prompt set.
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        memory: Arc<dyn MemoryStore>,
        config: &RagConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            contextualizer: Contextualizer::new(config, prompts.contextualize.clone()),
            orchestrator: Orchestrator::new(Arc::clone(&provider), store, config, prompts),
            synthesizer: Synthesizer::new(config, prompts.answer.clone()),
            provider,
            memory,
            locks: SessionLocks::new(),
        }
    }

    /// The retrieval orchestrator, for callers that only need documents.
    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Answers `question` in the context of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidInput`] for a blank question and
    /// [`crate::error::SynthesisError`] when no answer could be generated.
    /// Retrieval problems never fail the turn.
    pub async fn answer(
        &self,
        session_id: &str,
        question: &str,
        options: AskOptions,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CommandError::InvalidInput("question must not be empty".to_string()).into());
        }

        let start = Instant::now();
        let _session = self.locks.acquire(session_id).await;

        if options.clear_history {
            self.memory.clear(session_id).await?;
        }
        let history = self.memory.get(session_id).await.unwrap_or_else(|e| {
            warn!(session_id, error = %e, "history unavailable, answering without it");
            Vec::new()
        });

        let standalone = self
            .contextualizer
            .contextualize(&*self.provider, Query::new(question, &history))
            .await;
        let retrieval = self.orchestrator.retrieve(&standalone, options.strategy).await;
        let answer = self
            .synthesizer
            .synthesize(&*self.provider, &standalone, &retrieval, &history)
            .await?;

        if let Err(e) = self
            .memory
            .append(session_id, Turn::new(question, answer.clone()))
            .await
        {
            warn!(session_id, error = %e, "failed to record turn");
        }

        info!(
            session_id,
            strategy = %retrieval.metadata.strategy_used,
            documents = retrieval.documents.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "question answered"
        );

        Ok(Answer {
            answer,
            standalone_query: standalone,
            retrieval,
        })
    }

    /// Forgets the history of `session_id`.
    ///
    /// Waits for any in-flight request on the session to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError`] if the store cannot be updated.
    pub async fn clear_history(&self, session_id: &str) -> std::result::Result<(), MemoryError> {
        let _session = self.locks.acquire(session_id).await;
        self.memory.clear(session_id).await
    }
}

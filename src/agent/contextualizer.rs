//! Conversational contextualizer.
//!
//! Turns a follow-up question into one that stands on its own, so that
//! retrieval does not depend on conversation state.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::RagConfig;
use super::prompt::build_contextualize_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::{Query, StandaloneQuery};

/// Agent that resolves history references in a new question.
pub struct Contextualizer {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    history_turns: usize,
    system_prompt: String,
}

impl Contextualizer {
    /// Creates a contextualizer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &RagConfig, system_prompt: String) -> Self {
        Self {
            model: config.reasoning_model.clone(),
            max_tokens: config.reasoning_max_tokens,
            timeout: config.generation_timeout,
            history_turns: config.history_turns,
            system_prompt,
        }
    }

    /// Produces a standalone version of `query.text`.
    ///
    /// With no history the question is returned unchanged and the model is
    /// not called. Generation failures and empty output fall back to the
    /// raw question.
    pub async fn contextualize(
        &self,
        provider: &dyn LlmProvider,
        query: Query<'_>,
    ) -> StandaloneQuery {
        if query.history.is_empty() || self.history_turns == 0 {
            return StandaloneQuery::new(query.text);
        }

        let start = Instant::now();
        let prompt = build_contextualize_prompt(query.history, query.text, self.history_turns);
        match self.execute(provider, &prompt).await {
            Ok(response) => {
                let text = clean(&response.content);
                if text.is_empty() {
                    warn!("contextualizer returned empty text, using raw question");
                    return StandaloneQuery::new(query.text);
                }
                debug!(
                    standalone = %text,
                    elapsed_ms = start.elapsed().as_millis(),
                    "question contextualized"
                );
                StandaloneQuery::new(text)
            }
            Err(e) => {
                warn!(error = %e, "contextualization failed, using raw question");
                StandaloneQuery::new(query.text)
            }
        }
    }
}

/// Trims whitespace, wrapping quotes and a leading label.
fn clean(content: &str) -> String {
    let trimmed = content.trim();
    let unlabeled = trimmed
        .strip_prefix("Standalone question:")
        .map_or(trimmed, str::trim);
    unlabeled
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}

#[async_trait]
impl Agent for Contextualizer {
    fn name(&self) -> &'static str {
        "contextualizer"
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

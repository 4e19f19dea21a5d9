//! Agent trait definition.
//!
//! Every generation-backed component (contextualizer, classifier,
//! transformer, synthesizer) implements this trait, which gives the
//! pipeline a uniform way to call the model under a deadline.

use std::time::Duration;

use async_trait::async_trait;

use super::message::{ChatRequest, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::GenerationError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a fixed system prompt and
/// model configuration. Callers run [`Agent::execute`] against a provider.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        512
    }

    /// Deadline for a single call.
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Executes the agent with the given user message.
    ///
    /// Builds a [`ChatRequest`] from the agent's configuration and
    /// delegates to the provider, bounded by [`Agent::timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] on API failures or when the deadline passes.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, GenerationError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let timeout = self.timeout();
        let response = tokio::time::timeout(timeout, provider.chat(&request))
            .await
            .map_err(|_| GenerationError::Timeout { timeout })??;

        tracing::debug!(
            agent = self.name(),
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "agent call complete"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

/// Strips a surrounding Markdown code fence (```` ```json ```` or ```` ``` ````).
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}

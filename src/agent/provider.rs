//! Pluggable generation model trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. This keeps every pipeline component
//! decoupled from any particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::GenerationError;

/// Trait for generation model backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls, retries)
/// for a specific provider while presenting a uniform interface to agents.
/// Deadlines are applied by the caller, see [`Agent::execute`](super::traits::Agent::execute).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] on API failures or quota errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GenerationError>;

    /// Completes a bare prompt and returns the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::EmptyResponse`] when the model produced no
    /// text, or any error from [`LlmProvider::chat`].
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let response = self
            .chat(&ChatRequest::prompt(model, prompt, max_tokens))
            .await?;
        if response.content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_complete_sends_bare_prompt() {
        let provider = ScriptedProvider::fixed("passage");
        let text = provider
            .complete("gpt-4o-mini", "Write a passage", 64)
            .await
            .unwrap_or_default();
        assert_eq!(text, "passage");

        let requests = provider.requests();
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].max_tokens, Some(64));
        assert_eq!(requests[0].last_user_content(), Some("Write a passage"));
    }

    #[tokio::test]
    async fn test_complete_rejects_blank_text() {
        let provider = ScriptedProvider::fixed("  ");
        let result = provider.complete("m", "p", 16).await;
        assert!(matches!(result, Err(GenerationError::EmptyResponse)));
    }
}

//! Provider factory.

use crate::agent::config::RagConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::GenerationError;

/// Instantiates the backend named by [`RagConfig::provider`].
///
/// `openai` (the default) covers every chat-completions compatible endpoint
/// through [`RagConfig::base_url`].
///
/// # Errors
///
/// Returns [`GenerationError::UnsupportedProvider`] for any other name.
pub fn create_provider(config: &RagConfig) -> Result<Box<dyn LlmProvider>, GenerationError> {
    let name = config.provider.trim().to_lowercase();
    let provider: Box<dyn LlmProvider> = match name.as_str() {
        "openai" | "openai-compatible" => Box::new(OpenAiProvider::new(config)),
        _ => {
            return Err(GenerationError::UnsupportedProvider {
                name: config.provider.clone(),
            });
        }
    };
    tracing::debug!(
        provider = provider.name(),
        answer_model = %config.answer_model,
        reasoning_model = %config.reasoning_model,
        "generation provider ready"
    );
    Ok(provider)
}

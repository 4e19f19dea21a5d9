//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Any endpoint speaking the chat completions protocol works (`OpenAI`,
//! Azure, vLLM, local proxies); point [`RagConfig::base_url`] at it.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionResponse, ResponseFormat,
};
use async_trait::async_trait;
use tracing::debug;

use crate::agent::config::RagConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::GenerationError;

/// Chat completions backend.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a client for the configured key and endpoint.
    #[must_use]
    pub fn new(config: &RagConfig) -> Self {
        let sdk_config = config.base_url.as_deref().map_or_else(
            || OpenAIConfig::new().with_api_key(&config.api_key),
            |base| {
                OpenAIConfig::new()
                    .with_api_key(&config.api_key)
                    .with_api_base(base)
            },
        );
        Self {
            client: Client::with_config(sdk_config),
        }
    }
}

impl From<&ChatMessage> for ChatCompletionRequestMessage {
    fn from(msg: &ChatMessage) -> Self {
        let text = msg.content.clone();
        match msg.role {
            Role::System => Self::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                name: None,
            }),
            Role::User => Self::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(text),
                name: None,
            }),
            #[allow(deprecated)]
            Role::Assistant => Self::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            }),
        }
    }
}

/// Translates a pipeline request into the SDK's request body.
///
/// A zero temperature is left unset: several reasoning models reject the
/// parameter, and zero is what they do anyway.
fn to_sdk_request(request: &ChatRequest) -> CreateChatCompletionRequest {
    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(Into::into).collect(),
        temperature: request.temperature.filter(|&t| t != 0.0),
        max_completion_tokens: request.max_tokens,
        response_format: request.json_mode.then_some(ResponseFormat::JsonObject),
        ..Default::default()
    }
}

/// Takes the first choice; a response without choices yields empty text.
fn from_sdk_response(response: CreateChatCompletionResponse) -> ChatResponse {
    let usage = response.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });
    let Some(choice) = response.choices.into_iter().next() else {
        return ChatResponse {
            content: String::new(),
            usage,
            finish_reason: None,
        };
    };
    ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        finish_reason: choice
            .finish_reason
            .map(|reason| format!("{reason:?}").to_lowercase()),
    }
}

fn to_generation_error(err: &OpenAIError) -> GenerationError {
    let status = match err {
        OpenAIError::Reqwest(e) => e.status().map(|s| s.as_u16()),
        _ => None,
    };
    GenerationError::ApiRequest {
        message: err.to_string(),
        status,
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GenerationError> {
        let response = self
            .client
            .chat()
            .create(to_sdk_request(request))
            .await
            .map_err(|e| to_generation_error(&e))?;
        let response = from_sdk_response(response);
        debug!(
            model = %request.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "chat completion"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{assistant_message, system_message, user_message};

    #[test]
    fn test_request_json_mode_and_zero_temperature() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![system_message("sys"), user_message("classify this")],
            temperature: Some(0.0),
            max_tokens: Some(256),
            json_mode: true,
        };
        let built = to_sdk_request(&request);
        assert_eq!(built.model, "gpt-4o-mini");
        assert_eq!(built.messages.len(), 2);
        assert!(matches!(built.response_format, Some(ResponseFormat::JsonObject)));
        assert!(built.temperature.is_none());
        assert_eq!(built.max_completion_tokens, Some(256));
    }

    #[test]
    fn test_request_keeps_nonzero_temperature() {
        let mut request = ChatRequest::prompt("m", "hi", 16);
        request.temperature = Some(0.2);
        let built = to_sdk_request(&request);
        assert_eq!(built.temperature, Some(0.2));
        assert!(built.response_format.is_none());
    }

    #[test]
    fn test_message_roles() {
        assert!(matches!(
            ChatCompletionRequestMessage::from(&system_message("s")),
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            ChatCompletionRequestMessage::from(&user_message("u")),
            ChatCompletionRequestMessage::User(_)
        ));
        assert!(matches!(
            ChatCompletionRequestMessage::from(&assistant_message("a")),
            ChatCompletionRequestMessage::Assistant(_)
        ));
    }
}

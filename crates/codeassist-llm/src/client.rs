//! OpenAI-compatible chat completion client.
//!
//! Works with the OpenAI API and any compatible endpoint reachable through a
//! custom API base.

use std::time::{Duration, Instant};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use codeassist_core::{CompletionRequest, RelayError};
use tracing::{debug, info};

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub metrics: LlmMetrics,
}

/// A service that turns a two-message prompt into text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the prompt and returns the first choice's content.
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, RelayError>;
}

/// Converts any error into a RelayError::LlmError.
fn llm_err(e: impl ToString) -> RelayError {
    RelayError::LlmError(e.to_string())
}

/// Builds the system + user message pair.
fn build_messages(
    system_prompt: &str,
    user_input: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, RelayError> {
    Ok(vec![
        ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(llm_err)?,
        ),
        ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(llm_err)?,
        ),
    ])
}

/// Extracts content and metrics from a completion response.
fn extract_response(
    response: CreateChatCompletionResponse,
    elapsed_ms: u64,
) -> Result<LlmResponse, RelayError> {
    let (input_tokens, output_tokens) = response
        .usage
        .as_ref()
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(RelayError::EmptyCompletion)?;

    info!(
        "LLM: {}ms, tokens: {}/{} (in/out)",
        elapsed_ms, input_tokens, output_tokens
    );

    Ok(LlmResponse {
        content,
        metrics: LlmMetrics { input_tokens, output_tokens, elapsed_ms },
    })
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    /// Creates a client for the given credential, model and optional API base URL.
    pub fn new(api_key: &str, model: &str, api_base: Option<&str>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let config = match api_base {
            Some(base) => config.with_api_base(base),
            None => config,
        };

        // Upstream failures surface on the first attempt.
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(config).with_backoff(no_retry),
            model: model.to_string(),
        }
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    #[allow(deprecated)]
    fn build_request(&self, prompt: &CompletionRequest) -> Result<CreateChatCompletionRequest, RelayError> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(&prompt.system, &prompt.user)?)
            .max_tokens(prompt.max_tokens)
            .build()
            .map_err(llm_err)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &CompletionRequest) -> Result<LlmResponse, RelayError> {
        let start = Instant::now();
        let request = self.build_request(prompt)?;
        debug!(model = %self.model, max_tokens = prompt.max_tokens, "Sending chat completion");

        let response = self.client.chat().create(request).await.map_err(llm_err)?;
        extract_response(response, start.elapsed().as_millis() as u64)
    }
}

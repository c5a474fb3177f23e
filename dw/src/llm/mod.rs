//! Text generation port
//!
//! Provider clients behind the `LlmClient` trait plus the `Generator`
//! wrapper the rest of the crate talks to.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, RetryPolicy};
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, StreamChunk, TokenUsage};

use crate::config::{LlmConfig, ResolvedLlmConfig};

/// Channel depth between a streaming client and the drain loop
const STREAM_BUFFER: usize = 64;

/// Create an LLM client based on the provider specified in config
///
/// Supports "anthropic" and "openai" (any OpenAI-compatible endpoint).
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let resolved = config.resolve();

    create_client_from_resolved(&resolved)
}

/// Create an LLM client from a resolved configuration
pub fn create_client_from_resolved(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client_from_resolved: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client_from_resolved: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client_from_resolved: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client_from_resolved: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic, openai",
                other
            )))
        }
    }
}

/// Sampling and delivery settings applied to every generation
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub stream: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: Some(0.7),
            stream: true,
        }
    }
}

impl From<&ResolvedLlmConfig> for GenerationSettings {
    fn from(config: &ResolvedLlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
            stream: config.stream,
        }
    }
}

/// Text-in, text-out facade over an `LlmClient`
///
/// Streamed responses are fully drained before anything is returned, so
/// callers only ever see complete text.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        debug!(?settings, "Generator::new: called");
        Self { client, settings }
    }

    /// Build the configured provider client and wrap it
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let resolved = config.resolve();
        let client = create_client_from_resolved(&resolved)?;
        Ok(Self::new(client, GenerationSettings::from(&resolved)))
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate one completion
    ///
    /// `history` is sent between the system prompt and the user prompt.
    /// Returns the trimmed completion text with any leading reasoning block
    /// removed; an empty completion is an error.
    pub async fn generate(
        &self,
        user_prompt: &str,
        system_prompt: Option<&str>,
        history: &[Message],
    ) -> Result<String, LlmError> {
        debug!(
            user_len = user_prompt.len(),
            has_system = system_prompt.is_some(),
            history_len = history.len(),
            stream = self.settings.stream,
            "generate: called"
        );

        let mut messages = history.to_vec();
        messages.push(Message::user(user_prompt));

        let request = CompletionRequest {
            system_prompt: system_prompt.unwrap_or_default().to_string(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let response = if self.settings.stream {
            self.stream_to_end(request).await?
        } else {
            self.client.complete(request).await?
        };

        debug!(usage = ?response.usage, stop_reason = ?response.stop_reason, "generate: response received");
        if response.stop_reason == StopReason::MaxTokens {
            warn!("generate: completion truncated at max tokens");
        }

        let text = strip_reasoning(response.content.as_deref().unwrap_or_default()).trim();
        if text.is_empty() {
            debug!("generate: empty completion");
            return Err(LlmError::InvalidResponse("empty completion".to_string()));
        }
        Ok(text.to_string())
    }

    async fn stream_to_end(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!("stream_to_end: called");
        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);

        let drain = async move {
            let mut deltas = 0usize;
            while let Some(chunk) = rx.recv().await {
                match chunk {
                    StreamChunk::TextDelta(_) => deltas += 1,
                    StreamChunk::Error(e) => {
                        debug!(error = %e, deltas, "stream_to_end: stream aborted, discarding partial text");
                        deltas = 0;
                    }
                    StreamChunk::MessageStart { input_tokens } => {
                        debug!(input_tokens, "stream_to_end: stream opened");
                    }
                    StreamChunk::MessageDone { .. } => {}
                }
            }
            deltas
        };

        let (result, deltas) = tokio::join!(self.client.stream(request, tx), drain);
        debug!(deltas, ok = result.is_ok(), "stream_to_end: drained");
        result
    }
}

/// Drop a `<think>...</think>` block that reasoning models prepend
pub fn strip_reasoning(text: &str) -> &str {
    match text.rfind("</think>") {
        Some(idx) if text.trim_start().starts_with("<think>") => &text[idx + "</think>".len()..],
        _ => text,
    }
}

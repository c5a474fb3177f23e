//! Anthropic Messages API client
//!
//! The system prompt travels in the top-level `system` field; streamed
//! replies arrive as typed server-sent events.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::client::{RetryPolicy, check_status};
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage};
use crate::config::ResolvedLlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnthropicClient {
    /// Create a new client from resolved configuration
    pub fn from_config(config: &ResolvedLlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// Messages API body; temperature is clamped to 0..=1
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "messages": messages,
        });

        if !request.system_prompt.is_empty() {
            body["system"] = serde_json::json!(request.system_prompt);
        }

        if let Some(temperature) = request.temperature {
            // Anthropic accepts 0.0..=1.0
            body["temperature"] = serde_json::json!(temperature.clamp(0.0, 1.0));
        }

        body
    }

    /// Joined text of every `text` content block
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "parse_response: called");
        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect();

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            stop_reason: StopReason::from_anthropic(&api_response.stop_reason),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }

    fn http_request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.http
            .post(self.url())
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }

    async fn try_complete(&self, body: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
        debug!("try_complete: called");
        let response = self
            .http_request(body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;
        let response = check_status(response).await?;
        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;
        Ok(self.parse_response(api_response))
    }

    async fn try_stream(
        &self,
        body: &serde_json::Value,
        chunk_tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!("try_stream: called");
        // The source is closed on the first error; reconnecting would replay the completion
        let mut es =
            EventSource::new(self.http_request(body)).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let mut full_content = String::new();
        let mut stop_reason = StopReason::EndTurn;
        let mut usage = TokenUsage::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("try_stream: Event::Open");
                }
                Ok(Event::Message(msg)) => {
                    let data: serde_json::Value = serde_json::from_str(&msg.data).map_err(LlmError::Json)?;

                    match data["type"].as_str() {
                        Some("message_start") => {
                            if let Some(u) = data["message"].get("usage") {
                                usage.input_tokens = u["input_tokens"].as_u64().unwrap_or(0);
                                let _ = chunk_tx
                                    .send(StreamChunk::MessageStart {
                                        input_tokens: usage.input_tokens,
                                    })
                                    .await;
                            }
                        }
                        Some("content_block_delta") => {
                            if let Some(text) = data["delta"]["text"].as_str() {
                                full_content.push_str(text);
                                let _ = chunk_tx.send(StreamChunk::TextDelta(text.to_string())).await;
                            }
                        }
                        Some("message_delta") => {
                            if let Some(sr) = data["delta"]["stop_reason"].as_str() {
                                stop_reason = StopReason::from_anthropic(sr);
                            }
                            if let Some(u) = data.get("usage") {
                                usage.output_tokens = u["output_tokens"].as_u64().unwrap_or(0);
                            }
                        }
                        Some("message_stop") => {
                            debug!("try_stream: message_stop");
                            break;
                        }
                        Some("error") => {
                            let message = data["error"]["message"].as_str().unwrap_or("unknown").to_string();
                            debug!(%message, "try_stream: error event");
                            es.close();
                            let _ = chunk_tx.send(StreamChunk::Error(message.clone())).await;
                            return Err(LlmError::StreamAborted(message));
                        }
                        _ => {}
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    debug!("try_stream: stream ended");
                    break;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    es.close();
                    debug!(%status, "try_stream: invalid status");
                    return Err(check_status(response).await.err().unwrap_or(LlmError::ApiError {
                        status: status.as_u16(),
                        message: String::new(),
                    }));
                }
                Err(reqwest_eventsource::Error::Transport(e)) => {
                    es.close();
                    debug!(error = %e, "try_stream: transport error");
                    let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                    return Err(if e.is_timeout() {
                        LlmError::Timeout(self.timeout)
                    } else {
                        LlmError::StreamAborted(e.to_string())
                    });
                }
                Err(e) => {
                    es.close();
                    debug!(%e, "try_stream: event error");
                    let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                    return Err(LlmError::InvalidResponse(e.to_string()));
                }
            }
        }

        es.close();
        let _ = chunk_tx
            .send(StreamChunk::MessageDone {
                stop_reason: stop_reason.clone(),
                usage: usage.clone(),
            })
            .await;

        Ok(CompletionResponse {
            content: if full_content.is_empty() { None } else { Some(full_content) },
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let body = self.build_request_body(&request);
        self.retry.run("complete", || self.try_complete(&body)).await
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "stream: called");
        let mut body = self.build_request_body(&request);
        body["stream"] = serde_json::json!(true);
        self.retry.run("stream", || self.try_stream(&body, &chunk_tx)).await
    }
}


#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: String,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

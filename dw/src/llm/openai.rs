//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint that speaks the `/v1/chat/completions`
//! protocol (OpenAI, SiliconFlow, vLLM, Ollama). Supports both blocking and
//! streaming responses.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::client::{RetryPolicy, check_status};
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage};
use crate::config::ResolvedLlmConfig;

/// OpenAI-compatible API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAIClient {
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
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Build the request body for the chat completions API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": request.system_prompt,
            }));
        }
        messages.extend(request.messages.iter().map(|m| {
            serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })
        }));

        let max_tokens = request.max_tokens.min(self.max_tokens);

        // GPT-5.x and o1/o3 models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }

    /// Parse a buffered API response
    fn parse_response(&self, api_response: OpenAIResponse) -> CompletionResponse {
        debug!(choices = api_response.choices.len(), "parse_response: called");
        let (content, stop_reason) = match api_response.choices.into_iter().next() {
            Some(c) => (
                c.message.content,
                c.finish_reason
                    .as_deref()
                    .map(StopReason::from_openai)
                    .unwrap_or(StopReason::EndTurn),
            ),
            None => (None, StopReason::EndTurn),
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            stop_reason,
            usage,
        }
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;

        check_status(response).await
    }

    async fn try_complete(&self, body: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
        debug!("try_complete: called");
        let response = self.send(body).await?;
        let api_response: OpenAIResponse = response
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
        let response = self.send(body).await?;

        let mut stream = response.bytes_stream();
        let mut full_content = String::new();
        let mut stop_reason = StopReason::EndTurn;
        let mut usage = TokenUsage::default();
        let mut buffer = String::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    debug!(error = %e, "try_stream: stream aborted");
                    let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                    return Err(LlmError::StreamAborted(e.to_string()));
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE lines
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                let Some(chunk_data) = parse_sse_line(&line) else {
                    continue;
                };

                if let Some(choice) = chunk_data.choices.first() {
                    if let Some(content) = &choice.delta.content {
                        full_content.push_str(content);
                        let _ = chunk_tx.send(StreamChunk::TextDelta(content.clone())).await;
                    }
                    if let Some(reason) = &choice.finish_reason {
                        stop_reason = StopReason::from_openai(reason);
                    }
                }

                if let Some(u) = chunk_data.usage {
                    usage.input_tokens = u.prompt_tokens;
                    usage.output_tokens = u.completion_tokens;
                }
            }
        }

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

/// Parse one server-sent-event line into a stream chunk
///
/// Blank lines, comments, `[DONE]` and undecodable payloads yield None.
fn parse_sse_line(line: &str) -> Option<OpenAIStreamChunk> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return None;
    }
    serde_json::from_str(data).ok()
}

#[async_trait]
impl LlmClient for OpenAIClient {
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

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

// Streaming types

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn client(model: &str, max_tokens: u32) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.siliconflow.cn".to_string(),
            http: Client::new(),
            max_tokens,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::new(0),
        }
    }

    #[test]
    fn test_request_body_carries_system_and_prompt() {
        let client = client("deepseek-ai/DeepSeek-R1", 4096);

        let request = CompletionRequest {
            system_prompt: "You are an editor.".to_string(),
            messages: vec![Message::user("Outline a post about tide pools")],
            max_tokens: 1000,
            temperature: Some(0.7),
        };

        let body = client.build_request_body(&request);

        assert_eq!(body["model"], "deepseek-ai/DeepSeek-R1");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are an editor.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_history_precedes_user_prompt() {
        let client = client("gpt-4o", 4096);
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![
                Message::user("first draft please"),
                Message::assistant("# Draft"),
                Message::user("shorter"),
            ],
            max_tokens: 100,
            temperature: None,
        };

        let body = client.build_request_body(&request);
        let messages = body["messages"].as_array().unwrap();

        // Empty system prompt is omitted
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "shorter");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_request_tokens_capped_by_client() {
        let client = client("gpt-4o", 1000);
        let request = CompletionRequest {
            system_prompt: "Write the draft.".to_string(),
            messages: vec![],
            max_tokens: 5000,
            temperature: None,
        };

        let body = client.build_request_body(&request);
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_reasoning_models_use_completion_tokens() {
        let client = client("o3-mini", 4096);
        let request = CompletionRequest {
            system_prompt: "Write the draft.".to_string(),
            messages: vec![],
            max_tokens: 200,
            temperature: None,
        };

        let body = client.build_request_body(&request);
        assert_eq!(body["max_completion_tokens"], 200);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_sse_line() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));

        assert!(parse_sse_line("data: [DONE]").is_none());
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("data: {not json").is_none());
    }

    #[test]
    fn test_parse_response_without_usage() {
        let client = client("gpt-4o", 4096);
        let api: OpenAIResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"ok"},"finish_reason":"length"}]}"#).unwrap();

        let response = client.parse_response(api);
        assert_eq!(response.content.as_deref(), Some("ok"));
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage, TokenUsage::default());
    }
}

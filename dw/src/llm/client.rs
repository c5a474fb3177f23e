//! LlmClient trait definition and shared transport helpers

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Stateless completion client - each call is independent
///
/// Conversation history, when needed, travels inside the request. The
/// client never remembers anything between calls.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Streaming completion
    ///
    /// Sends chunks to the provided channel as they arrive and returns the
    /// fully drained response. A stream that aborts midway is an error; any
    /// text already sent must be discarded by the receiver.
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;
}

/// Bounded exponential backoff for transient transport failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Delay before the given retry attempt (attempt 1 is the first retry)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        debug!(%label, max_retries = self.max_retries, "RetryPolicy::run: called");
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff(attempt);
                warn!(
                    %label,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "RetryPolicy::run: retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    debug!(%label, attempt, error = %e, "RetryPolicy::run: transient failure");
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!(%label, attempt, error = %e, "RetryPolicy::run: permanent failure");
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

/// Turn a non-success HTTP response into the matching error
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status().as_u16();

    if status == 429 {
        debug!("check_status: rate limited (429)");
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        return Err(LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    if !response.status().is_success() {
        debug!(%status, "check_status: API error");
        let text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError { status, message: text });
    }

    Ok(response)
}

//! Client for the command server

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::default_socket_path;
use super::listener::MAX_MESSAGE_SIZE;
use super::messages::{Request, Response};

/// Default timeout; generation can take minutes
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Sends request envelopes to a running server
#[derive(Debug, Clone)]
pub struct CommandClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for CommandClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check the server is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        match self.send(&Request::new("PING")).await? {
            Response::Success { data } => Ok(data["version"].as_str().unwrap_or_default().to_string()),
            Response::Error { message } => Err(eyre!("Server error: {}", message)),
        }
    }

    /// Send one request and wait for its response
    pub async fn send(&self, request: &Request) -> Result<Response> {
        debug!(socket_path = ?self.socket_path, kind = %request.kind, "CommandClient::send: called");
        let json = serde_json::to_string(request).context("Failed to serialize request")?;
        if json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre!("Message too large: {} bytes", json.len()));
        }

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .with_context(|| format!("Failed to connect to {}", self.socket_path.display()))?;

        stream.write_all(json.as_bytes()).await.context("Failed to write request")?;
        stream.write_all(b"\n").await.context("Failed to write newline")?;
        stream.flush().await.context("Failed to flush stream")?;

        let mut reader = BufReader::new(&mut stream);
        let mut line = String::new();
        let bytes_read = tokio::time::timeout(self.timeout, reader.read_line(&mut line))
            .await
            .context("Read timeout")?
            .context("Failed to read response")?;
        if bytes_read == 0 {
            return Err(eyre!("Server closed the connection without a response"));
        }

        let response: Response = serde_json::from_str(line.trim()).context("Failed to parse server response")?;
        debug!(success = response.is_success(), "CommandClient::send: received response");
        Ok(response)
    }
}

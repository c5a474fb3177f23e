//! Socket listener for the command server
//!
//! Binds the Unix Domain Socket, accepts connections and answers each
//! request line on its own task.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use super::handler::Dispatcher;
use super::messages::Response;

/// Maximum request or response line size
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Create a listener at `socket_path`
///
/// Creates the parent directory and removes a stale socket file left by a
/// previous run.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: creating socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind command socket")?;
    debug!(?socket_path, "create_listener_at: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept connections until `shutdown` resolves
pub async fn serve(listener: UnixListener, dispatcher: Arc<Dispatcher>, shutdown: impl Future<Output = ()>) -> Result<()> {
    tokio::pin!(shutdown);
    info!("serve: accepting connections");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("Failed to accept connection")?;
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        warn!(error = %e, "serve: connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("serve: shutdown requested");
                return Ok(());
            }
        }
    }
}

/// Answer request lines until the peer closes the connection
pub async fn handle_connection(stream: UnixStream, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        // Never buffer more than one byte past the limit
        let bytes_read = (&mut reader)
            .take(MAX_MESSAGE_SIZE as u64 + 1)
            .read_line(&mut line)
            .await
            .context("Failed to read request")?;
        if bytes_read == 0 {
            debug!("handle_connection: peer closed");
            return Ok(());
        }

        if bytes_read > MAX_MESSAGE_SIZE {
            warn!(bytes_read, "handle_connection: message too large, closing connection");
            let response = Response::error(format!("Message too large: more than {} bytes", MAX_MESSAGE_SIZE));
            return write_response(&mut write_half, &response).await;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = dispatcher.dispatch_line(&line).await;
        write_response(&mut write_half, &response).await?;
    }
}

async fn write_response(write_half: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "write_response: failed to serialize response");
            serde_json::to_string(&Response::error("Failed to serialize response"))
                .context("Failed to serialize error response")?
        }
    };
    write_half.write_all(json.as_bytes()).await.context("Failed to write response")?;
    write_half.write_all(b"\n").await.context("Failed to write newline")?;
    write_half.flush().await.context("Failed to flush response")?;
    Ok(())
}

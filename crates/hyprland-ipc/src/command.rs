//! Command socket channel
//!
//! Every request opens its own connection: the request is written, the write
//! half is shut down, and the reply is read until Hyprland closes the socket.
//! There is no length prefix; end-of-stream is the terminator.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use super::{CommandRequest, HyprError};

/// Request/response channel to Hyprland's command socket
///
/// Holds no connection between calls, so a shared reference can issue
/// overlapping requests from several tasks.
///
/// # Example
///
/// ```ignore
/// let channel = CommandChannel::new(paths.command_socket());
/// let reply = channel.send(&CommandRequest::new("version").flag("-j")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CommandChannel {
    socket_path: PathBuf,
    timeout: Option<Duration>,
}

impl CommandChannel {
    /// Create a channel without a deadline
    ///
    /// `send` will wait for as long as Hyprland keeps the connection open.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: None,
        }
    }

    /// Bound every `send` call by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send one request and return the full text reply
    ///
    /// # Errors
    ///
    /// Returns `HyprError::InvalidRequest` if the request cannot be encoded.
    /// Returns `HyprError::Connection` if the socket is missing or refuses.
    /// Returns `HyprError::Protocol` if the peer hangs up mid-write or the reply is not UTF-8.
    /// Returns `HyprError::Timeout` if the configured deadline elapses.
    pub async fn send(&self, request: &CommandRequest) -> Result<String, HyprError> {
        let message = request.encode()?;
        self.send_raw(&message).await
    }

    /// Send a pre-encoded message, e.g. from `CommandRequest::batch`
    pub async fn send_raw(&self, message: &str) -> Result<String, HyprError> {
        debug!(path = %self.socket_path.display(), request = message, "Sending Hyprland command");

        match self.timeout {
            Some(after) => tokio::time::timeout(after, self.exchange(message))
                .await
                .map_err(|_| HyprError::Timeout { after })?,
            None => self.exchange(message).await,
        }
    }

    async fn exchange(&self, message: &str) -> Result<String, HyprError> {
        // The stream is dropped on every return path, closing the connection.
        let mut socket = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| HyprError::Connection {
                path: self.socket_path.clone(),
                source: e,
            })?;

        socket
            .write_all(message.as_bytes())
            .await
            .map_err(write_error)?;
        socket.shutdown().await.map_err(write_error)?;

        let mut response = Vec::new();
        socket
            .read_to_end(&mut response)
            .await
            .map_err(HyprError::Receive)?;

        String::from_utf8(response).map_err(|e| HyprError::Protocol {
            message: format!("response is not valid UTF-8: {}", e),
        })
    }
}

fn write_error(err: std::io::Error) -> HyprError {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => HyprError::Protocol {
            message: format!("connection closed while sending request: {}", err),
        },
        _ => HyprError::Send(err),
    }
}

//! Event socket channel
//!
//! Hyprland pushes `\n`-terminated event lines on its second socket for as
//! long as the client stays connected. This module only moves bytes; framing
//! and decoding live in the dispatcher.
//!
//! Lifecycle: `open` -> (`wait`, `read`)* -> `close`, from one consumer at a time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::net::UnixStream;
use tracing::debug;

use super::HyprError;

/// Size of each non-blocking read
const READ_CHUNK_SIZE: usize = 4096;

/// Persistent connection to Hyprland's event socket
#[derive(Debug)]
pub struct EventChannel {
    socket_path: PathBuf,
    stream: Option<UnixStream>,
}

impl EventChannel {
    /// Create a closed channel for `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            stream: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect to the event socket
    ///
    /// Opening an already open channel keeps the existing connection.
    ///
    /// # Errors
    ///
    /// Returns `HyprError::Connection` if the socket is missing or refuses.
    pub async fn open(&mut self) -> Result<(), HyprError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| HyprError::Connection {
                path: self.socket_path.clone(),
                source: e,
            })?;

        debug!(path = %self.socket_path.display(), "Hyprland event socket connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Suspend until the socket is readable or the peer hung up
    ///
    /// Does not consume anything; a hang-up is reported by the following `read`.
    ///
    /// # Errors
    ///
    /// Returns `HyprError::ChannelClosed` if the channel is not open.
    /// Returns `HyprError::Receive` if polling the socket fails.
    pub async fn wait(&self) -> Result<(), HyprError> {
        let stream = self.stream.as_ref().ok_or(HyprError::ChannelClosed)?;
        stream.readable().await.map_err(HyprError::Receive)
    }

    /// Drain whatever bytes are available right now
    ///
    /// Never blocks. Returns an empty buffer on a spurious wake-up. The
    /// result may end in the middle of a line.
    ///
    /// # Errors
    ///
    /// Returns `HyprError::ChannelClosed` if the peer closed the connection
    /// and nothing was left to read, or if the channel is not open.
    /// Returns `HyprError::Receive` on any other socket error.
    pub fn read(&mut self) -> Result<Vec<u8>, HyprError> {
        let stream = self.stream.as_ref().ok_or(HyprError::ChannelClosed)?;

        let mut data = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => {
                    if data.is_empty() {
                        debug!("Hyprland event socket reached end of stream");
                        return Err(HyprError::ChannelClosed);
                    }
                    // Hand over what we have; the next read reports the hang-up.
                    break;
                }
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
                    ) =>
                {
                    debug!(error = %e, "Hyprland event socket reset");
                    return Err(HyprError::ChannelClosed);
                }
                Err(e) => return Err(HyprError::Receive(e)),
            }
        }

        Ok(data)
    }

    /// Release the connection
    ///
    /// Idempotent. Returns `true` only for the call that actually closed it.
    pub fn close(&mut self) -> bool {
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                debug!(path = %self.socket_path.display(), "Hyprland event socket closed");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    fn bind(temp_dir: &TempDir) -> (PathBuf, UnixListener) {
        let socket_path = temp_dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        (socket_path, listener)
    }

    #[tokio::test]
    async fn test_open_missing_socket_is_connection_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut channel = EventChannel::new(temp_dir.path().join("missing.sock"));

        let err = channel.open().await.unwrap_err();
        assert!(
            matches!(err, HyprError::Connection { .. }),
            "Expected Connection error, got: {:?}",
            err
        );
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_wait_then_read_returns_available_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let (socket_path, listener) = bind(&temp_dir);

        let mut channel = EventChannel::new(&socket_path);
        channel.open().await.unwrap();
        let (mut peer, _addr) = listener.accept().await.unwrap();

        peer.write_all(b"workspace>>2\nopenwin").await.unwrap();

        channel.wait().await.unwrap();
        let mut received = channel.read().unwrap();
        // Both writes may or may not coalesce; drain until everything arrived
        while received.len() < b"workspace>>2\nopenwin".len() {
            channel.wait().await.unwrap();
            received.extend(channel.read().unwrap());
        }

        assert_eq!(received, b"workspace>>2\nopenwin");
    }

    #[tokio::test]
    async fn test_peer_hangup_reports_channel_closed() {
        let temp_dir = TempDir::new().unwrap();
        let (socket_path, listener) = bind(&temp_dir);

        let mut channel = EventChannel::new(&socket_path);
        channel.open().await.unwrap();
        let (peer, _addr) = listener.accept().await.unwrap();
        drop(peer);

        let err = loop {
            channel.wait().await.unwrap();
            match channel.read() {
                Ok(data) => assert!(data.is_empty()),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, HyprError::ChannelClosed));

        // close after a failure is still fine, and only the first call releases
        assert!(channel.close());
        assert!(!channel.close());
    }

    #[tokio::test]
    async fn test_wait_on_closed_channel() {
        let channel = EventChannel::new("/nonexistent/.socket2.sock");
        assert!(matches!(
            channel.wait().await,
            Err(HyprError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_releases_connection() {
        let temp_dir = TempDir::new().unwrap();
        let (socket_path, listener) = bind(&temp_dir);

        let mut channel = EventChannel::new(&socket_path);
        channel.open().await.unwrap();
        let (mut peer, _addr) = listener.accept().await.unwrap();

        assert!(channel.close());
        assert!(!channel.is_open());

        let mut buf = Vec::new();
        let n = peer.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0, "peer should see end of stream after close");
    }
}

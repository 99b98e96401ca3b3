//! Error types for Hyprland IPC operations

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::events::EventKind;

/// Errors that can occur when communicating with the Hyprland compositor
#[derive(Debug, Error)]
pub enum HyprError {
    /// The HYPRLAND_INSTANCE_SIGNATURE environment variable is not set
    #[error("HYPRLAND_INSTANCE_SIGNATURE environment variable not set - is Hyprland running?")]
    SignatureNotSet,

    /// An instance signature was supplied but is empty
    #[error("Hyprland instance signature must not be empty")]
    EmptySignature,

    /// The socket is missing or refused the connection
    #[error("Failed to connect to Hyprland socket at {path}: {source}")]
    Connection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request could not be encoded
    #[error("Invalid command request: {reason}")]
    InvalidRequest { reason: String },

    /// The peer sent something the client cannot accept as a response
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Failed to send the request to Hyprland
    #[error("Failed to send request to Hyprland: {0}")]
    Send(#[source] std::io::Error),

    /// Failed to receive data from Hyprland
    #[error("Failed to receive data from Hyprland: {0}")]
    Receive(#[source] std::io::Error),

    /// The event socket was closed by the peer, or was never opened
    #[error("Hyprland event socket closed")]
    ChannelClosed,

    /// The command did not complete before the configured deadline
    #[error("Hyprland did not answer within {after:?}")]
    Timeout { after: Duration },

    /// `disconnect` was called with an observer that is not registered
    #[error("Observer is not connected to the '{event}' signal")]
    NotConnected { event: EventKind },

    /// An observer returned an error while a signal was being emitted
    #[error("Observer of the '{event}' signal failed: {source}")]
    ObserverFailed {
        event: EventKind,
        #[source]
        source: anyhow::Error,
    },

    /// Failed to deserialize a JSON response
    #[error("Failed to deserialize response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// A dispatcher command was answered with something other than `ok`
    #[error("Hyprland rejected dispatch: {message}")]
    DispatchFailed { message: String },

    /// The watch task panicked or was aborted
    #[error("Event watch task failed: {0}")]
    WatchTask(#[source] tokio::task::JoinError),
}

impl HyprError {
    /// Whether this error means no compositor is reachable under the signature
    pub fn is_connection(&self) -> bool {
        matches!(self, HyprError::Connection { .. })
    }
}

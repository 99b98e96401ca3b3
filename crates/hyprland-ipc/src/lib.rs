//! Client for the Hyprland compositor's IPC sockets
//!
//! Hyprland exposes two Unix sockets per running instance, under
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/`:
//!
//! - `.socket.sock`: one request per connection, reply terminated by the
//!   compositor closing the connection
//! - `.socket2.sock`: a persistent stream of `name>>field,field,...` lines
//!
//! ## Architecture
//!
//! - `CommandChannel`: request/response over the command socket
//! - `EventChannel`: byte transport for the event socket
//! - `Signal` / `SignalRegistry`: per-event observer lists
//! - `EventDispatcher`: watch loop decoding event lines and emitting signals
//! - `Instance`: ties the above together for one signature, plus typed getters
//! - `HyprError`: error types for all of the above

mod command;
mod dispatcher;
mod error;
mod event_channel;
pub mod events;
mod instance;
mod paths;
mod request;
mod signal;
pub mod types;

pub use command::CommandChannel;
pub use dispatcher::{EventDispatcher, LineBuffer, WatchHandle};
pub use error::HyprError;
pub use event_channel::EventChannel;
pub use events::{DecodeError, Event, EventKind, SPECIAL_WORKSPACE_ID};
pub use instance::{Instance, InstanceBuilder};
pub use paths::{InstanceSignature, SocketPaths, SIGNATURE_ENV};
pub use request::{CommandRequest, JSON_FLAG};
pub use signal::{Observer, ObserverHandle, Signal, SignalRegistry, SignalSender};
pub use types::{Monitor, Window, Workspace, WorkspaceRef};

//! Entry point for talking to one Hyprland session
//!
//! An [`Instance`] ties together the command channel, the signal registry
//! and the event watch loop for a single instance signature.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::dispatcher::{EventDispatcher, WatchHandle};
use super::signal::SignalRegistry;
use super::types::{parse_address, Monitor, Window, Workspace};
use super::{
    CommandChannel, CommandRequest, EventChannel, HyprError, InstanceSignature, SocketPaths,
    JSON_FLAG,
};

/// Reply Hyprland sends for a successful dispatcher call
const DISPATCH_OK: &str = "ok";

/// A running Hyprland session
///
/// Cheap to clone; clones share the signal registry.
///
/// # Example
///
/// ```ignore
/// let instance = Instance::from_env()?;
/// instance.signals().signal(EventKind::OpenWindow).connect_fn(|_, event| {
///     println!("{:?}", event);
///     Ok(())
/// });
/// let watch = instance.watch();
/// let windows = instance.get_windows().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Instance {
    signature: InstanceSignature,
    paths: SocketPaths,
    command: CommandChannel,
    signals: Arc<SignalRegistry>,
}

/// Options for building an [`Instance`]
#[derive(Debug, Clone)]
pub struct InstanceBuilder {
    signature: InstanceSignature,
    runtime_dir: Option<PathBuf>,
    socket_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl InstanceBuilder {
    /// Look for `hypr/<signature>/` under `dir` instead of the default runtime dir
    pub fn runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    /// Use `dir` as the socket directory directly
    pub fn socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = Some(dir.into());
        self
    }

    /// Deadline for every command; `None` waits indefinitely
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Instance {
        let paths = match self.socket_dir {
            Some(dir) => SocketPaths::in_dir(dir),
            None => SocketPaths::resolve(&self.signature, self.runtime_dir.as_deref()),
        };
        debug!(
            signature = %self.signature,
            dir = %paths.dir().display(),
            "Hyprland instance sockets"
        );

        let command = CommandChannel::new(paths.command_socket()).with_timeout(self.timeout);
        let signals = Arc::new(SignalRegistry::new(self.signature.clone()));

        Instance {
            signature: self.signature,
            paths,
            command,
            signals,
        }
    }
}

impl Instance {
    /// Address the instance with default socket paths and no command timeout
    pub fn new(signature: InstanceSignature) -> Self {
        Self::builder(signature).build()
    }

    /// Address the instance named by `$HYPRLAND_INSTANCE_SIGNATURE`
    ///
    /// # Errors
    ///
    /// Returns `HyprError::SignatureNotSet` if the variable is unset.
    /// Returns `HyprError::EmptySignature` if it is empty.
    pub fn from_env() -> Result<Self, HyprError> {
        Ok(Self::new(InstanceSignature::from_env()?))
    }

    pub fn builder(signature: InstanceSignature) -> InstanceBuilder {
        InstanceBuilder {
            signature,
            runtime_dir: None,
            socket_dir: None,
            timeout: None,
        }
    }

    pub fn signature(&self) -> &InstanceSignature {
        &self.signature
    }

    pub fn socket_paths(&self) -> &SocketPaths {
        &self.paths
    }

    pub fn command_channel(&self) -> &CommandChannel {
        &self.command
    }

    /// Signals for every known event kind
    pub fn signals(&self) -> &Arc<SignalRegistry> {
        &self.signals
    }

    /// Send a request and return the raw reply
    pub async fn send(&self, request: &CommandRequest) -> Result<String, HyprError> {
        self.command.send(request).await
    }

    /// Send several requests in one `[[BATCH]]` message
    pub async fn send_batch(&self, requests: &[CommandRequest]) -> Result<String, HyprError> {
        let message = CommandRequest::batch(requests)?;
        self.command.send_raw(&message).await
    }

    /// Run `command` in JSON mode and deserialize the reply
    ///
    /// # Errors
    ///
    /// Any `send` error, or `HyprError::DeserializeFailed` if the reply does
    /// not match `T`.
    pub async fn query<T: DeserializeOwned>(&self, command: &str) -> Result<T, HyprError> {
        let reply = self
            .send(&CommandRequest::new(command).flag(JSON_FLAG))
            .await?;
        serde_json::from_str(&reply).map_err(HyprError::DeserializeFailed)
    }

    /// Run a dispatcher, e.g. `["workspace", "2"]`
    ///
    /// # Errors
    ///
    /// Returns `HyprError::DispatchFailed` with Hyprland's message if the
    /// reply is anything but `ok`.
    pub async fn dispatch<I>(&self, args: I) -> Result<(), HyprError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let request = CommandRequest::new("dispatch").flag(JSON_FLAG).args(args);
        let reply = self.send(&request).await?;

        let reply = reply.trim();
        if reply == DISPATCH_OK {
            Ok(())
        } else {
            Err(HyprError::DispatchFailed {
                message: reply.to_string(),
            })
        }
    }

    pub async fn get_windows(&self) -> Result<Vec<Window>, HyprError> {
        self.query("clients").await
    }

    /// Find a window by hex address; the `0x` prefix is optional
    ///
    /// # Errors
    ///
    /// Returns `HyprError::InvalidRequest` if `address` is not hexadecimal.
    pub async fn get_window_by_address(&self, address: &str) -> Result<Option<Window>, HyprError> {
        let wanted = parse_address(address).ok_or_else(|| HyprError::InvalidRequest {
            reason: format!("'{}' is not a hexadecimal window address", address),
        })?;

        Ok(self
            .get_windows()
            .await?
            .into_iter()
            .find(|window| window.address_as_int() == Some(wanted)))
    }

    /// The focused window, or `None` if nothing has focus
    pub async fn get_active_window(&self) -> Result<Option<Window>, HyprError> {
        let value: serde_json::Value = self.query("activewindow").await?;
        match value.as_object() {
            Some(object) if object.is_empty() => Ok(None),
            _ => serde_json::from_value(value)
                .map(Some)
                .map_err(HyprError::DeserializeFailed),
        }
    }

    pub async fn get_workspaces(&self) -> Result<Vec<Workspace>, HyprError> {
        self.query("workspaces").await
    }

    pub async fn get_workspace_by_id(&self, id: i64) -> Result<Option<Workspace>, HyprError> {
        Ok(self
            .get_workspaces()
            .await?
            .into_iter()
            .find(|workspace| workspace.id == id))
    }

    pub async fn get_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, HyprError> {
        Ok(self
            .get_workspaces()
            .await?
            .into_iter()
            .find(|workspace| workspace.name == name))
    }

    pub async fn get_active_workspace(&self) -> Result<Workspace, HyprError> {
        self.query("activeworkspace").await
    }

    pub async fn get_monitors(&self) -> Result<Vec<Monitor>, HyprError> {
        self.query("monitors").await
    }

    pub async fn get_monitor_by_id(&self, id: i64) -> Result<Option<Monitor>, HyprError> {
        Ok(self
            .get_monitors()
            .await?
            .into_iter()
            .find(|monitor| monitor.id == id))
    }

    /// Find a monitor by connector name
    ///
    /// # Errors
    ///
    /// Returns `HyprError::InvalidRequest` if `name` is empty.
    pub async fn get_monitor_by_name(&self, name: &str) -> Result<Option<Monitor>, HyprError> {
        if name.is_empty() {
            return Err(HyprError::InvalidRequest {
                reason: "monitor name must not be empty".to_string(),
            });
        }

        Ok(self
            .get_monitors()
            .await?
            .into_iter()
            .find(|monitor| monitor.name == name))
    }

    /// Start emitting events on this instance's signals
    ///
    /// Each call opens its own event connection; two running watches deliver
    /// every event twice.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn watch(&self) -> WatchHandle {
        let channel = EventChannel::new(self.paths.event_socket());
        EventDispatcher::new(channel, Arc::clone(&self.signals)).spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use crate::paths::tests::ENV_MUTEX;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;
    use tokio::task::JoinHandle;

    /// Answer every command connection from a fixed request -> reply table
    fn spawn_fake_compositor(
        dir: &TempDir,
        replies: HashMap<&'static str, &'static str>,
    ) -> JoinHandle<()> {
        let listener = UnixListener::bind(dir.path().join(".socket.sock")).unwrap();
        let replies = Arc::new(replies);

        tokio::spawn(async move {
            loop {
                let (mut stream, _addr) = listener.accept().await.unwrap();
                let replies = Arc::clone(&replies);
                tokio::spawn(async move {
                    let mut request = String::new();
                    stream.read_to_string(&mut request).await.unwrap();
                    let reply = replies.get(request.as_str()).copied().unwrap_or("unknown request");
                    stream.write_all(reply.as_bytes()).await.unwrap();
                });
            }
        })
    }

    fn instance(dir: &TempDir) -> Instance {
        Instance::builder(InstanceSignature::new("test-sig").unwrap())
            .socket_dir(dir.path())
            .timeout(Some(Duration::from_secs(5)))
            .build()
    }

    const CLIENTS: &str = r#"[
        {"address": "0x5a1", "class": "kitty", "title": "shell",
         "workspace": {"id": 1, "name": "1"}},
        {"address": "0x5b2", "class": "firefox", "title": "Mozilla Firefox",
         "workspace": {"id": 2, "name": "2"}}
    ]"#;

    const WORKSPACES: &str = r#"[
        {"id": 1, "name": "1", "monitor": "DP-1", "windows": 1},
        {"id": -99, "name": "special", "monitor": "DP-1", "windows": 0}
    ]"#;

    const MONITORS: &str = r#"[
        {"id": 0, "name": "DP-1", "width": 2560, "height": 1440,
         "activeWorkspace": {"id": 1, "name": "1"}},
        {"id": 1, "name": "HDMI-A-1", "width": 1920, "height": 1080,
         "activeWorkspace": {"id": 3, "name": "3"}}
    ]"#;

    #[test]
    fn test_from_env_without_signature_fails_fast() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::var(crate::SIGNATURE_ENV).ok();
        std::env::remove_var(crate::SIGNATURE_ENV);

        let result = Instance::from_env();

        if let Some(val) = original {
            std::env::set_var(crate::SIGNATURE_ENV, val);
        }

        assert!(matches!(result, Err(HyprError::SignatureNotSet)));
    }

    #[test]
    fn test_builder_socket_paths() {
        let temp_dir = TempDir::new().unwrap();
        let signature = InstanceSignature::new("sig").unwrap();

        let instance = Instance::builder(signature)
            .runtime_dir(temp_dir.path())
            .build();

        assert_eq!(
            instance.command_channel().socket_path(),
            temp_dir.path().join("hypr/sig/.socket.sock")
        );
        assert_eq!(instance.command_channel().timeout(), None);
        assert_eq!(instance.signals().instance().as_str(), "sig");
    }

    #[tokio::test]
    async fn test_window_getters() {
        let temp_dir = TempDir::new().unwrap();
        let server = spawn_fake_compositor(&temp_dir, HashMap::from([("j/clients", CLIENTS)]));
        let instance = instance(&temp_dir);

        let windows = instance.get_windows().await.unwrap();
        assert_eq!(windows.len(), 2);

        let firefox = instance.get_window_by_address("5b2").await.unwrap().unwrap();
        assert_eq!(firefox.wm_class, "firefox");
        assert!(instance.get_window_by_address("0xdead").await.unwrap().is_none());

        let err = instance.get_window_by_address("zzz").await.unwrap_err();
        assert!(matches!(err, HyprError::InvalidRequest { .. }));

        server.abort();
    }

    #[tokio::test]
    async fn test_active_window_none_when_unfocused() {
        let temp_dir = TempDir::new().unwrap();
        let server = spawn_fake_compositor(&temp_dir, HashMap::from([("j/activewindow", "{}")]));

        assert_eq!(instance(&temp_dir).get_active_window().await.unwrap(), None);
        server.abort();
    }

    #[tokio::test]
    async fn test_workspace_and_monitor_getters() {
        let temp_dir = TempDir::new().unwrap();
        let server = spawn_fake_compositor(
            &temp_dir,
            HashMap::from([
                ("j/workspaces", WORKSPACES),
                ("j/monitors", MONITORS),
                ("j/activeworkspace", r#"{"id": 1, "name": "1"}"#),
            ]),
        );
        let instance = instance(&temp_dir);

        let special = instance.get_workspace_by_id(-99).await.unwrap().unwrap();
        assert_eq!(special.name, "special");
        assert!(instance.get_workspace_by_name("7").await.unwrap().is_none());
        assert_eq!(instance.get_active_workspace().await.unwrap().id, 1);

        let hdmi = instance.get_monitor_by_name("HDMI-A-1").await.unwrap().unwrap();
        assert_eq!(hdmi.active_workspace.id, 3);
        assert_eq!(instance.get_monitor_by_id(0).await.unwrap().unwrap().name, "DP-1");
        assert!(matches!(
            instance.get_monitor_by_name("").await,
            Err(HyprError::InvalidRequest { .. })
        ));

        server.abort();
    }

    #[tokio::test]
    async fn test_dispatch_reports_rejection() {
        let temp_dir = TempDir::new().unwrap();
        let server = spawn_fake_compositor(
            &temp_dir,
            HashMap::from([
                ("j/dispatch workspace 2", "ok"),
                ("j/dispatch nosuchthing", "Invalid dispatcher"),
            ]),
        );
        let instance = instance(&temp_dir);

        instance.dispatch(["workspace", "2"]).await.unwrap();

        match instance.dispatch(["nosuchthing"]).await {
            Err(HyprError::DispatchFailed { message }) => assert_eq!(message, "Invalid dispatcher"),
            other => panic!("Expected DispatchFailed, got: {:?}", other),
        }

        server.abort();
    }

    #[tokio::test]
    async fn test_query_with_bad_json() {
        let temp_dir = TempDir::new().unwrap();
        let server = spawn_fake_compositor(&temp_dir, HashMap::from([("j/clients", "not json")]));

        let err = instance(&temp_dir).get_windows().await.unwrap_err();
        assert!(matches!(err, HyprError::DeserializeFailed(_)));
        server.abort();
    }

    #[tokio::test]
    async fn test_send_batch() {
        let temp_dir = TempDir::new().unwrap();
        let server = spawn_fake_compositor(
            &temp_dir,
            HashMap::from([("[[BATCH]]dispatch workspace 1;dispatch workspace 2", "okok")]),
        );

        let reply = instance(&temp_dir)
            .send_batch(&[
                CommandRequest::new("dispatch").args(["workspace", "1"]),
                CommandRequest::new("dispatch").args(["workspace", "2"]),
            ])
            .await
            .unwrap();
        assert_eq!(reply, "okok");
        server.abort();
    }

    #[tokio::test]
    async fn test_no_compositor_fails_immediately() {
        let temp_dir = TempDir::new().unwrap();

        let err = instance(&temp_dir).get_monitors().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    #[should_panic]
    fn test_watch_outside_runtime_panics() {
        let temp_dir = TempDir::new().unwrap();
        let _watch = instance(&temp_dir).watch();
    }

    #[tokio::test]
    async fn test_watch_emits_on_instance_signals() {
        use tokio_stream::StreamExt;

        let temp_dir = TempDir::new().unwrap();
        let listener = UnixListener::bind(temp_dir.path().join(".socket2.sock")).unwrap();
        let instance = instance(&temp_dir);

        let mut events = instance.signals().signal(EventKind::WorkspaceV2).subscribe();
        let watch = instance.watch();

        let (mut peer, _addr) = listener.accept().await.unwrap();
        peer.write_all(b"workspacev2>>4,web\n").await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            Event::WorkspaceV2 {
                workspace_id: 4,
                workspace_name: "web".to_string(),
            }
        );

        watch.shutdown().await.unwrap();
    }
}

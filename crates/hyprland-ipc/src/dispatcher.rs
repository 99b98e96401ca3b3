//! Event watch loop
//!
//! The dispatcher owns the event channel and turns its byte stream into
//! signal emissions:
//!
//! ```text
//! open -> wait -> read -> split lines -> route by kind -> decode -> emit
//!           ^_____________________________________________________|
//! ```
//!
//! Bytes after the last `\n` of a read are kept and prefixed to the next
//! read, so events split across reads are still delivered.
//!
//! Malformed lines and failing observers are logged and skipped. Only
//! transport failures end the loop. The channel is closed exactly once on
//! every exit path.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::events::{DecodeError, Event, EventName, RawEvent};
use super::signal::SignalRegistry;
use super::{EventChannel, HyprError};

const LINE_TERMINATOR: u8 = b'\n';

/// Longest incomplete line kept between reads
pub const MAX_PENDING_LINE: usize = 64 * 1024;

/// Reassembles `\n`-terminated lines from arbitrarily split reads
///
/// A fragment longer than [`MAX_PENDING_LINE`] is dropped along with the
/// rest of its line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and take out every line that is now complete
    ///
    /// Returned lines do not include the terminator.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);

        let Some(last_terminator) = self.pending.iter().rposition(|b| *b == LINE_TERMINATOR)
        else {
            self.drop_oversized();
            return Vec::new();
        };

        let rest = self.pending.split_off(last_terminator + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        let mut lines = complete[..last_terminator].split(|b| *b == LINE_TERMINATOR);
        if std::mem::take(&mut self.discarding) {
            // tail of a line whose head was already dropped
            lines.next();
        }
        let lines = lines.map(<[u8]>::to_vec).collect();

        self.drop_oversized();
        lines
    }

    fn drop_oversized(&mut self) {
        if self.pending.len() > MAX_PENDING_LINE {
            debug!(
                bytes = self.pending.len(),
                "Dropping oversized event line fragment"
            );
            self.pending.clear();
            self.discarding = true;
        }
    }

    /// Bytes of the incomplete trailing line, if any
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }
}

/// Drives one event channel into a signal registry
///
/// # Example
///
/// ```ignore
/// let dispatcher = EventDispatcher::new(EventChannel::new(paths.event_socket()), signals);
/// let handle = dispatcher.spawn();
/// // ...
/// handle.stop();
/// handle.join().await?;
/// ```
#[derive(Debug)]
pub struct EventDispatcher {
    channel: EventChannel,
    signals: Arc<SignalRegistry>,
    buffer: LineBuffer,
}

impl EventDispatcher {
    pub fn new(channel: EventChannel, signals: Arc<SignalRegistry>) -> Self {
        Self {
            channel,
            signals,
            buffer: LineBuffer::new(),
        }
    }

    pub fn signals(&self) -> &Arc<SignalRegistry> {
        &self.signals
    }

    /// Route one complete event line
    ///
    /// Returns `true` if the line reached a signal with observers. Unknown
    /// event names, lines nobody listens to, and malformed payloads return
    /// `false`.
    pub fn dispatch_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }

        let raw = match RawEvent::parse(line) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Skipping malformed event line");
                return false;
            }
        };

        let kind = match raw.name {
            EventName::Known(kind) => kind,
            EventName::Unknown(name) => {
                trace!(event = name, "Ignoring unknown event");
                return false;
            }
        };

        let signal = self.signals.signal(kind);
        if !signal.has_observers() {
            return false;
        }

        let event = match Event::decode(kind, raw.payload) {
            Ok(event) => event,
            Err(e) => {
                debug!(event = %kind, payload = raw.payload, error = %e, "Skipping undecodable event");
                return false;
            }
        };

        if let Err(e) = signal.emit(&event) {
            warn!(event = %kind, error = %e, "Event observer failed");
        }
        true
    }

    /// Feed raw bytes from the channel and dispatch every completed line
    ///
    /// Returns the number of lines that reached a signal with observers.
    pub fn dispatch_bytes(&mut self, bytes: &[u8]) -> usize {
        let lines = self.buffer.feed(bytes);

        let mut delivered = 0;
        for line in lines {
            match std::str::from_utf8(&line) {
                Ok(line) => {
                    if self.dispatch_line(line) {
                        delivered += 1;
                    }
                }
                Err(_) => debug!(error = %DecodeError::InvalidUtf8, "Skipping event line"),
            }
        }
        delivered
    }

    /// Run until `stop` turns `true`, its sender is dropped, or the channel fails
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the loop, typically
    /// `HyprError::Connection` from opening or `HyprError::ChannelClosed`
    /// when Hyprland goes away. Cancellation returns `Ok(())`.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Result<(), HyprError> {
        let result = self.pump(&mut stop).await;

        if !self.buffer.pending().is_empty() {
            debug!(
                bytes = self.buffer.pending().len(),
                "Discarding incomplete event line"
            );
            self.buffer.clear();
        }
        self.channel.close();

        match &result {
            Ok(()) => info!("Stopped watching Hyprland events"),
            Err(e) => warn!(error = %e, "Hyprland event watch ended"),
        }
        result
    }

    async fn pump(&mut self, stop: &mut watch::Receiver<bool>) -> Result<(), HyprError> {
        if *stop.borrow() {
            return Ok(());
        }

        self.channel.open().await?;
        info!(path = %self.channel.socket_path().display(), "Watching Hyprland events");

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return Ok(());
                    }
                    continue;
                }
                ready = self.channel.wait() => ready?,
            }

            let bytes = self.channel.read()?;
            if bytes.is_empty() {
                continue;
            }
            trace!(bytes = bytes.len(), "Read from event socket");
            self.dispatch_bytes(&bytes);
        }
    }

    /// Run the loop on a new tokio task
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> WatchHandle {
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        WatchHandle { stop, task }
    }
}

/// Control over a spawned watch loop
///
/// Dropping the handle also stops the loop.
#[derive(Debug)]
pub struct WatchHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<Result<(), HyprError>>,
}

impl WatchHandle {
    /// Ask the loop to stop at its next wake-up
    pub fn stop(&self) {
        // Fails only when the loop already exited.
        let _ = self.stop.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit and return how it ended
    ///
    /// # Errors
    ///
    /// Returns the loop's transport error, or `HyprError::WatchTask` if the
    /// task panicked or was aborted.
    pub async fn join(self) -> Result<(), HyprError> {
        self.task.await.map_err(HyprError::WatchTask)?
    }

    /// Like `join`, but keeps the handle so it can sit in a `select!`
    ///
    /// Must not be awaited again once it has returned.
    pub async fn finished(&mut self) -> Result<(), HyprError> {
        (&mut self.task).await.map_err(HyprError::WatchTask)?
    }

    /// `stop` followed by `join`
    pub async fn shutdown(self) -> Result<(), HyprError> {
        self.stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::signal::SignalSender;
    use crate::InstanceSignature;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    type Log = Arc<Mutex<Vec<Event>>>;

    fn registry() -> Arc<SignalRegistry> {
        Arc::new(SignalRegistry::new(
            InstanceSignature::new("test-sig").unwrap(),
        ))
    }

    fn record(signals: &SignalRegistry, kind: EventKind) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        signals
            .signal(kind)
            .connect_fn(move |_sender: &SignalSender, event: &Event| {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            });
        log
    }

    fn offline_dispatcher(signals: &Arc<SignalRegistry>) -> EventDispatcher {
        EventDispatcher::new(
            EventChannel::new("/nonexistent/.socket2.sock"),
            Arc::clone(signals),
        )
    }

    #[test]
    fn test_line_buffer_keeps_trailing_fragment() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.feed(b"openwin").is_empty());
        assert_eq!(buffer.pending(), b"openwin");

        let lines = buffer.feed(b"dow>>0x1,1,kitty,t\nwork");
        assert_eq!(lines, vec![b"openwindow>>0x1,1,kitty,t".to_vec()]);
        assert_eq!(buffer.pending(), b"work");

        let lines = buffer.feed(b"space>>2\nurgent>>0x2\n");
        assert_eq!(
            lines,
            vec![b"workspace>>2".to_vec(), b"urgent>>0x2".to_vec()]
        );
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn test_line_buffer_drops_oversized_line() {
        let mut buffer = LineBuffer::new();

        let flood = vec![b'x'; MAX_PENDING_LINE + 1];
        assert!(buffer.feed(&flood).is_empty());
        assert!(buffer.pending().is_empty());

        // the rest of the flooded line goes too
        let lines = buffer.feed(b"xxxx\nurgent>>0x1\nclosewin");
        assert_eq!(lines, vec![b"urgent>>0x1".to_vec()]);
        assert_eq!(buffer.pending(), b"closewin");

        let lines = buffer.feed(b"dow>>0x1\n");
        assert_eq!(lines, vec![b"closewindow>>0x1".to_vec()]);
    }

    #[test]
    fn test_line_buffer_drops_oversized_trailing_fragment() {
        let mut buffer = LineBuffer::new();

        let mut bytes = b"urgent>>0x1\n".to_vec();
        bytes.extend(std::iter::repeat(b'x').take(70 * 1024));
        let lines = buffer.feed(&bytes);
        assert_eq!(lines, vec![b"urgent>>0x1".to_vec()]);
        assert!(buffer.pending().is_empty());

        let lines = buffer.feed(b"x\nurgent>>0x2\n");
        assert_eq!(lines, vec![b"urgent>>0x2".to_vec()]);
    }

    #[test]
    fn test_openwindow_and_createworkspace_are_routed() {
        let signals = registry();
        let windows = record(&signals, EventKind::OpenWindow);
        let workspaces = record(&signals, EventKind::CreateWorkspace);
        let mut dispatcher = offline_dispatcher(&signals);

        let delivered = dispatcher
            .dispatch_bytes(b"openwindow>>0x1234,1,firefox,Mozilla Firefox\ncreateworkspace>>2\n");
        assert_eq!(delivered, 2);

        let windows = windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        match &windows[0] {
            Event::OpenWindow { window_address, .. } => assert_eq!(window_address, "0x1234"),
            other => panic!("Expected OpenWindow, got: {:?}", other),
        }

        let workspaces = workspaces.lock().unwrap();
        assert_eq!(workspaces.len(), 1);
        match &workspaces[0] {
            Event::CreateWorkspace { workspace_id, .. } => assert_eq!(*workspace_id, 2),
            other => panic!("Expected CreateWorkspace, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_emits_nothing() {
        let signals = registry();
        let logs: Vec<Log> = EventKind::ALL
            .iter()
            .map(|kind| record(&signals, *kind))
            .collect();
        let mut dispatcher = offline_dispatcher(&signals);

        assert_eq!(dispatcher.dispatch_bytes(b"futureevent>>x,y\n"), 0);
        assert!(logs.iter().all(|log| log.lock().unwrap().is_empty()));
    }

    #[test]
    fn test_malformed_line_is_skipped_and_loop_continues() {
        let signals = registry();
        let log = record(&signals, EventKind::Workspace);
        let mut dispatcher = offline_dispatcher(&signals);

        let delivered =
            dispatcher.dispatch_bytes(b"no separator here\nworkspace>>notanumber\nworkspace>>3\n");
        assert_eq!(delivered, 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Event::Workspace {
                workspace_id: 3,
                workspace_name: "3".to_string(),
            }]
        );
    }

    #[test]
    fn test_line_without_observers_is_not_delivered() {
        let signals = registry();
        let dispatcher = offline_dispatcher(&signals);

        // Would fail to decode; with nobody listening it is never decoded
        assert!(!dispatcher.dispatch_line("changefloatingmode>>0x1,maybe"));
    }

    #[test]
    fn test_failing_observer_does_not_stop_dispatch() {
        let signals = registry();
        signals
            .signal(EventKind::CloseWindow)
            .connect_fn(|_, _| Err(anyhow::anyhow!("observer exploded")));
        let log = record(&signals, EventKind::Urgent);
        let mut dispatcher = offline_dispatcher(&signals);

        dispatcher.dispatch_bytes(b"closewindow>>0x1\nurgent>>0x2\n");
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let signals = registry();
        let log = record(&signals, EventKind::Urgent);
        let mut dispatcher = offline_dispatcher(&signals);

        let delivered = dispatcher.dispatch_bytes(b"urgent>>\xff\xfe\nurgent>>0x2\n");
        assert_eq!(delivered, 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_delivers_fragmented_events() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let signals = registry();
        let mut events = signals.signal(EventKind::OpenWindow).subscribe();
        let handle = EventDispatcher::new(EventChannel::new(&socket_path), Arc::clone(&signals)).spawn();

        let (mut peer, _addr) = listener.accept().await.unwrap();
        peer.write_all(b"openwindow>>0xab,1,ki").await.unwrap();
        peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        peer.write_all(b"tty,shell\n").await.unwrap();

        use tokio_stream::StreamExt;
        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            Event::OpenWindow {
                window_address: "0xab".to_string(),
                workspace_name: "1".to_string(),
                window_class: "kitty".to_string(),
                window_title: "shell".to_string(),
            }
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_closes_channel() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let handle = EventDispatcher::new(EventChannel::new(&socket_path), registry()).spawn();
        let (mut peer, _addr) = listener.accept().await.unwrap();

        handle.stop();
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap()
            .unwrap();

        let mut rest = Vec::new();
        assert_eq!(peer.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_peer_disconnect_ends_watch_with_channel_closed() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let handle = EventDispatcher::new(EventChannel::new(&socket_path), registry()).spawn();
        let (mut peer, _addr) = listener.accept().await.unwrap();
        peer.write_all(b"workspace>>1\npartial").await.unwrap();
        drop(peer);

        let err = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, HyprError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_watch_without_compositor_fails_to_connect() {
        let temp_dir = TempDir::new().unwrap();
        let channel = EventChannel::new(temp_dir.path().join(".socket2.sock"));

        let err = EventDispatcher::new(channel, registry())
            .spawn()
            .join()
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_stop_before_start_never_connects() {
        let (stop, stop_rx) = watch::channel(true);
        let dispatcher = EventDispatcher::new(EventChannel::new("/nonexistent/.socket2.sock"), registry());

        dispatcher.run(stop_rx).await.unwrap();
        drop(stop);
    }
}

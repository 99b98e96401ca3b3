//! Publish/subscribe signals for compositor events
//!
//! A [`Signal`] holds an ordered list of observers. [`Signal::emit`] calls
//! each of them synchronously, in registration order, on the caller's task.
//! Observers that need to do their work elsewhere should hand the event off
//! (see [`Signal::subscribe`]).
//!
//! ## Consistency under concurrent registration
//!
//! `emit` copies the observer list under a read lock and iterates the copy
//! with the lock released. Observers connected or disconnected while an
//! emission is in flight take effect from the next emission on. This also
//! lets an observer connect or disconnect from inside its own callback.
//!
//! ## Failing observers
//!
//! Observers should not fail. If one returns an error, the remaining
//! observers are skipped for that emission and `emit` returns
//! `HyprError::ObserverFailed`.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::events::{Event, EventKind};
use super::{HyprError, InstanceSignature};

/// Receiver of signal emissions
pub trait Observer: Send + Sync {
    /// Handle one emission
    fn notify(&self, sender: &SignalSender, event: &Event) -> anyhow::Result<()>;

    /// Report that this observer will never accept events again
    ///
    /// Closed observers are dropped from the signal after the emission that
    /// noticed them.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> Observer for F
where
    F: Fn(&SignalSender, &Event) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, sender: &SignalSender, event: &Event) -> anyhow::Result<()> {
        self(sender, event)
    }
}

/// Shared reference to a connected observer
///
/// Identity is by allocation: connecting the same handle twice registers it
/// twice, and `disconnect` removes the first registration.
pub type ObserverHandle = Arc<dyn Observer>;

/// Identifies where an emission came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSender {
    instance: InstanceSignature,
    event: EventKind,
}

impl SignalSender {
    pub fn new(instance: InstanceSignature, event: EventKind) -> Self {
        Self { instance, event }
    }

    /// The compositor instance the event came from
    pub fn instance(&self) -> &InstanceSignature {
        &self.instance
    }

    /// The event kind this signal is bound to
    pub fn event(&self) -> EventKind {
        self.event
    }
}

/// Ordered, duplicate-permitting observer list for one event kind
pub struct Signal {
    sender: SignalSender,
    observers: RwLock<Vec<ObserverHandle>>,
}

impl Signal {
    pub fn new(sender: SignalSender) -> Self {
        Self {
            sender,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn sender(&self) -> &SignalSender {
        &self.sender
    }

    /// Append `observer` to the list
    pub fn connect(&self, observer: ObserverHandle) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Connect a closure and return its handle for a later `disconnect`
    ///
    /// # Example
    ///
    /// ```ignore
    /// let handle = signals.signal(EventKind::OpenWindow).connect_fn(|_sender, event| {
    ///     println!("{:?}", event);
    ///     Ok(())
    /// });
    /// ```
    pub fn connect_fn<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&SignalSender, &Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handle: ObserverHandle = Arc::new(callback);
        self.connect(Arc::clone(&handle));
        handle
    }

    /// Remove the first registration of `observer`
    ///
    /// # Errors
    ///
    /// Returns `HyprError::NotConnected` if `observer` is not registered.
    pub fn disconnect(&self, observer: &ObserverHandle) -> Result<(), HyprError> {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let position = observers
            .iter()
            .position(|candidate| same_observer(candidate, observer))
            .ok_or(HyprError::NotConnected {
                event: self.sender.event,
            })?;

        observers.remove(position);
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether an emission would reach anybody
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Notify every observer, in registration order
    ///
    /// # Errors
    ///
    /// Returns `HyprError::ObserverFailed` from the first failing observer;
    /// observers after it are not called.
    pub fn emit(&self, event: &Event) -> Result<(), HyprError> {
        let snapshot: Vec<ObserverHandle> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for observer in &snapshot {
            observer
                .notify(&self.sender, event)
                .map_err(|source| HyprError::ObserverFailed {
                    event: self.sender.event,
                    source,
                })?;
        }

        if snapshot.iter().any(|observer| observer.is_closed()) {
            self.observers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|observer| !observer.is_closed());
        }

        Ok(())
    }

    /// Receive emissions as a stream on another task
    ///
    /// The forwarding observer is removed on the first emission after the
    /// stream is dropped.
    pub fn subscribe(&self) -> UnboundedReceiverStream<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connect(Arc::new(ForwardingObserver { tx }));
        UnboundedReceiverStream::new(rx)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("sender", &self.sender)
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Compare the allocations behind two handles, ignoring vtables
fn same_observer(a: &ObserverHandle, b: &ObserverHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

struct ForwardingObserver {
    tx: mpsc::UnboundedSender<Event>,
}

impl Observer for ForwardingObserver {
    fn notify(&self, _sender: &SignalSender, event: &Event) -> anyhow::Result<()> {
        // A dropped receiver is not a failure; is_closed() reports it.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One signal per known event kind, owned by an instance
#[derive(Debug)]
pub struct SignalRegistry {
    instance: InstanceSignature,
    // Indexed by `EventKind as usize`, which matches `EventKind::ALL` order.
    signals: Vec<Signal>,
}

impl SignalRegistry {
    pub fn new(instance: InstanceSignature) -> Self {
        let signals = EventKind::ALL
            .iter()
            .map(|kind| Signal::new(SignalSender::new(instance.clone(), *kind)))
            .collect();
        Self { instance, signals }
    }

    pub fn instance(&self) -> &InstanceSignature {
        &self.instance
    }

    /// The signal bound to `kind`
    pub fn signal(&self, kind: EventKind) -> &Signal {
        &self.signals[kind as usize]
    }

    /// Emit `event` on the signal bound to its kind
    pub fn emit(&self, event: &Event) -> Result<(), HyprError> {
        self.signal(event.kind()).emit(event)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }
}

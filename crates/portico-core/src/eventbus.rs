//! Host event bus.
//!
//! The bus has two sides. Registered listeners participate in dispatch: they
//! run in registration order before anyone else sees the event and may veto
//! cancellable events. Broadcast subscribers observe events after dispatch
//! and cannot influence them; slow subscribers may drop events.
//!
//! Listener registrations are keyed by an owner string (the extension
//! identifier), so unregistering a module removes all of its subscriptions
//! in one call.

use std::sync::Arc;

use portico_extension_sdk::{EventFlow, HostEvent, HostEventListener};
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default buffer for broadcast subscribers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct RegisteredListener {
    owner: String,
    listener: Arc<dyn HostEventListener>,
}

/// Event bus shared between the registry and the host.
pub struct HostEventBus {
    tx: broadcast::Sender<HostEvent>,
    listeners: RwLock<Vec<RegisteredListener>>,
}

impl HostEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// The capacity bounds how many events are buffered for slow broadcast
    /// subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Number of live broadcast subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Number of registered listeners.
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Registers a listener under an owner key.
    pub async fn add_listener(
        &self,
        owner: impl Into<String>,
        listener: Arc<dyn HostEventListener>,
    ) {
        self.listeners.write().await.push(RegisteredListener {
            owner: owner.into(),
            listener,
        });
    }

    /// Removes every listener registered under the owner key. Returns how
    /// many were removed.
    pub async fn remove_listeners(&self, owner: &str) -> usize {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|entry| entry.owner != owner);
        before - listeners.len()
    }

    /// Dispatches an event to listeners, then broadcasts it.
    ///
    /// Returns [`EventFlow::Cancel`] when the event is cancellable and at
    /// least one listener vetoed it. The event still reaches broadcast
    /// subscribers either way; they observe attempts, not outcomes.
    pub async fn emit(&self, event: HostEvent) -> EventFlow {
        let snapshot: Vec<Arc<dyn HostEventListener>> = {
            let listeners = self.listeners.read().await;
            listeners.iter().map(|entry| entry.listener.clone()).collect()
        };

        let mut flow = EventFlow::Continue;
        for listener in snapshot {
            if listener.on_host_event(&event).await == EventFlow::Cancel
                && event.is_cancellable()
            {
                flow = EventFlow::Cancel;
            }
        }

        let _ = self.tx.send(event);
        flow
    }

    /// Subscribes to the broadcast side.
    pub fn subscribe(&self) -> HostEventReceiver {
        HostEventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for HostEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for broadcast events.
pub struct HostEventReceiver {
    rx: broadcast::Receiver<HostEvent>,
}

impl HostEventReceiver {
    /// Receives the next event. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<HostEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                // Missed some events; keep receiving from where we are.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receives without blocking, if an event is buffered.
    pub fn try_recv(&mut self) -> Option<HostEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

use council_core::{Event, LogEntry, Snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Fans events out to every registered observer.
///
/// Observer channels are unbounded, so publishing never waits on a slow
/// observer. Closed channels are pruned on the next publish.
pub struct EventBroadcaster {
    observers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<Event>>>,
}

impl EventBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers `event` to every live observer. Never fails.
    pub fn publish(&self, event: Event) {
        let mut observers = self.observers.lock();
        observers.retain(|id, tx| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(observer_id = %id, "Observer gone, dropping");
            }
            delivered
        });
    }

    /// Shorthand for publishing a log event.
    pub fn log(&self, entry: LogEntry) {
        self.publish(Event::Log(entry));
    }

    /// Registers a new observer whose first event is `snapshot`.
    ///
    /// Callers build the snapshot while holding whatever lock orders their
    /// own publishes, so the observer never sees an event older than the
    /// snapshot.
    pub fn subscribe(self: &Arc<Self>, snapshot: Snapshot) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(Event::Snapshot(snapshot));
        self.observers.lock().insert(id, tx);
        info!(observer_id = %id, "Observer subscribed");
        Subscription {
            id,
            rx,
            broadcaster: Arc::downgrade(self),
        }
    }

    /// Removes an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.observers.lock().remove(&id).is_some();
        if removed {
            info!(observer_id = %id, "Observer unsubscribed");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
        }
    }
}

/// A live event stream. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<Event>,
    broadcaster: Weak<EventBroadcaster>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event; `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(self.id);
        }
    }
}

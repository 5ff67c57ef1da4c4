use crate::modes::Provenance;
use crate::value::FlagMap;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// The currently published flag map together with its [`Provenance`].
///
/// Snapshots are immutable: every transition installs a new map wholesale,
/// the map behind an already obtained snapshot never changes.
#[derive(Debug, Clone)]
pub struct ResolvedSnapshot {
    /// The published flag map.
    pub flags: Arc<FlagMap>,
    /// The mechanism that produced this snapshot.
    pub provenance: Provenance,
}

/// Handle identifying a registered snapshot listener.
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription(u64);

type Listener = Box<dyn Fn(&ResolvedSnapshot) + Send + Sync>;

/// Publishes resolved snapshots to any number of subscribed consumers.
///
/// Listeners run synchronously on the publishing thread and must not
/// subscribe or unsubscribe from within their callback.
pub(crate) struct SnapshotHub {
    current: ArcSwap<ResolvedSnapshot>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl SnapshotHub {
    pub fn new(initial: ResolvedSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> ResolvedSnapshot {
        self.current.load().as_ref().clone()
    }

    pub fn publish(&self, flags: FlagMap, provenance: Provenance) {
        let snapshot = ResolvedSnapshot {
            flags: Arc::new(flags),
            provenance,
        };
        self.current.store(Arc::new(snapshot.clone()));
        let listeners = self.listeners.lock().unwrap();
        for (_, listener) in listeners.iter() {
            listener(&snapshot);
        }
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, listener));
        Subscription(id)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != subscription.0);
    }
}

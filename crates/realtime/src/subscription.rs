use log::debug;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// An event delivered to a subscription listener
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// The full current value at the subscribed path (`Null` when absent)
    Snapshot(Value),
    /// Transport or permission failure; the subscription stays registered
    Error(String),
}

pub type Listener = Box<dyn Fn(SnapshotEvent) + Send + Sync>;

/// A source of live snapshots for slash-separated paths.
///
/// `subscribe` emits the value at `path` once the first read completes and
/// again after every change at or below it. The returned [`Subscription`]
/// releases the listener when dropped.
pub trait SnapshotSource: Send + Sync {
    fn subscribe(&self, path: &str, listener: Listener) -> Subscription;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    fn subscribe(&self, path: &str, listener: Listener) -> Subscription {
        (**self).subscribe(path, listener)
    }
}

/// 購読ごとのリスナー登録
pub(crate) struct ListenerSlot {
    id: String,
    path: String,
    active: AtomicBool,
    /// Held for the whole listener call
    gate: Mutex<()>,
    delivering: Mutex<Option<ThreadId>>,
    listener: Listener,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the delivering thread even if the listener panics
struct Delivering<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

impl ListenerSlot {
    pub(crate) fn new(path: &str, listener: Listener) -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.to_string(),
            active: AtomicBool::new(true),
            gate: Mutex::new(()),
            delivering: Mutex::new(None),
            listener,
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Invoke the listener unless the subscription was released.
    pub(crate) fn deliver(&self, event: SnapshotEvent) -> bool {
        let _gate = lock(&self.gate);
        if !self.is_active() {
            return false;
        }
        *lock(&self.delivering) = Some(thread::current().id());
        let _delivering = Delivering(&self.delivering);
        (self.listener)(event);
        true
    }

    /// Stop delivery and wait out a listener call running on another
    /// thread. A listener releasing its own subscription does not wait.
    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        if *lock(&self.delivering) == Some(thread::current().id()) {
            return;
        }
        drop(lock(&self.gate));
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// アクティブな購読を表す
///
/// Dropping the handle deactivates the listener and waits for a callback
/// already running on another thread, so none runs after the drop returns.
pub struct Subscription {
    slot: Arc<ListenerSlot>,
    on_release: Option<ReleaseFn>,
}

impl Subscription {
    pub(crate) fn new<F>(slot: Arc<ListenerSlot>, on_release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            slot,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Subscription identifier
    pub fn id(&self) -> &str {
        self.slot.id()
    }

    /// The subscribed path
    pub fn path(&self) -> &str {
        self.slot.path()
    }

    /// Release the subscription now
    pub fn release(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.slot.id())
            .field("path", &self.slot.path())
            .field("active", &self.slot.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.slot.deactivate();
        if let Some(release) = self.on_release.take() {
            release();
        }
        debug!("Subscription {} on '{}' released", self.slot.id(), self.slot.path());
    }
}

//! Typed consumer state over a live snapshot subscription

use crate::models::Collection;
use dropshop_realtime::{SnapshotEvent, SnapshotSource, Subscription};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// What a view sees of a subscription at one point in time.
///
/// `data` holds the last good snapshot; an error never clears it.
#[derive(Debug)]
pub struct LiveState<T> {
    pub data: Option<Arc<T>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> LiveState<T> {
    /// Borrow the snapshot, if one has arrived
    pub fn get(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

impl<T> Default for LiveState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }
}

impl<T> Clone for LiveState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

type Observer<T> = Box<dyn Fn(&LiveState<T>) + Send + Sync>;

struct Shared<T> {
    state: Mutex<LiveState<T>>,
    observers: Mutex<Vec<Observer<T>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: DeserializeOwned> Shared<T> {
    fn apply(&self, path: &str, event: SnapshotEvent) {
        let snapshot = {
            let mut state = lock(&self.state);
            match event {
                SnapshotEvent::Snapshot(Value::Null) => {
                    state.data = None;
                    state.error = None;
                }
                SnapshotEvent::Snapshot(value) => match serde_json::from_value::<T>(value) {
                    Ok(data) => {
                        state.data = Some(Arc::new(data));
                        state.error = None;
                    }
                    Err(e) => {
                        warn!("Snapshot for '{}' did not match its record shape: {}", path, e);
                        state.error = Some(e.to_string());
                    }
                },
                SnapshotEvent::Error(message) => {
                    warn!("Subscription to '{}' reported an error: {}", path, message);
                    state.error = Some(message);
                }
            }
            state.loading = false;
            state.clone()
        };

        for observer in lock(&self.observers).iter() {
            observer(&snapshot);
        }
    }
}

/// A live, typed view of one database path.
///
/// Dropping it releases the underlying subscription.
pub struct LiveData<T> {
    path: String,
    shared: Arc<Shared<T>>,
    subscription: Subscription,
}

pub type LiveCollection<T> = LiveData<Collection<T>>;

impl<T: DeserializeOwned + Send + Sync + 'static> LiveData<T> {
    /// Subscribe to `path` on `source`
    pub fn subscribe<S: SnapshotSource + ?Sized>(source: &S, path: &str) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LiveState::default()),
            observers: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&shared);
        let owned_path = path.to_string();
        let subscription = source.subscribe(
            path,
            Box::new(move |event| {
                if let Some(shared) = weak.upgrade() {
                    shared.apply(&owned_path, event);
                }
            }),
        );
        debug!("LiveData attached to '{}'", path);

        Self {
            path: path.to_string(),
            shared,
            subscription,
        }
    }
}

impl<T> LiveData<T> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current state
    pub fn state(&self) -> LiveState<T> {
        lock(&self.shared.state).clone()
    }

    /// Latest snapshot
    pub fn data(&self) -> Option<Arc<T>> {
        lock(&self.shared.state).data.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.shared.state).loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.shared.state).error.clone()
    }

    /// Run `observer` after every state change. Observers must not register
    /// further observers on the same `LiveData` from inside the callback.
    pub fn on_change<F>(&self, observer: F)
    where
        F: Fn(&LiveState<T>) + Send + Sync + 'static,
    {
        lock(&self.shared.observers).push(Box::new(observer));
    }

    /// Subscription identifier
    pub fn subscription_id(&self) -> &str {
        self.subscription.id()
    }
}

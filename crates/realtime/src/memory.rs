//! In-memory snapshot store.
//!
//! Holds the whole database as one JSON tree and implements the same
//! subscription contract as the streaming client. Emissions are queued and
//! only delivered by [`MemoryStore::run_pending`], which stands in for the
//! event loop: a write never becomes visible to listeners while the write
//! call is still on the stack.

use crate::error::RealtimeError;
use crate::push_id::PushIdGenerator;
use crate::subscription::{Listener, ListenerSlot, SnapshotEvent, SnapshotSource, Subscription};
use crate::tree;
use log::{debug, trace, warn};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Default)]
struct Inner {
    root: Value,
    subscribers: Vec<Arc<ListenerSlot>>,
    pending: VecDeque<(Arc<ListenerSlot>, SnapshotEvent)>,
    fail_next_write: Option<String>,
    ids: PushIdGenerator,
}

impl Inner {
    /// Queue a fresh snapshot for every subscriber whose path overlaps `written`.
    fn notify(&mut self, written: &[String]) {
        for slot in &self.subscribers {
            let path = tree::split_path(slot.path());
            if tree::paths_overlap(&path, written) {
                let snapshot = tree::get(&self.root, &path);
                self.pending.push_back((slot.clone(), SnapshotEvent::Snapshot(snapshot)));
            }
        }
    }

    fn check_write(&mut self) -> Result<(), RealtimeError> {
        match self.fail_next_write.take() {
            Some(message) => {
                warn!("Rejecting write: {}", message);
                Err(RealtimeError::WriteRejected(message))
            }
            None => Ok(()),
        }
    }
}

/// In-memory implementation of [`SnapshotSource`] with write support
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `root`
    pub fn with_data(root: Value) -> Self {
        let store = Self::new();
        store.lock().root = root;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking listener must not wedge the store for other consumers.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value at `path` without subscribing
    pub fn snapshot(&self, path: &str) -> Value {
        tree::get(&self.lock().root, &tree::split_path(path))
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Number of queued, undelivered events
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Deliver queued events in order, including any queued by listeners
    /// while this runs. Returns the number of listener calls made.
    pub fn run_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.lock().pending.pop_front();
            let Some((slot, event)) = next else {
                break;
            };
            if slot.deliver(event) {
                delivered += 1;
            }
        }
        trace!("Delivered {} queued events", delivered);
        delivered
    }

    /// Make the next write fail with `message`
    pub fn fail_next_write(&self, message: &str) {
        self.lock().fail_next_write = Some(message.to_string());
    }

    /// Queue an error event for every subscriber of exactly `path`
    pub fn emit_error(&self, path: &str, message: &str) {
        let target = tree::split_path(path);
        let mut inner = self.lock();
        let slots: Vec<Arc<ListenerSlot>> = inner
            .subscribers
            .iter()
            .filter(|slot| tree::split_path(slot.path()) == target)
            .cloned()
            .collect();
        for slot in slots {
            inner
                .pending
                .push_back((slot, SnapshotEvent::Error(message.to_string())));
        }
    }

    /// Replace the value at `path`
    pub fn set(&self, path: &str, value: Value) -> Result<(), RealtimeError> {
        let segments = tree::split_path(path);
        let mut inner = self.lock();
        inner.check_write()?;
        tree::set(&mut inner.root, &segments, value);
        inner.notify(&segments);
        debug!("set '{}'", path);
        Ok(())
    }

    /// Append `value` under `path` with a generated key
    pub fn push(&self, path: &str, value: Value) -> Result<String, RealtimeError> {
        let mut segments = tree::split_path(path);
        let mut inner = self.lock();
        inner.check_write()?;
        let id = inner.ids.generate();
        segments.push(id.clone());
        tree::set(&mut inner.root, &segments, value);
        inner.notify(&segments);
        debug!("push '{}' -> {}", path, id);
        Ok(id)
    }

    /// Merge the members of `partial` into the node at `path`
    pub fn update(&self, path: &str, partial: Value) -> Result<(), RealtimeError> {
        let Value::Object(members) = partial else {
            return Err(RealtimeError::WriteRejected(format!(
                "update of '{}' requires an object",
                path
            )));
        };
        let segments = tree::split_path(path);
        let mut inner = self.lock();
        inner.check_write()?;
        tree::merge(&mut inner.root, &segments, members);
        inner.notify(&segments);
        debug!("update '{}'", path);
        Ok(())
    }

    /// Delete the node at `path`
    pub fn remove(&self, path: &str) -> Result<(), RealtimeError> {
        self.set(path, Value::Null)
    }
}

fn release(inner: &Weak<Mutex<Inner>>, id: &str) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    inner.subscribers.retain(|slot| slot.id() != id);
    inner.pending.retain(|(slot, _)| slot.id() != id);
}

impl SnapshotSource for MemoryStore {
    fn subscribe(&self, path: &str, listener: Listener) -> Subscription {
        let slot = ListenerSlot::new(path, listener);
        {
            let mut inner = self.lock();
            let initial = tree::get(&inner.root, &tree::split_path(path));
            inner.subscribers.push(slot.clone());
            inner
                .pending
                .push_back((slot.clone(), SnapshotEvent::Snapshot(initial)));
        }
        debug!("Subscribed to '{}' ({})", path, slot.id());

        let weak = Arc::downgrade(&self.inner);
        let id = slot.id().to_string();
        Subscription::new(slot, move || release(&weak, &id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<SnapshotEvent>>>, Listener) {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        let listener: Listener = Box::new(move |event| sink.lock().unwrap().push(event));
        (events, listener)
    }

    #[test]
    fn test_first_snapshot_is_deferred_until_run() {
        let store = MemoryStore::with_data(json!({ "products": { "p1": { "name": "Lamp" } } }));
        let (events, listener) = recorder();
        let _sub = store.subscribe("products", listener);

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(store.run_pending(), 1);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[SnapshotEvent::Snapshot(json!({ "p1": { "name": "Lamp" } }))]
        );
    }

    #[test]
    fn test_push_emits_exactly_one_snapshot_per_overlapping_subscriber() {
        let store = MemoryStore::new();
        let (banners, banner_listener) = recorder();
        let (products, product_listener) = recorder();
        let _b = store.subscribe("banners", banner_listener);
        let _p = store.subscribe("products", product_listener);
        store.run_pending();

        let id = store.push("banners", json!({ "imageUrl": "x", "isActive": true, "order": 0 })).unwrap();
        assert_eq!(banners.lock().unwrap().len(), 1);

        store.run_pending();
        let banners = banners.lock().unwrap();
        assert_eq!(banners.len(), 2);
        match &banners[1] {
            SnapshotEvent::Snapshot(value) => assert_eq!(value[&id]["imageUrl"], "x"),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(products.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_delivery_after_release() {
        let store = MemoryStore::new();
        let (events, listener) = recorder();
        let sub = store.subscribe("products", listener);
        store.run_pending();

        assert_ok!(store.set("products/p1", json!({ "name": "A" })));
        drop(sub);
        assert_ok!(store.set("products/p2", json!({ "name": "B" })));
        store.run_pending();

        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_failed_write_leaves_tree_and_queue_untouched() {
        let store = MemoryStore::with_data(json!({ "settings": { "siteName": "DropShop" } }));
        let (events, listener) = recorder();
        let _sub = store.subscribe("settings", listener);
        store.run_pending();

        store.fail_next_write("Permission denied");
        let result = store.update("settings", json!({ "siteName": "Other" }));
        assert!(matches!(result, Err(RealtimeError::WriteRejected(_))));
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.snapshot("settings/siteName"), json!("DropShop"));

        store.update("settings", json!({ "siteName": "Other" })).unwrap();
        store.run_pending();
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_emit_error_targets_exact_path() {
        let store = MemoryStore::new();
        let (orders, orders_listener) = recorder();
        let (products, products_listener) = recorder();
        let _o = store.subscribe("orders", orders_listener);
        let _p = store.subscribe("products", products_listener);
        store.run_pending();

        store.emit_error("orders", "permission_denied");
        store.run_pending();

        assert_eq!(
            orders.lock().unwrap().last(),
            Some(&SnapshotEvent::Error("permission_denied".to_string()))
        );
        assert_eq!(products.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_update_requires_object() {
        let store = MemoryStore::new();
        assert_err!(store.update("settings", json!(3)));
    }

    #[test]
    fn test_push_keys_follow_insertion_order() {
        let store = MemoryStore::new();
        let ids: Vec<String> = (0..5)
            .map(|i| store.push("orders", json!({ "quantity": i + 1 })).unwrap())
            .collect();
        let keys: Vec<String> = store
            .snapshot("orders")
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, ids);
    }
}

//! Publish/subscribe registry for change notifications.
//!
//! An [`ObserverHub`] keeps one list-level subscriber list plus one list
//! per entity id. Publishing takes a snapshot of the relevant list under
//! the registry lock, releases the lock, then runs every callback
//! synchronously on the publishing thread. A callback may therefore
//! subscribe, unsubscribe or publish again without deadlocking, and
//! whatever it changes only takes effect from the next publish round.
//!
//! Callbacks carry no payload: subscribers re-read whatever state they
//! display. Running a callback on the right UI thread is the subscriber's
//! business, not the hub's.

use std::collections::BTreeMap;
use std::sync::Arc;

use dispatch_types::{CourierId, OrderId};
use parking_lot::Mutex;
use tracing::trace;

/// A change-notification callback.
///
/// Identity (for unsubscription) is the `Arc` allocation: clone the same
/// `Arc` to unsubscribe what you subscribed.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure as an [`Observer`].
pub fn observer(f: impl Fn() + Send + Sync + 'static) -> Observer {
    Arc::new(f)
}

/// List-level and per-entity subscriber registry.
pub struct ObserverHub<K> {
    /// Name used in trace output.
    name: &'static str,
    /// Subscribers notified when the collection as a whole changes.
    list: Mutex<Vec<Observer>>,
    /// Subscribers notified when one entity changes.
    entities: Mutex<BTreeMap<K, Vec<Observer>>>,
}

impl<K: Ord + Clone + core::fmt::Display> ObserverHub<K> {
    /// Create an empty hub.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            list: Mutex::new(Vec::new()),
            entities: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a list-level subscriber. Registering the same callback
    /// twice makes it run twice per publish.
    pub fn subscribe_list(&self, callback: Observer) {
        self.list.lock().push(callback);
    }

    /// Remove the most recent registration of `callback`. Unknown
    /// callbacks are ignored.
    pub fn unsubscribe_list(&self, callback: &Observer) {
        remove_last(&mut self.list.lock(), callback);
    }

    /// Register a subscriber for one entity.
    pub fn subscribe_entity(&self, id: K, callback: Observer) {
        self.entities.lock().entry(id).or_default().push(callback);
    }

    /// Remove the most recent registration of `callback` for `id`.
    pub fn unsubscribe_entity(&self, id: &K, callback: &Observer) {
        let mut entities = self.entities.lock();
        if let Some(subscribers) = entities.get_mut(id) {
            remove_last(subscribers, callback);
            if subscribers.is_empty() {
                entities.remove(id);
            }
        }
    }

    /// Notify list-level subscribers.
    pub fn publish_list(&self) {
        let snapshot = self.list.lock().clone();
        trace!(hub = self.name, subscribers = snapshot.len(), "Publishing list change");
        run(&snapshot);
    }

    /// Notify the subscribers of one entity.
    pub fn publish_entity(&self, id: &K) {
        let snapshot = self
            .entities
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_default();
        trace!(
            hub = self.name,
            entity = %id,
            subscribers = snapshot.len(),
            "Publishing entity change"
        );
        run(&snapshot);
    }

    /// Number of list-level registrations.
    pub fn list_subscriber_count(&self) -> usize {
        self.list.lock().len()
    }

    /// Number of registrations for one entity.
    pub fn entity_subscriber_count(&self, id: &K) -> usize {
        self.entities.lock().get(id).map_or(0, Vec::len)
    }
}

impl<K> core::fmt::Debug for ObserverHub<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObserverHub")
            .field("name", &self.name)
            .field("list", &self.list.lock().len())
            .field("entities", &self.entities.lock().len())
            .finish()
    }
}

fn remove_last(subscribers: &mut Vec<Observer>, callback: &Observer) {
    if let Some(pos) = subscribers.iter().rposition(|s| Arc::ptr_eq(s, callback)) {
        subscribers.remove(pos);
    }
}

fn run(snapshot: &[Observer]) {
    for callback in snapshot {
        callback();
    }
}

/// Marker key for hubs that only publish list-level changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Global;

impl core::fmt::Display for Global {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("global")
    }
}

/// The hubs owned by the coordinator.
#[derive(Debug)]
pub struct Observers {
    /// Virtual clock changes.
    pub clock: ObserverHub<Global>,
    /// Business configuration changes.
    pub config: ObserverHub<Global>,
    /// Order list and per-order changes.
    pub orders: ObserverHub<OrderId>,
    /// Courier list and per-courier changes.
    pub couriers: ObserverHub<CourierId>,
}

impl Observers {
    /// Create empty hubs.
    pub const fn new() -> Self {
        Self {
            clock: ObserverHub::new("clock"),
            config: ObserverHub::new("config"),
            orders: ObserverHub::new("orders"),
            couriers: ObserverHub::new("couriers"),
        }
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}

// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Per-event-kind handler registries. Registries hold only weak references:
// they never extend a subscription's lifetime, and expired entries are
// pruned lazily on dispatch. Delivery order within a registry follows
// registration order.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, error};

use gneiss_hal::event::{EventKind, GnmiEvent};

use crate::subscription::{EventHandlerRecord, SubscriptionHandle};

#[derive(Default)]
pub struct EventHandlerRegistry {
    handlers: RwLock<Vec<Weak<EventHandlerRecord>>>,
}

impl EventHandlerRegistry {
    /// Append a weak reference to `handle`. Registering the same record
    /// twice is a no-op, so a subtree registration touching many leaves
    /// yields one entry per record.
    pub fn register(&self, handle: &SubscriptionHandle) {
        let weak = Arc::downgrade(handle);
        let mut handlers = self.handlers.write();
        if handlers.iter().any(|w| w.ptr_eq(&weak)) {
            return;
        }
        handlers.push(weak);
    }

    pub fn unregister(&self, handle: &SubscriptionHandle) {
        let weak = Arc::downgrade(handle);
        self.handlers.write().retain(|w| !w.ptr_eq(&weak));
    }

    /// Invoke every live handler with `event`. Handler errors are logged and
    /// swallowed: one bad subscriber must not block the others. Expired
    /// entries found along the way are removed.
    pub async fn dispatch(&self, event: &GnmiEvent) {
        // Snapshot so registration during delivery never deadlocks.
        let snapshot: Vec<Weak<EventHandlerRecord>> =
            self.handlers.read().clone();

        let mut saw_expired = false;
        for weak in &snapshot {
            match weak.upgrade() {
                Some(record) => {
                    if let Err(err) = record.handle(event).await {
                        error!(%err, kind = ?event.kind(), "event handler returned non-OK status");
                    }
                }
                None => saw_expired = true,
            }
        }

        if saw_expired {
            let mut handlers = self.handlers.write();
            handlers.retain(|w| w.strong_count() > 0);
            debug!(
                kind = ?event.kind(),
                remaining = handlers.len(),
                "pruned expired subscriptions"
            );
        }
    }

    pub fn number_of_registered_handlers(&self) -> usize {
        self.handlers.read().len()
    }
}

/// The full registry set, one registry per event variant. Created once at
/// publisher construction and torn down with it.
pub struct EventHandlerRegistries {
    registries: HashMap<EventKind, EventHandlerRegistry>,
}

impl Default for EventHandlerRegistries {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandlerRegistries {
    pub fn new() -> Self {
        let mut registries = HashMap::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            registries.insert(kind, EventHandlerRegistry::default());
        }
        Self { registries }
    }

    pub fn registry(&self, kind: EventKind) -> &EventHandlerRegistry {
        // Every kind is inserted at construction.
        self.registries.get(&kind).expect("registry for every event kind")
    }

    pub fn register(&self, kind: EventKind, handle: &SubscriptionHandle) {
        self.registry(kind).register(handle);
    }

    pub fn unregister(&self, kind: EventKind, handle: &SubscriptionHandle) {
        self.registry(kind).unregister(handle);
    }

    /// Route `event` to the registry of its own variant.
    pub async fn dispatch(&self, event: &GnmiEvent) {
        self.registry(event.kind()).dispatch(event).await;
    }
}

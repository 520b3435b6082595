// SPDX-License-Identifier: MIT OR Apache-2.0

//! Namespace-to-handler routing.
//!
//! Handlers are registered against namespaces (`app::db`, `app::db::Pool`). A record is
//! routed by its call site's namespace: the most specific registered ancestor wins, and a
//! namespace with no registered ancestor falls through to the default [`HandlerGroup`].
//!
//! # Caching
//!
//! Resolved routes are cached per concrete call-site namespace. Any registration change
//! clears the whole cache rather than working out which entries it affects.
//!
//! # Locking
//!
//! Cache hits take only a read lock on the cache. Misses, registrations and removals all
//! go through one mutex, so a route computed from an older registry can never be written
//! into the cache after a newer registration cleared it. No lock is held while a handler
//! runs; callers get a [`Route`] back and dispatch it themselves.

use crate::error::ConfigError;
use crate::handler::{Handler, HandlerGroup, HandlerSlot, Route, SerialLocks};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Arc<HandlerSlot>>>,
    cache: RwLock<HashMap<String, Route>>,
    defaults: Arc<HandlerGroup>,
    locks: SerialLocks,
}

impl HandlerRegistry {
    pub fn new(defaults: Arc<HandlerGroup>) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            defaults,
            locks: SerialLocks::new(),
        }
    }

    pub fn defaults(&self) -> &Arc<HandlerGroup> {
        &self.defaults
    }

    /// A slot for `handler` whose lock is shared with every other slot this registry
    /// made for the same instance, registered or default.
    pub fn slot_for(&self, handler: Arc<dyn Handler>) -> Arc<HandlerSlot> {
        self.locks.slot(handler)
    }

    /// Routes `namespace` and everything below it to `handler`, replacing any handler
    /// already registered for exactly this namespace.
    pub fn register(
        &self,
        namespace: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<Arc<HandlerSlot>, ConfigError> {
        let key = normalize(namespace);
        if key.is_empty() {
            return Err(ConfigError::EmptyNamespace(namespace.to_string()));
        }
        let slot = self.slot_for(handler);
        let mut handlers = self.handlers.lock();
        handlers.insert(key.to_string(), slot.clone());
        self.cache.write().clear();
        Ok(slot)
    }

    /// Removes the handler registered for exactly `namespace`.
    pub fn unregister(&self, namespace: &str) -> Option<Arc<HandlerSlot>> {
        let mut handlers = self.handlers.lock();
        let removed = handlers.remove(normalize(namespace));
        self.cache.write().clear();
        removed
    }

    /// Drops every registration; returns the removed slots.
    pub fn clear(&self) -> Vec<Arc<HandlerSlot>> {
        let mut handlers = self.handlers.lock();
        let removed = handlers.drain().map(|(_, slot)| slot).collect();
        self.cache.write().clear();
        removed
    }

    /// The route for a call site in `namespace`.
    pub fn resolve(&self, namespace: &str) -> Route {
        if let Some(route) = self.cache.read().get(namespace) {
            return route.clone();
        }

        let handlers = self.handlers.lock();
        let route = lookup(&handlers, namespace, &self.defaults);
        self.cache
            .write()
            .insert(namespace.to_string(), route.clone());
        route
    }

    /// Registered namespaces and their slot ids, sorted by namespace.
    pub fn registrations(&self) -> Vec<(String, u64)> {
        let handlers = self.handlers.lock();
        let mut out: Vec<_> = handlers
            .iter()
            .map(|(ns, slot)| (ns.clone(), slot.id()))
            .collect();
        out.sort();
        out
    }

    pub fn cached_routes(&self) -> usize {
        self.cache.read().len()
    }
}

/// Walks from `namespace` towards the root, one `::` segment at a time.
fn lookup(
    handlers: &HashMap<String, Arc<HandlerSlot>>,
    namespace: &str,
    defaults: &Arc<HandlerGroup>,
) -> Route {
    let mut current = normalize(namespace);
    loop {
        if current.is_empty() {
            return Route::Defaults(defaults.clone());
        }
        if let Some(slot) = handlers.get(current) {
            return Route::Slot(slot.clone());
        }
        current = parent(current);
    }
}

fn parent(namespace: &str) -> &str {
    match namespace.rfind("::") {
        Some(idx) => &namespace[..idx],
        None => "",
    }
}

fn normalize(namespace: &str) -> &str {
    namespace.trim().trim_end_matches("::")
}

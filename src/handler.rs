// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::level_filter::LevelFilter;
use crate::log_record::LogRecord;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Weak};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Handler: Debug + Send + Sync {
    /**
        Processes one accepted record.

        Runs on the logging thread. Implementations must not panic and must not report
        failures to the caller; a sink that can fail should be an [`Aspect`](crate::aspect::Aspect).
    */
    fn handle_record(&self, record: &Arc<LogRecord>);

    /**
    Whether the router must hold this handler's lock while calling [`Self::handle_record`].

    Handlers that write to a shared destination want this so lines from different
    threads do not interleave. Aspects return `false`: their queue takes concurrent
    producers and their drain is already single-flight.
    */
    fn requires_serialization(&self) -> bool {
        true
    }

    /**
    The application may imminently exit.  Ensure all buffers are flushed and up to date.
    */
    fn prepare_to_die(&self);
}

static SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// One registration of a handler, together with the lock that serializes calls into it.
///
/// The lock belongs to the handler instance, not the registration: slots built by the
/// same [`SerialLocks`] for the same `Arc` share it.
#[derive(Debug)]
pub struct HandlerSlot {
    id: u64,
    handler: Arc<dyn Handler>,
    serial: Arc<Mutex<()>>,
}

impl HandlerSlot {
    /// A slot with a lock of its own.
    pub fn new(handler: Arc<dyn Handler>) -> Arc<Self> {
        Self::with_serial(handler, Arc::new(Mutex::new(())))
    }

    fn with_serial(handler: Arc<dyn Handler>, serial: Arc<Mutex<()>>) -> Arc<Self> {
        Arc::new(Self {
            id: SLOT_ID.fetch_add(1, Ordering::Relaxed),
            handler,
            serial,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Calls the handler, blocking on this slot's lock if the handler asks for it.
    ///
    /// A panicking handler is contained here so the logging thread carries on.
    pub fn invoke(&self, record: &Arc<LogRecord>) {
        let call = || self.handler.handle_record(record);
        let _ = if self.handler.requires_serialization() {
            let _guard = self.serial.lock();
            catch_unwind(AssertUnwindSafe(call))
        } else {
            catch_unwind(AssertUnwindSafe(call))
        };
    }

    pub fn prepare_to_die(&self) {
        let _guard = self.serial.lock();
        self.handler.prepare_to_die();
    }
}

/// Hands out one serialization lock per handler instance, however many slots it fills.
///
/// Instances are told apart by the address of their `Arc`. An entry lives as long as a
/// slot using it does, and a slot keeps its handler alive, so an address cannot be
/// reused while its entry is live.
#[derive(Debug, Default)]
pub struct SerialLocks {
    locks: Mutex<HashMap<usize, Weak<Mutex<()>>>>,
}

impl SerialLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new slot for `handler`, sharing the lock of every other live slot for it.
    pub fn slot(&self, handler: Arc<dyn Handler>) -> Arc<HandlerSlot> {
        let key = Arc::as_ptr(&handler) as *const () as usize;
        let mut locks = self.locks.lock();
        let serial = match locks.get(&key).and_then(Weak::upgrade) {
            Some(serial) => serial,
            None => {
                locks.retain(|_, lock| lock.strong_count() > 0);
                let serial = Arc::new(Mutex::new(()));
                locks.insert(key, Arc::downgrade(&serial));
                serial
            }
        };
        HandlerSlot::with_serial(handler, serial)
    }
}

/**
The process-wide default handlers.

Resolution ends here for every namespace with no closer registration. Members can be
added and removed at any time (aspects do so on init and shutdown); dispatch works on a
snapshot of the member list, so the group lock is never held while a handler runs.
*/
#[derive(Debug, Default)]
pub struct HandlerGroup {
    members: RwLock<Vec<Arc<HandlerSlot>>>,
}

impl HandlerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, slot: Arc<HandlerSlot>) {
        self.members.write().push(slot);
    }

    /// Removes the member with this slot id. Returns whether one was present.
    pub fn remove(&self, id: u64) -> bool {
        let mut members = self.members.write();
        let before = members.len();
        members.retain(|slot| slot.id() != id);
        members.len() != before
    }

    pub fn snapshot(&self) -> Vec<Arc<HandlerSlot>> {
        self.members.read().clone()
    }

    pub fn clear(&self) -> Vec<Arc<HandlerSlot>> {
        std::mem::take(&mut *self.members.write())
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&self, record: &Arc<LogRecord>) {
        for slot in self.snapshot() {
            slot.invoke(record);
        }
    }
}

/// Forwards records at or above its own minimum to the default handlers.
///
/// Registered for namespaces configured with a stricter level than the router's.
#[derive(Debug)]
pub struct LevelGate {
    filter: LevelFilter,
    next: Arc<HandlerGroup>,
}

impl LevelGate {
    pub fn new(filter: LevelFilter, next: Arc<HandlerGroup>) -> Self {
        Self { filter, next }
    }

    pub fn filter(&self) -> LevelFilter {
        self.filter
    }
}

impl Handler for LevelGate {
    fn handle_record(&self, record: &Arc<LogRecord>) {
        if self.filter.is_level_enabled(record.level()) {
            self.next.dispatch(record);
        }
    }

    // members of `next` serialize themselves
    fn requires_serialization(&self) -> bool {
        false
    }

    fn prepare_to_die(&self) {}
}

/// What a namespace resolves to.
#[derive(Debug, Clone)]
pub enum Route {
    /// A handler registered for a namespace.
    Slot(Arc<HandlerSlot>),
    /// Fell through to the root: the default handlers.
    Defaults(Arc<HandlerGroup>),
}

impl Route {
    pub fn dispatch(&self, record: &Arc<LogRecord>) {
        match self {
            Route::Slot(slot) => slot.invoke(record),
            Route::Defaults(group) => group.dispatch(record),
        }
    }

    /// Slot id for a registered handler, `None` for the defaults.
    pub fn slot_id(&self) -> Option<u64> {
        match self {
            Route::Slot(slot) => Some(slot.id()),
            Route::Defaults(_) => None,
        }
    }
}

/*
Boilerplate notes.

# Handler

I don't think Clone on Handler makes sense, so copy's out.
PartialEq and Eq are possible but it's a little unclear if we mean data equality or some kind of provenance-based thing.  Slots get an id for provenance instead.
Default is not necessarily sensible since who knows how the handler is constructed (does it need a filename to log to, etc.)
Send/Sync is required: handlers are called from every logging thread.
*/

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background batch sinks.
//!
//! An [`Aspect`] turns records into its own log objects and processes them in batches.
//! The [`AspectEngine`] wrapped around it does the plumbing:
//!
//! 1. It registers itself with a [`Router`] as one of the default handlers.
//! 2. For each record it receives, it asks the aspect for a log object
//!    ([`Aspect::create_log_object`]); `None` drops the record.
//! 3. The object goes onto a lock-free multi-producer queue.
//! 4. The calling thread then *tries* to become the drainer. If another thread is already
//!    draining, it returns immediately. Otherwise it takes everything currently queued,
//!    hands it to [`Aspect::process_log_objects`] in FIFO order and lets go.
//!
//! `process_log_objects` therefore never runs concurrently with itself for one engine.
//!
//! # Failure containment
//!
//! A batch that fails (returns an error or panics) increments the engine's error counter.
//! When the counter reaches the configured threshold the engine shuts itself down for
//! good: it leaves the router, runs the aspect's shutdown hook, drops whatever is still
//! queued and emits one FATAL record through the router's remaining handlers.
//!
//! # Stranded objects
//!
//! An object enqueued after the drainer took its snapshot waits for the next log call
//! that wins the drain. [`AspectEngine::flush`] (called by an explicit shutdown and by
//! [`Router::shutdown`]) drains it deterministically.
//!
//! Once the aspect's shutdown hook has run, nothing more is handed to
//! `process_log_objects`; an object that slipped into the queue while the engine was
//! shutting down is discarded by whichever drain finds it.
//!
//! # Re-entrancy
//!
//! Flushing or shutting an engine down from the thread that is currently draining it
//! (from inside `process_log_objects`, say) does not wait for that drain. The flush
//! returns at once and the shutdown skips its final flush.

use crate::Level;
use crate::cause::Cause;
use crate::error::AspectError;
use crate::handler::Handler;
use crate::log_record::{CallSite, LogRecord};
use crate::router::Router;
use crate::template::Arg;
use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Consecutive-or-not batch failures tolerated before an engine disables itself.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// A pluggable batch sink.
pub trait Aspect: Debug + Send + Sync + 'static {
    /// What this aspect queues per record: a rendered line, a trimmed copy, etc.
    type LogObject: Send + 'static;

    fn name(&self) -> &str;

    /// Acquire resources. Called once, before the engine starts receiving records.
    fn init(&self) -> Result<(), AspectError> {
        Ok(())
    }

    /// Converts a record, or returns `None` to drop it.
    ///
    /// This is where an aspect applies a minimum level stricter than the router's.
    fn create_log_object(&self, record: &Arc<LogRecord>) -> Option<Self::LogObject>;

    /// Processes a batch in FIFO order. Never called concurrently for one engine.
    fn process_log_objects(&self, batch: &[Self::LogObject]) -> Result<(), AspectError>;

    /// Release resources. Called once, on explicit or automatic shutdown.
    fn shutdown(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectState {
    Uninitialized,
    Active,
    ShutDown,
}

impl AspectState {
    const fn to_u8(self) -> u8 {
        match self {
            AspectState::Uninitialized => 0,
            AspectState::Active => 1,
            AspectState::ShutDown => 2,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            0 => AspectState::Uninitialized,
            1 => AspectState::Active,
            _ => AspectState::ShutDown,
        }
    }
}

impl Display for AspectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AspectState::Uninitialized => "uninitialized",
            AspectState::Active => "active",
            AspectState::ShutDown => "shut down",
        })
    }
}

/// The type-erased side of an engine that the router needs for its own shutdown.
pub trait AspectControl: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn state(&self) -> AspectState;
    fn error_count(&self) -> u32;
    /// Drains everything queued, waiting for an in-flight drain to finish first.
    fn flush(&self);
    fn shutdown_logging(&self);
}

/// Queue, drain flag and kill-switch around one [`Aspect`].
pub struct AspectEngine<A: Aspect> {
    aspect: A,
    threshold: u32,
    state: AtomicU8,
    queue: SegQueue<A::LogObject>,
    draining: AtomicBool,
    closed: AtomicBool,
    batch: Mutex<Vec<A::LogObject>>,
    errors: AtomicU32,
    lifecycle: Mutex<Attachment>,
}

#[derive(Debug, Default)]
struct Attachment {
    router: Weak<Router>,
    slot_id: Option<u64>,
}

impl<A: Aspect> Debug for AspectEngine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AspectEngine")
            .field("aspect", &self.aspect)
            .field("state", &self.state())
            .field("pending", &self.queue.len())
            .field("errors", &self.errors.load(Ordering::Relaxed))
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl<A: Aspect> AspectEngine<A> {
    /// A new, uninitialized engine. `error_threshold` is clamped to at least 1.
    pub fn new(aspect: A, error_threshold: u32) -> Arc<Self> {
        Arc::new(Self {
            aspect,
            threshold: error_threshold.max(1),
            state: AtomicU8::new(AspectState::Uninitialized.to_u8()),
            queue: SegQueue::new(),
            draining: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            batch: Mutex::new(Vec::new()),
            errors: AtomicU32::new(0),
            lifecycle: Mutex::new(Attachment::default()),
        })
    }

    pub fn aspect(&self) -> &A {
        &self.aspect
    }

    pub fn state(&self) -> AspectState {
        AspectState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Acquire)
    }

    pub fn error_threshold(&self) -> u32 {
        self.threshold
    }

    /// Objects queued but not yet handed to the aspect.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Starts the aspect and attaches it to `router`'s default handlers.
    ///
    /// Calling this on an active engine does nothing. An engine that has been shut down
    /// stays shut down and reports [`AspectError::ShutDown`].
    pub fn init_logging(self: &Arc<Self>, router: &Arc<Router>) -> Result<(), AspectError> {
        let mut attachment = self.lifecycle.lock();
        match self.state() {
            AspectState::Active => return Ok(()),
            AspectState::ShutDown => return Err(AspectError::ShutDown),
            AspectState::Uninitialized => {}
        }
        self.errors.store(0, Ordering::Release);
        self.aspect.init()?;

        let control: Arc<dyn AspectControl> = self.clone();
        let handler: Arc<dyn Handler> = self.clone();
        let slot_id = router.attach_aspect(handler, control);
        attachment.router = Arc::downgrade(router);
        attachment.slot_id = Some(slot_id);
        self.state
            .store(AspectState::Active.to_u8(), Ordering::Release);
        Ok(())
    }

    /// Stops the aspect: detaches from the router, flushes what is queued, then runs the
    /// aspect's shutdown hook. Idempotent.
    pub fn shutdown_logging(&self) {
        if !self.deactivate() {
            return;
        }
        match self.acquire_drain() {
            Some(_drain) => {
                while self.drain_locked() > 0 {}
                self.close();
            }
            // already draining on this thread
            None => self.close(),
        }
    }

    /// Tries to become the drainer and process everything queued right now.
    ///
    /// Returns `false` without waiting if another thread is draining.
    pub fn try_drain(&self) -> bool {
        match self.try_acquire_drain() {
            Some(_drain) => {
                self.drain_locked();
                true
            }
            None => false,
        }
    }

    /// Drains until the queue is empty, waiting out other drainers.
    ///
    /// Returns immediately when called from inside this engine's own drain.
    pub fn flush(&self) {
        if let Some(_drain) = self.acquire_drain() {
            while self.drain_locked() > 0 {}
        }
    }

    fn drain_key(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn draining_on_this_thread(&self) -> bool {
        let key = self.drain_key();
        DRAINING.with(|held| held.borrow().contains(&key))
    }

    fn try_acquire_drain(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        let key = self.drain_key();
        DRAINING.with(|held| held.borrow_mut().push(key));
        Some(DrainGuard {
            flag: &self.draining,
            key,
        })
    }

    /// Waits for the drain flag; `None` if this thread already holds it.
    fn acquire_drain(&self) -> Option<DrainGuard<'_>> {
        if self.draining_on_this_thread() {
            return None;
        }
        loop {
            if let Some(drain) = self.try_acquire_drain() {
                return Some(drain);
            }
            std::thread::yield_now();
        }
    }

    /// Marks the engine closed and runs the aspect's shutdown hook.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.aspect.shutdown();
    }

    /// Runs one batch and returns how many objects it took. Caller must hold the drain
    /// flag. After [`close`](Self::close) the batch is discarded instead.
    fn drain_locked(&self) -> usize {
        if self.closed.load(Ordering::Acquire) {
            let available = self.queue.len();
            return (0..available)
                .take_while(|_| self.queue.pop().is_some())
                .count();
        }
        let (taken, outcome) = {
            let mut batch = self.batch.lock();
            // snapshot: objects arriving from here on wait for the next drain
            let available = self.queue.len();
            for _ in 0..available {
                match self.queue.pop() {
                    Some(object) => batch.push(object),
                    None => break,
                }
            }
            if batch.is_empty() {
                return 0;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.aspect.process_log_objects(&batch)
            }));
            let taken = batch.len();
            batch.clear();
            (taken, outcome)
        };

        let error = match outcome {
            Ok(Ok(())) => return taken,
            Ok(Err(error)) => error,
            Err(panic) => AspectError::Processing(panic_message(panic.as_ref())),
        };
        self.record_failure(error);
        taken
    }

    /// Counts a failed batch and trips the kill-switch at the threshold.
    fn record_failure(&self, error: AspectError) {
        let count = self.errors.fetch_add(1, Ordering::AcqRel) + 1;
        if count < self.threshold || self.state() != AspectState::Active {
            return;
        }
        let router = self.lifecycle.lock().router.upgrade();
        if !self.deactivate() {
            return;
        }
        self.close();
        while self.queue.pop().is_some() {}

        if let Some(router) = router {
            router.log(
                Level::Fatal,
                CallSite::new(module_path!(), file!(), line!()),
                Some(Cause::new(error.to_string()).with_type_name("AspectError")),
                "aspect %s shut down after %d errors processing log objects",
                vec![Arg::from(self.aspect.name()), Arg::from(count)],
            );
        }
    }

    /// Active -> ShutDown, detaching from the router. Returns whether this call did it.
    fn deactivate(&self) -> bool {
        let mut attachment = self.lifecycle.lock();
        if self.state() != AspectState::Active {
            return false;
        }
        self.state
            .store(AspectState::ShutDown.to_u8(), Ordering::Release);
        if let (Some(router), Some(slot_id)) = (attachment.router.upgrade(), attachment.slot_id.take())
        {
            router.detach_aspect(slot_id);
        }
        true
    }
}

thread_local! {
    /// Engines (by address) this thread is draining right now.
    static DRAINING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Holds an engine's drain flag; releases it on drop, also when unwinding.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
    key: usize,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        DRAINING.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|k| *k == self.key) {
                held.remove(pos);
            }
        });
        self.flag.store(false, Ordering::Release);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl<A: Aspect> Handler for AspectEngine<A> {
    fn handle_record(&self, record: &Arc<LogRecord>) {
        if self.state() != AspectState::Active {
            return;
        }
        let Some(object) = self.aspect.create_log_object(record) else {
            return;
        };
        self.queue.push(object);
        self.try_drain();
    }

    // the queue takes concurrent producers and draining is single-flight
    fn requires_serialization(&self) -> bool {
        false
    }

    fn prepare_to_die(&self) {
        self.flush();
    }
}

impl<A: Aspect> AspectControl for AspectEngine<A> {
    fn name(&self) -> &str {
        self.aspect.name()
    }

    fn state(&self) -> AspectState {
        AspectEngine::state(self)
    }

    fn error_count(&self) -> u32 {
        AspectEngine::error_count(self)
    }

    fn flush(&self) {
        AspectEngine::flush(self)
    }

    fn shutdown_logging(&self) {
        AspectEngine::shutdown_logging(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory_handler::InMemoryHandler;
    use crate::level_filter::LevelFilter;
    use std::sync::OnceLock;

    #[derive(Debug, Default)]
    struct Recorder {
        min_level: Option<Level>,
        processed: Mutex<Vec<String>>,
        batches: AtomicU32,
        fail: AtomicBool,
        panic: AtomicBool,
        shutdowns: AtomicU32,
    }

    impl Aspect for Recorder {
        type LogObject = String;

        fn name(&self) -> &str {
            "recorder"
        }

        fn create_log_object(&self, record: &Arc<LogRecord>) -> Option<String> {
            match self.min_level {
                Some(min) if record.level() < min => None,
                _ => Some(record.message().to_string()),
            }
        }

        fn process_log_objects(&self, batch: &[String]) -> Result<(), AspectError> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            if self.panic.load(Ordering::Relaxed) {
                panic!("sink exploded");
            }
            if self.fail.load(Ordering::Relaxed) {
                return Err(AspectError::Processing("disk full".to_string()));
            }
            self.processed.lock().extend(batch.iter().cloned());
            Ok(())
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn log(router: &Router, level: Level, message: &'static str) {
        router.log(
            level,
            CallSite::new("app", file!(), line!()),
            None,
            message,
            vec![],
        );
    }

    #[test]
    fn lifecycle_transitions() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let engine = AspectEngine::new(Recorder::default(), DEFAULT_ERROR_THRESHOLD);
        assert_eq!(engine.state(), AspectState::Uninitialized);

        engine.init_logging(&router).unwrap();
        engine.init_logging(&router).unwrap();
        assert_eq!(engine.state(), AspectState::Active);
        assert_eq!(router.defaults().len(), 1);
        assert_eq!(router.aspects().len(), 1);

        engine.shutdown_logging();
        engine.shutdown_logging();
        assert_eq!(engine.state(), AspectState::ShutDown);
        assert_eq!(engine.aspect().shutdowns.load(Ordering::Relaxed), 1);
        assert!(router.defaults().is_empty());
        assert!(router.aspects().is_empty());

        assert!(matches!(
            engine.init_logging(&router),
            Err(AspectError::ShutDown)
        ));
    }

    #[test]
    fn aspect_filter_drops_records() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Debug));
        let recorder = Recorder {
            min_level: Some(Level::Warn),
            ..Recorder::default()
        };
        let engine = AspectEngine::new(recorder, DEFAULT_ERROR_THRESHOLD);
        engine.init_logging(&router).unwrap();

        log(&router, Level::Debug, "quiet");
        log(&router, Level::Error, "loud");
        assert_eq!(*engine.aspect().processed.lock(), vec!["loud".to_string()]);
    }

    #[test]
    fn repeated_failures_shut_the_aspect_down_once() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let observer = Arc::new(InMemoryHandler::new());
        router.add_default_handler(observer.clone());

        let engine = AspectEngine::new(Recorder::default(), 3);
        engine.aspect().fail.store(true, Ordering::Relaxed);
        engine.init_logging(&router).unwrap();

        for _ in 0..5 {
            log(&router, Level::Info, "doomed");
        }
        assert_eq!(engine.state(), AspectState::ShutDown);
        assert_eq!(engine.error_count(), 3);
        assert_eq!(engine.aspect().batches.load(Ordering::Relaxed), 3);
        assert_eq!(engine.aspect().shutdowns.load(Ordering::Relaxed), 1);
        assert_eq!(engine.pending(), 0);
        assert!(router.aspects().is_empty());

        let fatals: Vec<_> = observer
            .records()
            .into_iter()
            .filter(|r| r.level() == Level::Fatal)
            .collect();
        assert_eq!(fatals.len(), 1);
        assert_eq!(
            fatals[0].message(),
            "aspect recorder shut down after 3 errors processing log objects"
        );
        assert_eq!(fatals[0].cause().map(|c| c.message()), Some("disk full"));
        assert_eq!(observer.len(), 6);
    }

    #[test]
    fn panics_count_as_errors() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let engine = AspectEngine::new(Recorder::default(), DEFAULT_ERROR_THRESHOLD);
        engine.aspect().panic.store(true, Ordering::Relaxed);
        engine.init_logging(&router).unwrap();

        log(&router, Level::Info, "boom");
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.state(), AspectState::Active);

        engine.aspect().panic.store(false, Ordering::Relaxed);
        log(&router, Level::Info, "fine");
        assert_eq!(*engine.aspect().processed.lock(), vec!["fine".to_string()]);
    }

    #[test]
    fn explicit_shutdown_flushes_stranded_objects() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let engine = AspectEngine::new(Recorder::default(), DEFAULT_ERROR_THRESHOLD);
        engine.init_logging(&router).unwrap();

        // pretend another thread holds the drain
        engine.draining.store(true, Ordering::Release);
        log(&router, Level::Info, "one");
        log(&router, Level::Info, "two");
        assert_eq!(engine.pending(), 2);
        assert!(engine.aspect().processed.lock().is_empty());
        engine.draining.store(false, Ordering::Release);

        router.shutdown();
        assert_eq!(engine.state(), AspectState::ShutDown);
        assert_eq!(
            *engine.aspect().processed.lock(),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[test]
    fn nothing_is_processed_after_the_shutdown_hook() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let engine = AspectEngine::new(Recorder::default(), DEFAULT_ERROR_THRESHOLD);
        engine.init_logging(&router).unwrap();
        log(&router, Level::Info, "before");
        engine.shutdown_logging();

        // a producer that passed the state check just before shutdown
        engine.queue.push("late".to_string());
        assert!(engine.try_drain());

        let recorder = engine.aspect();
        assert_eq!(*recorder.processed.lock(), vec!["before".to_string()]);
        assert_eq!(recorder.batches.load(Ordering::Relaxed), 1);
        assert_eq!(engine.error_count(), 0);
        assert_eq!(engine.pending(), 0);
    }

    /// Flushes, and on `"stop"` shuts down, its own engine from inside a batch.
    #[derive(Default)]
    struct SelfFlushing {
        engine: OnceLock<Weak<AspectEngine<SelfFlushing>>>,
        processed: Mutex<Vec<String>>,
        shutdowns: AtomicU32,
    }

    impl Debug for SelfFlushing {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SelfFlushing").finish_non_exhaustive()
        }
    }

    impl Aspect for SelfFlushing {
        type LogObject = String;

        fn name(&self) -> &str {
            "self-flushing"
        }

        fn create_log_object(&self, record: &Arc<LogRecord>) -> Option<String> {
            Some(record.message().to_string())
        }

        fn process_log_objects(&self, batch: &[String]) -> Result<(), AspectError> {
            self.processed.lock().extend(batch.iter().cloned());
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                engine.flush();
                if batch.iter().any(|m| m == "stop") {
                    engine.shutdown_logging();
                }
            }
            Ok(())
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn flushing_from_inside_a_drain_returns() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let engine = AspectEngine::new(SelfFlushing::default(), DEFAULT_ERROR_THRESHOLD);
        engine
            .aspect()
            .engine
            .set(Arc::downgrade(&engine))
            .unwrap();
        engine.init_logging(&router).unwrap();

        log(&router, Level::Info, "one");
        log(&router, Level::Info, "stop");
        log(&router, Level::Info, "ignored");

        assert_eq!(engine.state(), AspectState::ShutDown);
        assert_eq!(engine.aspect().shutdowns.load(Ordering::Relaxed), 1);
        assert_eq!(
            *engine.aspect().processed.lock(),
            vec!["one".to_string(), "stop".to_string()]
        );
        // the drain flag was released on the way out
        engine.flush();
    }
}

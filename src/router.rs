// SPDX-License-Identifier: MIT OR Apache-2.0

//! The routing facade every call site goes through.
//!
//! ```text
//! log(level, ..) -> level filter -> LogRecord -> registry.resolve(namespace) -> handler(s)
//! ```
//!
//! The level check is a single atomic load; when it fails nothing else happens, so
//! disabled levels cost next to nothing. Accepted records are captured once, wrapped in
//! an `Arc` and handed to whatever the call site's namespace resolves to. Handlers run on
//! the calling thread; a handler that asks for serialization is called under its own
//! lock, never under a router-wide one.

use crate::Level;
use crate::aspect::{AspectControl, AspectEngine};
use crate::cause::Cause;
use crate::config::{RouterConfig, Settings};
use crate::error::ConfigError;
use crate::handler::{Handler, HandlerGroup, HandlerSlot, LevelGate};
use crate::level_filter::LevelFilter;
use crate::log_record::{CallSite, LogRecord};
use crate::registry::HandlerRegistry;
use crate::stack;
use crate::stderror_handler::StdErrorHandler;
use crate::stream_aspect::StreamAspect;
use crate::template::Arg;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Frames in this module are logging machinery and get trimmed from captured stacks.
const ROUTER_NAMESPACE: &str = module_path!();

/// Routes log calls to handlers.
///
/// Construct one per process with [`Router::new`] (or [`Router::with_filter`] to
/// assemble handlers by hand), make it reachable from call sites with
/// [`global_router::install`](crate::global_router::install) or by passing the `Arc`
/// around, and call [`Router::shutdown`] before exit.
#[derive(Debug)]
pub struct Router {
    filter: AtomicU8,
    capture_stack: AtomicBool,
    shut_down: AtomicBool,
    registry: HandlerRegistry,
    aspects: Mutex<Vec<(u64, Arc<dyn AspectControl>)>>,
}

impl Router {
    /// A router with `filter` and no handlers at all.
    pub fn with_filter(filter: LevelFilter) -> Arc<Self> {
        Arc::new(Self {
            filter: AtomicU8::new(filter.bits()),
            capture_stack: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            registry: HandlerRegistry::new(Arc::new(HandlerGroup::new())),
            aspects: Mutex::new(Vec::new()),
        })
    }

    /// Builds a router from configuration.
    ///
    /// Fails on any configuration problem; nothing is left half-registered. With a
    /// `target` the default handler is a [`StreamAspect`]; without one it is a
    /// [`StdErrorHandler`].
    pub fn new(config: &RouterConfig) -> Result<Arc<Self>, ConfigError> {
        let settings = config.validate()?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Settings) -> Result<Arc<Self>, ConfigError> {
        let router = Self::with_filter(settings.filter);
        router
            .capture_stack
            .store(settings.capture_stack, Ordering::Relaxed);

        for ov in &settings.overrides {
            // only a stricter level changes anything; the router already drops the rest
            if ov.level > settings.filter.minimum_level() {
                let gate = LevelGate::new(
                    LevelFilter::starting_at(ov.level),
                    router.defaults().clone(),
                );
                router.register(&ov.namespace, Arc::new(gate))?;
            }
        }

        match settings.target {
            Some(target) => {
                let aspect = StreamAspect::new(target, settings.layout, settings.aspect_filter);
                let engine = AspectEngine::new(aspect, settings.error_threshold);
                engine.init_logging(&router)?;
            }
            None => {
                router.add_default_handler(Arc::new(StdErrorHandler::with_layout(settings.layout)));
            }
        }
        Ok(router)
    }

    #[inline]
    pub fn is_enabled(&self, level: Level) -> bool {
        LevelFilter::from_bits_unchecked(self.filter.load(Ordering::Relaxed)).is_level_enabled(level)
    }

    /// The current filter. After [`shutdown`](Self::shutdown) nothing is enabled, but the
    /// returned value still reports FATAL.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_bits(self.filter.load(Ordering::Relaxed))
    }

    pub fn set_level_filter(&self, filter: LevelFilter) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        self.filter.store(filter.bits(), Ordering::Relaxed);
    }

    pub fn minimum_level(&self) -> Level {
        self.level_filter().minimum_level()
    }

    /// Whether captured records carry a call stack.
    pub fn set_capture_stack(&self, enabled: bool) {
        self.capture_stack.store(enabled, Ordering::Relaxed);
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn defaults(&self) -> &Arc<HandlerGroup> {
        self.registry.defaults()
    }

    /// Routes `namespace` and its children to `handler`.
    pub fn register(
        &self,
        namespace: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<Arc<HandlerSlot>, ConfigError> {
        self.registry.register(namespace, handler)
    }

    pub fn unregister(&self, namespace: &str) -> Option<Arc<HandlerSlot>> {
        self.registry.unregister(namespace)
    }

    /// Adds a handler to the defaults every unregistered namespace falls through to.
    pub fn add_default_handler(&self, handler: Arc<dyn Handler>) -> Arc<HandlerSlot> {
        let slot = self.registry.slot_for(handler);
        self.defaults().add(slot.clone());
        slot
    }

    pub fn remove_default_handler(&self, slot_id: u64) -> bool {
        self.defaults().remove(slot_id)
    }

    pub(crate) fn attach_aspect(
        &self,
        handler: Arc<dyn Handler>,
        control: Arc<dyn AspectControl>,
    ) -> u64 {
        let slot = self.add_default_handler(handler);
        self.aspects.lock().push((slot.id(), control));
        slot.id()
    }

    pub(crate) fn detach_aspect(&self, slot_id: u64) {
        self.defaults().remove(slot_id);
        self.aspects.lock().retain(|(id, _)| *id != slot_id);
    }

    /// Names and states of the aspects currently attached.
    pub fn aspects(&self) -> Vec<Arc<dyn AspectControl>> {
        self.aspects
            .lock()
            .iter()
            .map(|(_, control)| control.clone())
            .collect()
    }

    /// Logs one call.
    ///
    /// Does nothing if `level` is filtered out. Never fails and never panics because of
    /// a handler.
    pub fn log(
        &self,
        level: Level,
        call_site: CallSite,
        cause: Option<Cause>,
        template: impl Into<Cow<'static, str>>,
        args: Vec<Arg>,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        let record = self.capture(level, call_site, cause, template.into(), args);
        self.dispatch(Arc::new(record));
    }

    /// Sends an already-built record to its route, bypassing the level filter.
    pub fn dispatch(&self, record: Arc<LogRecord>) {
        let route = self.registry.resolve(record.namespace());
        route.dispatch(&record);
    }

    #[inline(never)]
    fn capture(
        &self,
        level: Level,
        call_site: CallSite,
        cause: Option<Cause>,
        template: Cow<'static, str>,
        args: Vec<Arg>,
    ) -> LogRecord {
        let stack = if self.capture_stack.load(Ordering::Relaxed) {
            let mut frames = stack::capture();
            let overhead = stack::router_overhead(&frames, ROUTER_NAMESPACE);
            frames.drain(..overhead.min(frames.len().saturating_sub(1)));
            frames
        } else {
            Vec::new()
        };
        LogRecord::new(level, template)
            .with_args(args)
            .with_cause(cause)
            .with_call_site(call_site)
            .with_stack(stack)
    }

    /// Shuts down every attached aspect (flushing each), lets default handlers flush,
    /// then drops all routes. Later log calls do nothing. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        // Stop accepting records before tearing down sinks.
        self.filter.store(0, Ordering::Relaxed);

        let aspects = std::mem::take(&mut *self.aspects.lock());
        for (_, control) in aspects {
            control.shutdown_logging();
        }
        for slot in self.defaults().clear() {
            slot.prepare_to_die();
        }
        for slot in self.registry.clear() {
            slot.prepare_to_die();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory_handler::InMemoryHandler;

    fn site(namespace: &'static str) -> CallSite {
        CallSite::new(namespace, "src/lib.rs", 1)
    }

    #[test]
    fn filtered_levels_never_reach_handlers() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Warn));
        let sink = Arc::new(InMemoryHandler::new());
        router.add_default_handler(sink.clone());

        router.log(Level::Info, site("app"), None, "dropped", vec![]);
        assert_eq!(sink.len(), 0);

        router.log(Level::Error, site("app"), None, "kept %d", vec![Arg::from(1)]);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level(), Level::Error);
        assert_eq!(records[0].message(), "kept 1");
    }

    #[test]
    fn registered_namespace_takes_precedence_over_defaults() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let fallback = Arc::new(InMemoryHandler::new());
        let db = Arc::new(InMemoryHandler::new());
        router.add_default_handler(fallback.clone());
        router.register("app::db", db.clone()).unwrap();

        router.log(Level::Info, site("app::db::pool"), None, "db", vec![]);
        router.log(Level::Info, site("app::net"), None, "net", vec![]);
        assert_eq!(db.drain_logs(), "INFO db");
        assert_eq!(fallback.drain_logs(), "INFO net");
    }

    #[test]
    fn override_gate_applies_only_when_stricter() {
        let settings = RouterConfig {
            level: "info".to_string(),
            overrides: vec!["noisy=error".to_string(), "chatty=debug".to_string()],
            ..RouterConfig::default()
        }
        .validate()
        .unwrap();
        let router = Router::from_settings(settings).unwrap();
        let registered: Vec<String> = router
            .registry()
            .registrations()
            .into_iter()
            .map(|(ns, _)| ns)
            .collect();
        assert_eq!(registered, vec!["noisy".to_string()]);
    }

    #[test]
    fn shutdown_is_idempotent_and_silences_logging() {
        let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
        let sink = Arc::new(InMemoryHandler::new());
        router.add_default_handler(sink.clone());
        router.shutdown();
        router.shutdown();
        assert!(router.is_shut_down());
        assert!(!router.is_enabled(Level::Fatal));
        router.log(Level::Fatal, site("app"), None, "after", vec![]);
        assert_eq!(sink.len(), 0);
        router.set_level_filter(LevelFilter::starting_at(Level::Trace));
        assert!(!router.is_enabled(Level::Fatal));
    }
}

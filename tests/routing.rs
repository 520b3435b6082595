// SPDX-License-Identifier: MIT OR Apache-2.0

use logroute::handler::Handler;
use logroute::{CallSite, InMemoryHandler, Level, LevelFilter, LogRecord, Router};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct CountingHandler {
    count: AtomicUsize,
}

impl Handler for CountingHandler {
    fn handle_record(&self, _record: &Arc<LogRecord>) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn requires_serialization(&self) -> bool {
        false
    }

    fn prepare_to_die(&self) {}
}

/// Tracks how many threads are inside `handle_record` at once.
#[derive(Debug, Default)]
struct OverlapHandler {
    inside: AtomicUsize,
    max_inside: AtomicUsize,
    calls: AtomicUsize,
}

impl Handler for OverlapHandler {
    fn handle_record(&self, _record: &Arc<LogRecord>) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inside.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        self.inside.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn prepare_to_die(&self) {}
}

fn log_from(router: &Router, namespace: &'static str, message: &'static str) {
    router.log(
        Level::Info,
        CallSite::new(namespace, file!(), line!()),
        None,
        message,
        vec![],
    );
}

#[test]
fn warn_filter_delivers_only_warn_and_above() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Warn));
    let counter = Arc::new(CountingHandler::default());
    router.add_default_handler(counter.clone());

    for i in 0..10 {
        logroute::log!(router, Level::Info, "info %d", i);
    }
    for i in 0..3 {
        logroute::log!(router, Level::Warn, "warn %d", i);
    }
    logroute::log!(router, Level::Error, "error");
    logroute::log!(router, Level::Fatal, "fatal");

    assert_eq!(counter.count.load(Ordering::Relaxed), 5);
}

#[test]
fn most_specific_registration_wins() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
    let fallback = Arc::new(InMemoryHandler::new());
    let app = Arc::new(InMemoryHandler::new());
    let db = Arc::new(InMemoryHandler::new());
    router.add_default_handler(fallback.clone());
    router.register("app", app.clone()).unwrap();
    router.register("app::db", db.clone()).unwrap();

    log_from(&router, "app::db::pool", "pool");
    log_from(&router, "app::dbx", "sibling");
    log_from(&router, "app", "root");
    log_from(&router, "other::app", "other");

    assert_eq!(db.drain_logs(), "INFO pool");
    assert_eq!(app.drain_logs(), "INFO sibling\nINFO root");
    assert_eq!(fallback.drain_logs(), "INFO other");
}

#[test]
fn registration_changes_invalidate_cached_routes() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
    let app = Arc::new(InMemoryHandler::new());
    let db = Arc::new(InMemoryHandler::new());
    router.register("app", app.clone()).unwrap();

    log_from(&router, "app::db::pool", "before");
    assert!(router.registry().cached_routes() > 0);

    router.register("app::db", db.clone()).unwrap();
    log_from(&router, "app::db::pool", "during");

    router.unregister("app::db");
    log_from(&router, "app::db::pool", "after");

    assert_eq!(app.drain_logs(), "INFO before\nINFO after");
    assert_eq!(db.drain_logs(), "INFO during");
}

#[test]
fn macros_route_by_module_path() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Info));
    let fallback = Arc::new(InMemoryHandler::new());
    let mine = Arc::new(InMemoryHandler::new());
    router.add_default_handler(fallback.clone());
    router.register(module_path!(), mine.clone()).unwrap();

    logroute::log!(router, Level::Info, "hello %s", "routing");

    assert!(fallback.is_empty());
    let records = mine.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].namespace(), module_path!());
    assert_eq!(records[0].file(), "routing.rs");
}

#[test]
fn concurrent_logging_survives_registration_churn() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 1_000;

    let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
    let fallback = Arc::new(CountingHandler::default());
    let scoped = Arc::new(CountingHandler::default());
    router.add_default_handler(fallback.clone());

    let producers: Vec<_> = (0..THREADS)
        .map(|_| {
            let router = router.clone();
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    log_from(&router, "app::worker", "tick");
                }
            })
        })
        .collect();
    for _ in 0..100 {
        router.register("app", scoped.clone()).unwrap();
        router.unregister("app");
    }
    for producer in producers {
        producer.join().unwrap();
    }

    let total = fallback.count.load(Ordering::Relaxed) + scoped.count.load(Ordering::Relaxed);
    assert_eq!(total, THREADS * PER_THREAD);
}

#[test]
fn one_handler_in_several_places_is_still_called_one_at_a_time() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Trace));
    let handler = Arc::new(OverlapHandler::default());
    router.register("a", handler.clone()).unwrap();
    router.register("b", handler.clone()).unwrap();
    router.add_default_handler(handler.clone());

    let namespaces = ["a::x", "b::y", "c", "a"];
    let producers: Vec<_> = namespaces
        .into_iter()
        .map(|namespace| {
            let router = router.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    log_from(&router, namespace, "tick");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(handler.calls.load(Ordering::SeqCst), 200);
    assert_eq!(handler.max_inside.load(Ordering::SeqCst), 1);
}

// SPDX-License-Identifier: MIT OR Apache-2.0

use logroute::template::Arg;
use logroute::{Aspect, AspectEngine, AspectError, AspectState, Level, LevelFilter, LogRecord, Router};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const THREADS: u64 = 8;
const PER_THREAD: u64 = 500;

/// Remembers every (thread, sequence) pair in processing order.
#[derive(Debug, Default)]
struct Collector {
    seen: Mutex<Vec<(u64, u64)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    batches: AtomicUsize,
}

impl Aspect for Collector {
    type LogObject = (u64, u64);

    fn name(&self) -> &str {
        "collector"
    }

    fn create_log_object(&self, record: &Arc<LogRecord>) -> Option<(u64, u64)> {
        match record.args() {
            [Arg::UInt(thread), Arg::UInt(seq)] => Some((*thread, *seq)),
            _ => None,
        }
    }

    fn process_log_objects(&self, batch: &[(u64, u64)]) -> Result<(), AspectError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.seen.lock().extend_from_slice(batch);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn every_object_is_processed_exactly_once() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Info));
    let engine = AspectEngine::new(Collector::default(), 5);
    engine.init_logging(&router).unwrap();

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let router = router.clone();
            thread::spawn(move || {
                for seq in 0..PER_THREAD {
                    logroute::log!(router, Level::Info, "t%d s%d", t, seq);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    router.shutdown();

    assert_eq!(engine.state(), AspectState::ShutDown);
    assert_eq!(engine.pending(), 0);
    let collector = engine.aspect();
    assert_eq!(collector.max_in_flight.load(Ordering::SeqCst), 1);

    let seen = collector.seen.lock();
    assert_eq!(seen.len() as u64, THREADS * PER_THREAD);
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len());

    // one queue, one drainer at a time: each producer's objects come out in order
    let mut next = vec![0u64; THREADS as usize];
    for &(t, seq) in seen.iter() {
        assert_eq!(seq, next[t as usize], "thread {t} out of order");
        next[t as usize] += 1;
    }
    assert!(collector.batches.load(Ordering::Relaxed) >= 1);
}

#[test]
fn records_the_aspect_rejects_never_reach_the_queue() {
    let router = Router::with_filter(LevelFilter::starting_at(Level::Info));
    let engine = AspectEngine::new(Collector::default(), 5);
    engine.init_logging(&router).unwrap();

    logroute::log!(router, Level::Info, "no args");
    logroute::log!(router, Level::Info, "t%d s%d", 1u64, 0u64);
    router.shutdown();

    assert_eq!(*engine.aspect().seen.lock(), vec![(1, 0)]);
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! # In-Memory Handler
//!
//! A [`Handler`] that keeps every record it receives, for tests and for programmatic
//! inspection of log output.
//!
//! ## Example
//!
//! ```rust
//! use logroute::{InMemoryHandler, Level, LevelFilter, Router};
//! use std::sync::Arc;
//!
//! let router = Router::with_filter(LevelFilter::starting_at(Level::Info));
//! let handler = Arc::new(InMemoryHandler::new());
//! router.add_default_handler(handler.clone());
//!
//! logroute::log!(router, Level::Warn, "disk %d%% full", 91);
//!
//! assert_eq!(handler.drain_logs(), "WARN disk 91% full");
//! ```

use crate::handler::Handler;
use crate::log_record::LogRecord;
use parking_lot::Mutex;
use std::sync::Arc;

/// An in-memory handler that stores the records it receives.
///
/// # Thread Safety
///
/// The handler is thread-safe and can be shared across threads using `Arc`. Records are
/// appended under a mutex, so concurrent loggers see a consistent buffer.
#[derive(Debug, Default)]
pub struct InMemoryHandler {
    records: Mutex<Vec<Arc<LogRecord>>>,
}

// ============================================================================
// BOILERPLATE TRAIT IMPLEMENTATIONS
// ============================================================================
//
// - Debug: Derived for diagnostic purposes and required by Handler
// - Default: Derived with obvious zero-value (empty buffer)
// - Clone: NOT implemented - two copies would silently split the captured output
// - PartialEq/Eq/Hash: NOT implemented - equality semantics unclear for handlers

impl InMemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record received so far, oldest first.
    pub fn records(&self) -> Vec<Arc<LogRecord>> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains all records into one string, one `LEVEL message` line each, clearing the
    /// buffer.
    ///
    /// ```rust
    /// use logroute::{InMemoryHandler, Level, LogRecord};
    /// use logroute::handler::Handler;
    /// use std::sync::Arc;
    ///
    /// let handler = InMemoryHandler::new();
    /// handler.handle_record(&Arc::new(LogRecord::new(Level::Info, "first")));
    /// handler.handle_record(&Arc::new(LogRecord::new(Level::Error, "second")));
    /// assert_eq!(handler.drain_logs(), "INFO first\nERROR second");
    /// assert_eq!(handler.drain_logs(), "");
    /// ```
    pub fn drain_logs(&self) -> String {
        let mut records = self.records.lock();
        let result = records
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        records.clear();
        result
    }
}

impl Handler for InMemoryHandler {
    fn handle_record(&self, record: &Arc<LogRecord>) {
        self.records.lock().push(record.clone());
    }

    /// No-op; nothing is buffered outside memory.
    fn prepare_to_die(&self) {}
}

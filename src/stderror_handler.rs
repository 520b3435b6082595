// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::handler::Handler;
use crate::layout::Layout;
use crate::log_record::LogRecord;
use std::sync::Arc;

/**
A reference handler that writes each record to stderr as it arrives.

Used as the default handler when no output target is configured. Unlike
[`StreamAspect`](crate::stream_aspect::StreamAspect) it does no batching: the write
happens on the logging thread, under the handler's slot lock.
 */
#[derive(Debug, Clone, Default)]
pub struct StdErrorHandler {
    layout: Layout,
}

// ============================================================================
// BOILERPLATE TRAIT IMPLEMENTATIONS
// ============================================================================
//
// Design decisions for StdErrorHandler trait implementations:
//
// - Debug/Clone: Derived - the layout is plain data
// - Default: Derived - the default layout
// - PartialEq/Eq: NOT implemented - two handlers writing to the same stream are not
//   meaningfully "equal"
// - Send/Sync: Automatically implemented

impl StdErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: Layout) -> Self {
        Self { layout }
    }
}

impl Handler for StdErrorHandler {
    fn handle_record(&self, record: &Arc<LogRecord>) {
        use std::io::Write;
        let line = self.layout.render(record);
        let mut lock = std::io::stderr().lock();
        // stderr is the last resort; if it is gone there is nobody to tell
        let _ = lock.write_all(line.as_bytes());
        let _ = lock.write_all(b"\n");
    }

    fn prepare_to_die(&self) {
        use std::io::Write;
        let _ = std::io::stderr().flush();
    }
}

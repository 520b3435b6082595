// SPDX-License-Identifier: MIT OR Apache-2.0

//! The default [`Aspect`]: rendered lines appended to stderr, stdout or a file.

use crate::aspect::Aspect;
use crate::error::AspectError;
use crate::layout::Layout;
use crate::level_filter::LevelFilter;
use crate::log_record::LogRecord;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a [`StreamAspect`] writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Stderr,
    Stdout,
    /// Opened for appending, created if missing.
    File(PathBuf),
}

impl Target {
    /// `stderr` and `stdout` (any case) name the standard streams; anything else is a path.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "stderr" => Target::Stderr,
            "stdout" => Target::Stdout,
            _ => Target::File(PathBuf::from(s.trim())),
        }
    }
}

/**
Writes one line per record.

Records are rendered in [`Aspect::create_log_object`], on the logging thread, so the
drainer only does I/O. Each batch is flushed before the drain lock is released.
*/
pub struct StreamAspect {
    name: String,
    target: Target,
    layout: Layout,
    filter: LevelFilter,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for StreamAspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAspect")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("filter", &self.filter)
            .field("open", &self.writer.try_lock().map(|w| w.is_some()))
            .finish()
    }
}

impl StreamAspect {
    pub fn new(target: Target, layout: Layout, filter: LevelFilter) -> Self {
        let name = match &target {
            Target::Stderr => "stderr".to_string(),
            Target::Stdout => "stdout".to_string(),
            Target::File(path) => path.display().to_string(),
        };
        Self {
            name,
            target,
            layout,
            filter,
            writer: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl Aspect for StreamAspect {
    type LogObject = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> Result<(), AspectError> {
        let writer: Box<dyn Write + Send> = match &self.target {
            Target::Stderr => Box::new(std::io::stderr()),
            Target::Stdout => Box::new(std::io::stdout()),
            Target::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Box::new(BufWriter::new(file))
            }
        };
        *self.writer.lock() = Some(writer);
        Ok(())
    }

    fn create_log_object(&self, record: &Arc<LogRecord>) -> Option<String> {
        if !self.filter.is_level_enabled(record.level()) {
            return None;
        }
        Some(self.layout.render(record))
    }

    fn process_log_objects(&self, batch: &[String]) -> Result<(), AspectError> {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return Err(AspectError::ShutDown);
        };
        for line in batch {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn shutdown(&self) {
        if let Some(mut writer) = self.writer.lock().take() {
            // nowhere left to report a failed final flush
            let _ = writer.flush();
        }
    }
}

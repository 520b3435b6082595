// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log record type.
//!
//! A [`LogRecord`] is the immutable snapshot of one accepted log call: level, optional
//! [`Cause`] chain, message template and arguments, timestamp, originating thread, the
//! macro-provided [`CallSite`] and the trimmed call stack.
//!
//! # Deferred formatting
//!
//! The template is not applied at capture time. [`LogRecord::message`] formats on first
//! use and caches the result, so a record that an aspect discards (for instance because
//! its own minimum level is stricter than the router's) never pays for formatting.
//!
//! # Example
//!
//! ```rust
//! use logroute::{LogRecord, Level};
//! use logroute::template::Arg;
//!
//! let record = LogRecord::new(Level::Info, "x=%d").with_args(vec![Arg::from(5)]);
//! assert_eq!(record.message(), "x=5");
//! ```

use crate::Level;
use crate::cause::Cause;
use crate::stack::StackFrame;
use crate::template::{self, Arg};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::OnceLock;
use std::thread::ThreadId;

/// Where a log macro was expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// `module_path!()` of the caller; this is the routing key.
    pub namespace: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    pub const fn new(namespace: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            namespace,
            file,
            line,
        }
    }

    /// A call site with no namespace, which routes to the default handlers.
    pub const fn unknown() -> Self {
        Self::new("", "<unknown>", 0)
    }
}

/**
A log record.

Records are created by the [`Router`](crate::Router) once the level check has passed and
are shared with handlers as `Arc<LogRecord>`. Nothing in a record changes after capture
except the lazily filled message cache.
*/
#[derive(Debug, Clone)]
pub struct LogRecord {
    level: Level,
    cause: Option<Cause>,
    template: Cow<'static, str>,
    args: Vec<Arg>,
    message: OnceLock<String>,
    timestamp: DateTime<Utc>,
    thread_id: ThreadId,
    thread_name: Option<String>,
    call_site: CallSite,
    stack: Vec<StackFrame>,
}

impl LogRecord {
    /// A record stamped with the current time and thread, without arguments or stack.
    pub fn new(level: Level, template: impl Into<Cow<'static, str>>) -> Self {
        let current = std::thread::current();
        Self {
            level,
            cause: None,
            template: template.into(),
            args: Vec::new(),
            message: OnceLock::new(),
            timestamp: Utc::now(),
            thread_id: current.id(),
            thread_name: current.name().map(str::to_string),
            call_site: CallSite::unknown(),
            stack: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Arg>) -> Self {
        self.args = args;
        self.message = OnceLock::new();
        self
    }

    pub fn with_cause(mut self, cause: Option<Cause>) -> Self {
        self.cause = cause;
        self
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }

    /// Sets the already-trimmed stack; frame 0 must be the call site.
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// The formatted message, rendered on first call.
    pub fn message(&self) -> &str {
        self.message
            .get_or_init(|| template::render(&self.template, &self.args))
    }

    /// Whether [`message`](Self::message) has been rendered yet.
    pub fn is_message_rendered(&self) -> bool {
        self.message.get().is_some()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// The thread's name, or its id when unnamed.
    pub fn thread_name(&self) -> Cow<'_, str> {
        match &self.thread_name {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("{:?}", self.thread_id)),
        }
    }

    pub fn call_site(&self) -> CallSite {
        self.call_site
    }

    /// The namespace used to resolve this record's handler.
    pub fn namespace(&self) -> &'static str {
        self.call_site.namespace
    }

    /// Call-site stack, frame 0 first.
    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    /// Frame 0 of [`stack`](Self::stack), when a stack was captured.
    pub fn location(&self) -> Option<&StackFrame> {
        self.stack.first()
    }

    /// Module path of the calling code, without its last segment.
    pub fn package(&self) -> &str {
        match self.location() {
            Some(frame) => frame.package(),
            None => split_last(self.call_site.namespace).0,
        }
    }

    /// Type (or module, for free functions) of the calling code.
    pub fn class(&self) -> &str {
        match self.location() {
            Some(frame) => frame.class(),
            None => split_last(self.call_site.namespace).1,
        }
    }

    /// Calling function; `?` when no stack was captured.
    pub fn method(&self) -> &str {
        match self.location() {
            Some(frame) => frame.function(),
            None => "?",
        }
    }

    /// Source file name of the call site.
    pub fn file(&self) -> &str {
        self.location()
            .and_then(StackFrame::file_name)
            .unwrap_or_else(|| {
                let file = self.call_site.file;
                file.rsplit(['/', '\\']).next().unwrap_or(file)
            })
    }

    pub fn line(&self) -> u32 {
        self.location()
            .and_then(StackFrame::line)
            .unwrap_or(self.call_site.line)
    }
}

fn split_last(namespace: &str) -> (&str, &str) {
    match namespace.rfind("::") {
        Some(idx) => (&namespace[..idx], &namespace[idx + 2..]),
        None => ("", namespace),
    }
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.level, self.message())
    }
}
/*
Boilerplate notes for LogRecord:

IMPLEMENTED:
- Debug: Derived - essential for diagnostics
- Clone: Derived - handlers that outlive the call may keep their own copy
- Display: level and rendered message, for quick inspection

NOT IMPLEMENTED:
- PartialEq/Eq/Hash: the message cache and timestamp make equality misleading
- Default: a record without a level or template has no meaning
- Copy: owns heap data

AUTOMATIC:
- Send/Sync: all fields are thread-safe, so records can be shared as Arc<LogRecord>
*/

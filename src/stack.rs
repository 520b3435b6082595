// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call-stack snapshots.
//!
//! Frames come from [`std::backtrace::Backtrace`]: the rendered backtrace is parsed into
//! [`StackFrame`]s carrying the demangled symbol, its namespace (the module path, or the
//! type path for methods), the function name and, when debug info is present, the source
//! position.
//!
//! Every record captured through the router sees the same leading frames (the backtrace
//! machinery, the record constructor, the router itself). [`router_overhead`] counts
//! them once per process so each capture can be trimmed to begin at the real call site.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::Display;
use std::sync::OnceLock;

/// One frame of a captured stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackFrame {
    symbol: String,
    file: Option<String>,
    line: Option<u32>,
}

impl StackFrame {
    pub fn new(symbol: impl Into<String>, file: Option<String>, line: Option<u32>) -> Self {
        Self {
            symbol: strip_hash(symbol.into()),
            file,
            line,
        }
    }

    /// The demangled symbol, e.g. `app::db::Pool::get`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Everything before the final path segment, e.g. `app::db::Pool`.
    ///
    /// Trait impls (`<app::Foo as core::fmt::Debug>::fmt`) report the implementing type's
    /// path. Closure suffixes (`{{closure}}`) are ignored.
    pub fn namespace(&self) -> &str {
        self.split().0
    }

    /// The final path segment, e.g. `get`.
    pub fn function(&self) -> &str {
        self.split().1
    }

    /// The last segment of [`namespace`](Self::namespace).
    pub fn class(&self) -> &str {
        let ns = self.namespace();
        match ns.rfind("::") {
            Some(idx) => &ns[idx + 2..],
            None => ns,
        }
    }

    /// [`namespace`](Self::namespace) without its last segment.
    pub fn package(&self) -> &str {
        let ns = self.namespace();
        match ns.rfind("::") {
            Some(idx) => &ns[..idx],
            None => "",
        }
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Final component of [`file`](Self::file).
    pub fn file_name(&self) -> Option<&str> {
        self.file
            .as_deref()
            .map(|f| f.rsplit(['/', '\\']).next().unwrap_or(f))
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Whether this frame's code lives in `namespace` or one of its children.
    pub fn is_in_namespace(&self, namespace: &str) -> bool {
        let owner = self.namespace();
        owner
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    }

    /// (namespace, function)
    fn split(&self) -> (&str, &str) {
        let symbol = self.symbol.as_str();
        if let Some(rest) = symbol.strip_prefix('<') {
            if let Some(close) = rest.rfind(">::") {
                let inner = &rest[..close];
                let ty = inner.split(" as ").next().unwrap_or(inner);
                let method = trim_closures(&rest[close + 3..]);
                let method = method.rsplit("::").next().unwrap_or(method);
                return (ty, method);
            }
        }
        let path = trim_closures(symbol);
        match path.rfind("::") {
            Some(idx) => (&path[..idx], &path[idx + 2..]),
            None => ("", path),
        }
    }
}

fn trim_closures(mut s: &str) -> &str {
    while let Some(stripped) = s.strip_suffix("::{{closure}}") {
        s = stripped;
    }
    s
}

fn strip_hash(mut symbol: String) -> String {
    // `path::to::fn::h0123456789abcdef`
    if let Some(idx) = symbol.rfind("::h") {
        let hash = &symbol[idx + 3..];
        if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
            symbol.truncate(idx);
        }
    }
    symbol
}

impl Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, " ({file}:{line})"),
            (Some(file), None) => write!(f, " ({file})"),
            _ => Ok(()),
        }
    }
}

/// Captures the current thread's full stack.
///
/// Returns an empty vector when the platform cannot produce a backtrace.
#[inline(never)]
pub fn capture() -> Vec<StackFrame> {
    let backtrace = Backtrace::force_capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    parse_backtrace(&backtrace.to_string())
}

/// Parses the text form of a [`Backtrace`].
///
/// ```text
///    0: app::main
///              at ./src/main.rs:4:5
/// ```
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(location) = trimmed.strip_prefix("at ") {
            let Some(frame) = frames.last_mut() else { continue };
            // inlined frames list several locations; the first one is the frame's own
            if frame.file.is_none() {
                let (file, line) = split_location(location);
                frame.file = Some(file.to_string());
                frame.line = line;
            }
            continue;
        }
        if let Some((index, symbol)) = trimmed.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(StackFrame::new(symbol.trim(), None, None));
            }
        }
    }
    frames
}

/// `path/to/file.rs:12:5` -> (`path/to/file.rs`, Some(12))
fn split_location(location: &str) -> (&str, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();
    match (rest, middle, last) {
        (Some(file), Some(line), Some(_column)) => match line.parse() {
            Ok(line) => (file, Some(line)),
            Err(_) => (location, None),
        },
        (None, Some(file), Some(line)) => match line.parse() {
            Ok(line) => (file, Some(line)),
            Err(_) => (location, None),
        },
        _ => (location, None),
    }
}

/// Number of leading frames that belong to the logging machinery.
///
/// Skips frames until one lies in `namespace`, then keeps skipping while frames stay in
/// `namespace`. When `namespace` never appears the result is `len - 1` (or 0 for an empty
/// stack), so the last frame is still reported.
pub fn overhead(frames: &[StackFrame], namespace: &str) -> usize {
    let degenerate = frames.len().saturating_sub(1);
    let Some(first) = frames.iter().position(|f| f.is_in_namespace(namespace)) else {
        return degenerate;
    };
    let after = frames[first..]
        .iter()
        .position(|f| !f.is_in_namespace(namespace))
        .map(|p| first + p);
    match after {
        Some(idx) => idx,
        None => degenerate,
    }
}

static ROUTER_OVERHEAD: OnceLock<usize> = OnceLock::new();

/// [`overhead`] for `frames` against `namespace`, computed on the first call and reused.
///
/// The count only depends on the path from the router's entry point to [`capture`],
/// which is the same for every call site.
pub(crate) fn router_overhead(frames: &[StackFrame], namespace: &str) -> usize {
    *ROUTER_OVERHEAD.get_or_init(|| overhead(frames, namespace))
}

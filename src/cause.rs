// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error causes attached to a log call.
//!
//! A [`Cause`] is an owned snapshot of an error: its message, an optional type name, the
//! frames captured for it and the cause that produced it. Rust errors do not carry their
//! own stacks, so frames are only present when the cause was built with
//! [`Cause::capture`] or [`Cause::with_frames`].

use crate::stack::{self, StackFrame};
use std::error::Error;
use std::fmt::{Display, Write};

/// Frames listed per cause when rendering, unless configured otherwise.
pub const DEFAULT_MAX_CAUSE_FRAMES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cause {
    type_name: Option<String>,
    message: String,
    frames: Vec<StackFrame>,
    source: Option<Box<Cause>>,
}

impl Cause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            type_name: None,
            message: message.into(),
            frames: Vec::new(),
            source: None,
        }
    }

    /// A cause carrying the current thread's stack.
    #[inline(never)]
    pub fn capture(message: impl Into<String>) -> Self {
        let mut frames = stack::capture();
        // drop the frames for `stack::capture` and this constructor
        if frames.iter().any(|f| f.is_in_namespace(module_path!())) {
            let own = stack::overhead(&frames, module_path!());
            frames.drain(..own);
        }
        Self::new(message).with_frames(frames)
    }

    /// Snapshots `error` and every error reachable through [`Error::source`].
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut cause = Self::new(error.to_string());
        cause.type_name = Some(error_type_name(error));
        if let Some(source) = error.source() {
            cause.source = Some(Box::new(Self::from_error(source)));
        }
        cause
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Appends `source` at the end of this chain.
    pub fn caused_by(mut self, source: Cause) -> Self {
        let tail = match self.source.take() {
            Some(existing) => (*existing).caused_by(source),
            None => source,
        };
        self.source = Some(Box::new(tail));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn source(&self) -> Option<&Cause> {
        self.source.as_deref()
    }

    /// This cause followed by its sources.
    pub fn chain(&self) -> impl Iterator<Item = &Cause> {
        std::iter::successors(Some(self), |c| c.source())
    }

    /// Writes a `Caused by:` section for every cause in the chain.
    ///
    /// Each section lists at most `max_frames` frames; the chain itself is never cut short.
    pub fn render(&self, max_frames: usize) -> String {
        let mut out = String::new();
        for cause in self.chain() {
            let _ = write!(out, "\nCaused by: {cause}");
            for frame in cause.frames.iter().take(max_frames) {
                let _ = write!(out, "\n\tat {frame}");
            }
            if cause.frames.len() > max_frames {
                let _ = write!(out, "\n\t... {} more", cause.frames.len() - max_frames);
            }
        }
        out
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.type_name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl<E: Error + 'static> From<&E> for Cause {
    fn from(error: &E) -> Self {
        let mut cause = Self::from_error(error);
        cause.type_name = Some(short_type_name::<E>().to_string());
        cause
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// `dyn Error` loses the concrete type; the `Debug` output usually starts with it.
fn error_type_name(error: &(dyn Error + 'static)) -> String {
    let debug = format!("{error:?}");
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if head.is_empty() || head.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        "Error".to_string()
    } else {
        head
    }
}

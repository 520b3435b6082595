// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::error::ConfigError;
use std::fmt::Display;
use std::str::FromStr;

/// Severity of a log call, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Step-by-step detail, usually disabled
    Trace,
    /// Diagnostics for developers of the calling code
    Debug,
    /// Normal operation
    Info,
    /// Suspicious condition
    Warn,
    /// Runtime error that was handled
    Error,
    /// Unrecoverable condition; can never be filtered out
    Fatal,
}

impl Level {
    /// Every level in ascending order.
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    pub(crate) const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    /// Parses a severity name, ignoring case. `warning` is accepted for [`Level::Warn`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(ConfigError::UnknownLevel(s.to_string())),
        }
    }
}

/*
Boilerplate notes.

Copy is fine, this is a fieldless enum.
Ord follows declaration order, which is the severity order the filters rely on.
Default is deliberately absent: there is no level that is obviously right for every caller.
*/

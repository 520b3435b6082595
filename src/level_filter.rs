// SPDX-License-Identifier: MIT OR Apache-2.0

//! Severity membership tests.
//!
//! A [`LevelFilter`] is a small bit set over [`Level`]. [`Level::Fatal`] is a member of
//! every filter no matter how it was built, so fatal records can never be suppressed.

use crate::Level;
use crate::error::ConfigError;
use std::fmt::Display;

const FATAL_BIT: u8 = Level::Fatal.bit();

/// The set of levels a router (or a gate) lets through.
///
/// ```
/// use logroute::{Level, LevelFilter};
///
/// let filter = LevelFilter::starting_at(Level::Warn);
/// assert!(!filter.is_level_enabled(Level::Info));
/// assert!(filter.is_level_enabled(Level::Error));
///
/// let only_trace = LevelFilter::is_level(&[Level::Trace]);
/// assert!(only_trace.is_level_enabled(Level::Fatal));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelFilter {
    bits: u8,
}

impl LevelFilter {
    /// Contiguous range from `min` up to and including [`Level::Fatal`].
    pub const fn starting_at(min: Level) -> Self {
        // every bit at or above `min`, within the six defined levels
        let all = (1u8 << Level::ALL.len()) - 1;
        Self {
            bits: (all & !(min.bit() - 1)) | FATAL_BIT,
        }
    }

    /// Exactly the given levels, plus [`Level::Fatal`].
    pub fn is_level(levels: &[Level]) -> Self {
        let bits = levels.iter().fold(FATAL_BIT, |acc, l| acc | l.bit());
        Self { bits }
    }

    /// Like [`is_level`](Self::is_level), but rejects an empty argument list.
    ///
    /// Configuration code uses this so that `levels = []` is reported instead of silently
    /// meaning "fatal only".
    pub fn try_is_level(levels: &[Level]) -> Result<Self, ConfigError> {
        if levels.is_empty() {
            return Err(ConfigError::EmptyLevelSet);
        }
        Ok(Self::is_level(levels))
    }

    pub(crate) const fn bits(&self) -> u8 {
        self.bits
    }

    /// Rebuilds a filter from [`bits`](Self::bits); FATAL is put back if missing.
    pub(crate) const fn from_bits(bits: u8) -> Self {
        Self {
            bits: bits | FATAL_BIT,
        }
    }

    /// Raw bits without the FATAL guarantee. Only the router's shut-down state uses this.
    #[inline]
    pub(crate) const fn from_bits_unchecked(bits: u8) -> Self {
        Self { bits }
    }

    #[inline]
    pub const fn is_level_enabled(&self, level: Level) -> bool {
        self.bits & level.bit() != 0
    }

    /// The lowest enabled level.
    pub fn minimum_level(&self) -> Level {
        Level::ALL
            .into_iter()
            .find(|l| self.is_level_enabled(*l))
            .unwrap_or(Level::Fatal)
    }

    /// Enabled levels in ascending order.
    pub fn levels(&self) -> impl Iterator<Item = Level> + '_ {
        Level::ALL
            .into_iter()
            .filter(|l| self.is_level_enabled(*l))
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::starting_at(Level::Info)
    }
}

impl From<Level> for LevelFilter {
    fn from(min: Level) -> Self {
        Self::starting_at(min)
    }
}

impl Display for LevelFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for level in self.levels() {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(level.as_str())?;
        }
        Ok(())
    }
}

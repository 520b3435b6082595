// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.
//!
//! Only configuration can fail synchronously. Sink failures surface as [`AspectError`]
//! inside the aspect engine and are counted there; they never reach the caller of a log
//! macro.

use thiserror::Error;

/// A problem found while configuring a [`Router`](crate::Router).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown log level `{0}`")]
    UnknownLevel(String),
    #[error("malformed namespace override `{0}`, expected `namespace=LEVEL`")]
    MalformedOverride(String),
    #[error("`{0}` does not name a namespace")]
    EmptyNamespace(String),
    #[error("level filter needs at least one level")]
    EmptyLevelSet,
    #[error("unknown layout token `{{{0}}}`")]
    UnknownToken(String),
    #[error("unterminated layout token starting at byte {0}")]
    UnterminatedToken(usize),
    #[error("error threshold must be at least 1")]
    InvalidThreshold,
    #[error("max cause frames must be at least 1")]
    InvalidFrameCap,
    #[error("invalid time format `{0}`")]
    InvalidTimeFormat(String),
    #[error("default aspect failed to start: {0}")]
    Aspect(#[from] AspectError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ConfigError>),
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A failure inside an [`Aspect`](crate::aspect::Aspect).
#[derive(Debug, Error)]
pub enum AspectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("aspect failed to initialize: {0}")]
    Init(String),
    #[error("{0}")]
    Processing(String),
    #[error("aspect has been shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_lists_every_problem() {
        let err = ConfigError::Invalid(vec![
            ConfigError::UnknownLevel("loud".to_string()),
            ConfigError::InvalidThreshold,
        ]);
        assert_eq!(
            err.to_string(),
            "invalid configuration: unknown log level `loud`, error threshold must be at least 1"
        );
    }

    #[test]
    fn empty_namespace_names_the_input() {
        let err = ConfigError::EmptyNamespace("::".to_string());
        assert_eq!(err.to_string(), "`::` does not name a namespace");
    }

    #[test]
    fn unknown_token_shows_braces() {
        let err = ConfigError::UnknownToken("colour".to_string());
        assert_eq!(err.to_string(), "unknown layout token `{colour}`");
    }
}

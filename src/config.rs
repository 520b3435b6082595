// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router configuration.
//!
//! [`RouterConfig`] is the raw, deserializable form (TOML via [`RouterConfig::load`] or
//! [`RouterConfig::from_toml_str`]). [`RouterConfig::validate`] turns it into
//! [`Settings`], reporting every problem at once. All of this happens before a router
//! exists; nothing here is checked again at log time.
//!
//! ```toml
//! level = "info"
//! overrides = ["app::db=warn", "hyper=error"]
//! target = "/var/log/app.log"
//! layout = "{time} {level} {message}{cause}"
//! error_threshold = 5
//! ```

use crate::Level;
use crate::aspect::DEFAULT_ERROR_THRESHOLD;
use crate::cause::DEFAULT_MAX_CAUSE_FRAMES;
use crate::error::ConfigError;
use crate::layout::{DEFAULT_LAYOUT, DEFAULT_TIME_FORMAT, Layout};
use crate::level_filter::LevelFilter;
use crate::stream_aspect::Target;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Global minimum level.
    pub level: String,
    /// Explicit level set; replaces `level` when present.
    pub levels: Option<Vec<String>>,
    /// `namespace=LEVEL` entries. Only levels stricter than the global minimum matter.
    pub overrides: Vec<String>,
    /// `stderr`, `stdout` or a file path for the default aspect. Absent means a plain
    /// synchronous stderr handler.
    pub target: Option<String>,
    /// Minimum level of the default aspect, on top of the router's filter.
    pub aspect_level: Option<String>,
    pub layout: String,
    pub time_format: String,
    pub max_cause_frames: usize,
    pub error_threshold: u32,
    pub capture_stack: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            levels: None,
            overrides: Vec::new(),
            target: None,
            aspect_level: None,
            layout: DEFAULT_LAYOUT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_cause_frames: DEFAULT_MAX_CAUSE_FRAMES,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            capture_stack: true,
        }
    }
}

/// One validated `namespace=LEVEL` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceOverride {
    pub namespace: String,
    pub level: Level,
}

impl std::str::FromStr for NamespaceOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((namespace, level)) = s.split_once('=') else {
            return Err(ConfigError::MalformedOverride(s.to_string()));
        };
        let namespace = namespace.trim().trim_end_matches("::");
        if namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace(s.to_string()));
        }
        if level.contains('=') {
            return Err(ConfigError::MalformedOverride(s.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            level: level.parse()?,
        })
    }
}

/// A comma-separated override list, as found in environment variables:
/// `"app::db=warn, hyper=error"`. Empty entries are skipped.
pub fn parse_overrides(list: &str) -> Result<Vec<NamespaceOverride>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}

/// Validated configuration, ready to build a [`Router`](crate::Router).
#[derive(Debug, Clone)]
pub struct Settings {
    pub filter: LevelFilter,
    pub overrides: Vec<NamespaceOverride>,
    pub target: Option<Target>,
    pub aspect_filter: LevelFilter,
    pub layout: Layout,
    pub error_threshold: u32,
    pub capture_stack: bool,
}

impl RouterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)?.validate()
    }

    /// Checks everything, collecting all problems rather than stopping at the first.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let mut errors = Vec::new();

        let filter = match &self.levels {
            Some(names) => {
                let parsed: Result<Vec<Level>, _> = names.iter().map(|n| n.parse()).collect();
                parsed
                    .and_then(|levels| LevelFilter::try_is_level(&levels))
                    .map_err(|e| errors.push(e))
                    .ok()
            }
            None => self
                .level
                .parse::<Level>()
                .map(LevelFilter::starting_at)
                .map_err(|e| errors.push(e))
                .ok(),
        };

        let mut overrides = Vec::new();
        for entry in &self.overrides {
            match entry.parse::<NamespaceOverride>() {
                Ok(ov) => overrides.push(ov),
                Err(e) => errors.push(e),
            }
        }

        let aspect_filter = match &self.aspect_level {
            Some(name) => name
                .parse::<Level>()
                .map(LevelFilter::starting_at)
                .map_err(|e| errors.push(e))
                .ok(),
            None => Some(LevelFilter::starting_at(Level::Trace)),
        };

        let layout = Layout::parse(&self.layout)
            .and_then(|l| l.with_time_format(&self.time_format))
            .and_then(|l| l.with_max_cause_frames(self.max_cause_frames))
            .map_err(|e| errors.push(e))
            .ok();

        if self.error_threshold == 0 {
            errors.push(ConfigError::InvalidThreshold);
        }

        match (filter, aspect_filter, layout) {
            (Some(filter), Some(aspect_filter), Some(layout)) if errors.is_empty() => {
                Ok(Settings {
                    filter,
                    overrides,
                    target: self.target.as_deref().map(Target::parse),
                    aspect_filter,
                    layout,
                    error_threshold: self.error_threshold,
                    capture_stack: self.capture_stack,
                })
            }
            _ if errors.len() == 1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Invalid(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = RouterConfig::default().validate().unwrap();
        assert_eq!(settings.filter, LevelFilter::starting_at(Level::Info));
        assert!(settings.target.is_none());
        assert!(settings.capture_stack);
        assert_eq!(settings.error_threshold, DEFAULT_ERROR_THRESHOLD);
    }

    #[test]
    fn parses_toml() {
        let config = RouterConfig::from_toml_str(
            r#"
            level = "warn"
            overrides = ["app::db=error"]
            target = "stdout"
            aspect_level = "error"
            error_threshold = 2
            capture_stack = false
            "#,
        )
        .unwrap();
        let settings = config.validate().unwrap();
        assert_eq!(settings.filter.minimum_level(), Level::Warn);
        assert_eq!(
            settings.overrides,
            vec![NamespaceOverride {
                namespace: "app::db".to_string(),
                level: Level::Error
            }]
        );
        assert_eq!(settings.target, Some(Target::Stdout));
        assert_eq!(settings.aspect_filter.minimum_level(), Level::Error);
        assert_eq!(settings.error_threshold, 2);
        assert!(!settings.capture_stack);
    }

    #[test]
    fn explicit_level_set() {
        let config = RouterConfig {
            levels: Some(vec!["trace".to_string(), "error".to_string()]),
            ..RouterConfig::default()
        };
        let filter = config.validate().unwrap().filter;
        assert!(filter.is_level_enabled(Level::Trace));
        assert!(!filter.is_level_enabled(Level::Info));
        assert!(filter.is_level_enabled(Level::Fatal));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            RouterConfig::from_toml_str("lvl = \"info\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn malformed_overrides() {
        assert!(matches!(
            "app::db".parse::<NamespaceOverride>(),
            Err(ConfigError::MalformedOverride(_))
        ));
        assert!(matches!(
            "=warn".parse::<NamespaceOverride>(),
            Err(ConfigError::EmptyNamespace(_))
        ));
        assert!(matches!(
            "a=b=c".parse::<NamespaceOverride>(),
            Err(ConfigError::MalformedOverride(_))
        ));
        assert!(matches!(
            "app=loud".parse::<NamespaceOverride>(),
            Err(ConfigError::UnknownLevel(_))
        ));
    }

    #[test]
    fn override_list() {
        let list = parse_overrides("app::db=warn, ,hyper=ERROR").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].level, Level::Error);
        assert!(parse_overrides("ok=info,bad").is_err());
    }

    #[test]
    fn every_problem_is_reported() {
        let config = RouterConfig {
            level: "verbose".to_string(),
            overrides: vec!["nope".to_string()],
            layout: "{colour}".to_string(),
            error_threshold: 0,
            ..RouterConfig::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn single_problem_is_reported_directly() {
        let config = RouterConfig {
            level: "verbose".to_string(),
            ..RouterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::UnknownLevel(_))));
    }
}

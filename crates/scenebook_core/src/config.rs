//! Editor configuration.
//!
//! # Responsibility
//! - Hold tunables for history depth and mention lookup.
//! - Load and validate TOML configuration files.
//!
//! # Invariants
//! - Every field has a default; an empty TOML document is a valid config.
//! - A config returned by `from_toml_str` has passed `validate()`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_MENTION_RESULT_LIMIT: usize = 10;
pub const DEFAULT_MENTION_TRIGGER: char = '@';
pub const DEFAULT_MAX_MENTION_QUERY_CHARS: usize = 64;

/// Tunables for one editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum retained undo snapshots.
    pub history_limit: usize,
    /// Maximum candidates kept from one registry lookup.
    pub mention_result_limit: usize,
    /// Characters that open a mention query.
    pub mention_triggers: Vec<char>,
    /// Longest query text a trigger scan will match. Explicit lookups are
    /// never shortened.
    pub max_mention_query_chars: usize,
    /// Log level override for binaries.
    pub log_level: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            mention_result_limit: DEFAULT_MENTION_RESULT_LIMIT,
            mention_triggers: vec![DEFAULT_MENTION_TRIGGER],
            max_mention_query_chars: DEFAULT_MAX_MENTION_QUERY_CHARS,
            log_level: None,
        }
    }
}

/// Configuration load or validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl EditorConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }
        if self.mention_result_limit == 0 {
            return Err(ConfigError::Invalid(
                "mention_result_limit must be at least 1".to_string(),
            ));
        }
        if self.max_mention_query_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_mention_query_chars must be at least 1".to_string(),
            ));
        }
        if self.mention_triggers.is_empty() {
            return Err(ConfigError::Invalid(
                "mention_triggers must not be empty".to_string(),
            ));
        }
        if let Some(trigger) = self.mention_triggers.iter().find(|c| c.is_whitespace()) {
            return Err(ConfigError::Invalid(format!(
                "mention trigger {trigger:?} must not be whitespace"
            )));
        }
        Ok(())
    }
}

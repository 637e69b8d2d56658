//! Queue configuration.
//!
//! [`QueueConfig`] is plain data: it can be built in code with the builder
//! methods or loaded from JSON with [`QueueConfig::from_json`]. Missing fields
//! fall back to their defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name used when none is configured.
pub const DEFAULT_NAME: &str = "task-queue";

/// Backlog slots pre-allocated when none is configured.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Errors produced while loading a [`QueueConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid queue config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("queue name must not be empty")]
    EmptyName,
}

/// Settings for a [`TaskQueue`](crate::queue::TaskQueue).
///
/// # Examples
///
/// ```
/// use taskrunner::config::QueueConfig;
///
/// let config = QueueConfig::from_json(r#"{ "name": "mailer" }"#).unwrap();
/// assert_eq!(config.name, "mailer");
/// assert_eq!(config.initial_capacity, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Label attached to every log event the queue emits.
    pub name: String,
    /// Number of backlog slots allocated up front.
    pub initial_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Parses and validates a config from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `json` is malformed or has fields of
    /// the wrong type, and [`ConfigError::EmptyName`] if `name` is blank.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyName`] if `name` is empty or whitespace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }

    /// Sets the queue name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of pre-allocated backlog slots.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

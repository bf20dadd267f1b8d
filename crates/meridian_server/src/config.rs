//! # Server Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid config.
//!
//! ```toml
//! workers = 4
//! max_observers = 500
//! view_distance = 8
//! spawn_point = { x = 0.0, y = 64.0, z = 0.0 }
//! max_catch_up_ticks = 20
//! ```
//!
//! The tick interval is NOT configurable; see [`TICK_INTERVAL`](crate::TICK_INTERVAL).

use std::path::Path;

use meridian_core::{EntityId, Vec3};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::{DEFAULT_WORKERS, MAX_OBSERVERS, MAX_VIEW_DISTANCE};

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Number of phase worker threads (the coordinator is extra).
    pub workers: usize,
    /// World capacity: maximum number of joined observers.
    pub max_observers: usize,
    /// Largest render distance an observer may use, in chunks.
    pub view_distance: u32,
    /// Where admitted observers appear.
    pub spawn_point: Vec3,
    /// Catch-up debt is clamped to this many ticks.
    pub max_catch_up_ticks: u32,
    /// Exclusive upper bound of the entity identifier space.
    pub id_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_observers: MAX_OBSERVERS,
            view_distance: 8,
            spawn_point: Vec3::new(0.0, 64.0, 0.0),
            max_catch_up_ticks: 20,
            id_limit: EntityId::LIMIT,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.max_observers == 0 {
            return Err(ConfigError::Invalid("max_observers must be at least 1".into()));
        }
        if !(1..=MAX_VIEW_DISTANCE).contains(&self.view_distance) {
            return Err(ConfigError::Invalid(format!(
                "view_distance must be in 1..={MAX_VIEW_DISTANCE}, got {}",
                self.view_distance
            )));
        }
        if self.max_catch_up_ticks == 0 {
            return Err(ConfigError::Invalid("max_catch_up_ticks must be at least 1".into()));
        }
        if self.id_limit == 0 || self.id_limit > EntityId::LIMIT {
            return Err(ConfigError::Invalid(format!(
                "id_limit must be in 1..={}, got {}",
                EntityId::LIMIT,
                self.id_limit
            )));
        }
        if (self.id_limit as usize) < self.max_observers {
            return Err(ConfigError::Invalid(
                "id_limit must leave room for every observer".into(),
            ));
        }
        Ok(())
    }

    /// Scheduler part of the config.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            workers: self.workers,
            max_catch_up_ticks: self.max_catch_up_ticks,
        }
    }
}

/// Settings for the [`Scheduler`](crate::Scheduler).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of phase worker threads.
    pub workers: usize,
    /// Catch-up debt clamp, in ticks.
    pub max_catch_up_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        ServerConfig::default().scheduler()
    }
}

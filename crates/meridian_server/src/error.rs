//! # Server Error Types
//!
//! Recoverable failures at the edges of the server: reading configuration
//! and starting threads. Contract violations inside a tick are not errors;
//! they panic.

use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or validating a [`ServerConfig`](crate::ServerConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for a server config.
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is syntactically fine but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors starting the tick scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A scheduler needs at least one worker to run phases.
    #[error("scheduler needs at least one worker thread")]
    NoWorkers,

    /// The operating system refused to start a worker.
    #[error("failed to spawn tick worker {index}: {source}")]
    Spawn {
        /// Index of the worker that failed.
        index: usize,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Top-level server error.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scheduler failure.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Any other I/O failure, such as starting a helper thread.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

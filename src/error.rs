//! Error types for pipeline setup
//!
//! Logging itself never fails from the producer's point of view; these errors
//! only come out of configuration, worker start-up and opening destinations.

use std::io;

/// Errors raised while configuring or starting the pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An IO error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A configuration value could not be used
    #[error("Invalid configuration value for {key}: {value:?}")]
    InvalidConfig {
        /// Configuration key
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// The consumer thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// The engine has been shut down
    #[error("Engine is shut down")]
    ShutDown,
}

/// Result type for pipeline setup operations
pub type Result<T> = std::result::Result<T, Error>;

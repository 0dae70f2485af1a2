//! # Harness Error Types

use thiserror::Error;

use tether_core::ResourceError;

/// Errors that can occur while configuring or running a stress run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// The configuration could not be parsed or is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("cannot read {path}: {reason}")]
    Io {
        /// Path that was read.
        path: String,
        /// OS reason.
        reason: String,
    },

    /// A native resource operation failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// One or more worker threads panicked.
    #[error("{count} worker(s) panicked")]
    WorkerPanicked {
        /// Number of workers that died.
        count: usize,
    },

    /// The final payload missed some mutations.
    #[error("lost updates: expected {expected}, observed {observed}")]
    LostUpdates {
        /// Number of mutations applied.
        expected: u64,
        /// Value read back afterwards.
        observed: u64,
    },

    /// A reader observed a half-applied mutation.
    #[error("{count} torn read(s) observed")]
    TornRead {
        /// Number of inconsistent observations.
        count: u64,
    },
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

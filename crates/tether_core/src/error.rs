//! # Resource Error Types
//!
//! Every failure a native resource can report while it is allocated, set up,
//! locked, released, or torn down.

use std::fmt;

use thiserror::Error;

/// Which side of a reader-writer lock an operation targeted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared (read) acquisition. Many holders allowed.
    Shared,
    /// Exclusive (write) acquisition. One holder, no readers.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Errors that can occur while owning a native resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Heap storage for the resource could not be obtained.
    #[error("allocation failed: {size} bytes with alignment {align}")]
    AllocationFailure {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// The setup callback refused to initialize the resource.
    #[error("resource setup failed: {0}")]
    SetupFailure(String),

    /// Lock acquisition failed at the platform level.
    #[error("{mode} acquisition failed: {reason}")]
    AcquireFailure {
        /// The mode that was requested.
        mode: LockMode,
        /// Platform reason.
        reason: String,
    },

    /// Releasing a held lock failed.
    #[error("{mode} release failed: {reason}")]
    ReleaseFailure {
        /// The mode that was held.
        mode: LockMode,
        /// Platform reason.
        reason: String,
    },

    /// The teardown callback reported an error.
    #[error("resource teardown failed: {0}")]
    TeardownFailure(String),
}

/// Result type for native resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

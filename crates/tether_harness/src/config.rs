//! # Stress Configuration
//!
//! Loaded once from TOML before a run. Every field is optional in the file;
//! missing fields take their [`Default`] value.
//!
//! ```toml
//! tasks = 10000
//! workers = 8
//! readers = 4
//! read_checks = 1000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Shape of a stress run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StressConfig {
    /// Number of independent mutation tasks submitted to the pool.
    pub tasks: usize,
    /// Worker threads draining the task queue.
    pub workers: usize,
    /// Reader threads observing the payload while tasks run.
    pub readers: usize,
    /// Observations made by each reader.
    pub read_checks: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            tasks: 10_000,
            workers: std::thread::available_parallelism().map_or(4, usize::from),
            readers: 4,
            read_checks: 1_000,
        }
    }
}

impl StressConfig {
    /// Small run for smoke tests: a few hundred tasks on two workers.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            tasks: 500,
            workers: 2,
            readers: 1,
            read_checks: 100,
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Config`] on malformed TOML, unknown keys, or values
    /// rejected by [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> HarnessResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| HarnessError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects runs that could never make progress.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Config`] if `tasks` or `workers` is zero.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.tasks == 0 {
            return Err(HarnessError::Config("tasks must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(HarnessError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

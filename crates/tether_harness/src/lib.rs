//! # TETHER Stress Harness
//!
//! Verification scaffolding for `tether_core`: a work pool that fans tasks out
//! over worker threads, and stress runs that hammer an `RwSynced` while
//! readers watch for lost updates or torn reads.
//!
//! ## Example
//!
//! ```rust
//! use tether_harness::{run_increment_stress, StressConfig};
//!
//! let report = run_increment_stress(&StressConfig::quick()).unwrap();
//! assert!(report.is_clean());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod pool;
pub mod stress;

pub use config::StressConfig;
pub use error::{HarnessError, HarnessResult};
pub use pool::WorkPool;
pub use stress::{run_increment_stress, run_pair_consistency, StressReport};

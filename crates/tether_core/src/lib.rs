//! # TETHER Core
//!
//! Safe ownership of native resources that must never move:
//! - One heap allocation per resource, written in place
//! - Explicit setup and teardown, each run exactly once
//! - A reader-writer synchronized value built on top
//!
//! ## Architecture Rules
//!
//! 1. **Stable addresses** - A resource keeps its address from setup to teardown
//! 2. **Cleanup on every path** - Storage is freed even when setup, teardown, or a caller panics
//! 3. **Guarded payloads** - Synchronized values are only touched under the lock
//!
//! ## Example
//!
//! ```rust
//! use tether_core::RwSynced;
//!
//! let hits = RwSynced::new(0u32).unwrap();
//! hits.apply(|n| *n += 1).unwrap();
//! assert_eq!(hits.read().unwrap(), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod sync;

pub use error::{LockMode, ResourceError, ResourceResult};
pub use memory::{CellBuilder, OwnedCell};
pub use sync::{NativeRwLock, ParkingRwLock, RwSynced, ScopedAcquire};

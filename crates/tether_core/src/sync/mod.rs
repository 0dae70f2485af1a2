//! # Synchronization Primitives
//!
//! Reader-writer guarded values whose lock is a native resource with a fixed
//! heap address.
//!
//! ## The Problem
//!
//! ```text
//! Thread 1..N:  apply(|n| *n += 1)   (read-modify-write)
//! Thread M:     read()
//!
//! Without a lock:          LOST UPDATES, TORN READS
//! Lock stored by value:    LOCK MOVES → UNDEFINED BEHAVIOUR
//! ```
//!
//! ## The Solution
//!
//! ```text
//! RwSynced
//!   ├── OwnedCell<L>  (lock produced, set up, torn down on the heap)
//!   └── value         (touched only under a ScopedAcquire)
//! ```

mod lock;
mod synced;

pub use lock::{NativeRwLock, ParkingRwLock, ScopedAcquire};
pub use synced::RwSynced;

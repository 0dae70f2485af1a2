//! # Memory Ownership
//!
//! Heap cells for resources that must keep one address for their whole life.
//!
//! ## Design Philosophy
//!
//! A native resource is allocated once and never relocated:
//! - Produced directly into its heap slot
//! - Set up and torn down exactly once
//! - Finalized and freed on every exit path

mod cell;

pub use cell::{CellBuilder, Hook, OwnedCell};

//! # Work Pool
//!
//! Runs a batch of independent tasks on a fixed set of worker threads and
//! joins them all before returning.
//!
//! ```text
//!   feed 0..N ──▶ [ bounded queue ] ──▶ worker 1 ─┐
//!                                  ├─▶ worker 2 ─┼─▶ join ─▶ result
//!                                  └─▶ worker W ─┘
//! ```
//!
//! The queue holds at most a few indices per worker, so memory stays flat
//! no matter how many tasks a batch has.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};

/// Queued task indices allowed per worker before the feeder blocks.
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Fixed-size pool of worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkPool {
    workers: usize,
}

impl WorkPool {
    /// Creates a pool with `workers` threads per batch.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "Worker count must be greater than zero");
        Self { workers }
    }

    /// Returns the number of worker threads.
    #[inline]
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job(i)` for every `i` in `0..tasks` and waits for all of them.
    ///
    /// Tasks run in no particular order. A failing task does not stop the
    /// others; the first error is returned once the batch has drained.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::WorkerPanicked`] if any task panicked. If every
    ///   worker panicked, the remaining tasks are never started.
    /// - The first error returned by `job`.
    pub fn perform<F>(&self, tasks: usize, job: F) -> HarnessResult<usize>
    where
        F: Fn(usize) -> HarnessResult<()> + Sync,
    {
        let completed = AtomicUsize::new(0);
        let first_error = Mutex::new(None);

        let panicked = thread::scope(|s| {
            let (tx, rx) = bounded(self.workers * QUEUE_DEPTH_PER_WORKER);

            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let rx = rx.clone();
                    let job = &job;
                    let completed = &completed;
                    let first_error = &first_error;
                    s.spawn(move || {
                        for index in rx.iter() {
                            match job(index) {
                                Ok(()) => {
                                    completed.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(err) => {
                                    first_error.lock().get_or_insert(err);
                                }
                            }
                        }
                    })
                })
                .collect();
            // Only workers hold receivers, so a send fails once all of them died.
            drop(rx);

            for index in 0..tasks {
                if tx.send(index).is_err() {
                    warn!(index, "no workers left to take tasks");
                    break;
                }
            }
            drop(tx);

            handles
                .into_iter()
                .map(thread::ScopedJoinHandle::join)
                .filter(|joined| joined.is_err())
                .count()
        });

        let completed = completed.into_inner();
        debug!(tasks, completed, workers = self.workers, "work batch joined");

        if panicked > 0 {
            warn!(panicked, "workers panicked during batch");
            return Err(HarnessError::WorkerPanicked { count: panicked });
        }
        if let Some(err) = first_error.into_inner() {
            return Err(err);
        }
        Ok(completed)
    }
}

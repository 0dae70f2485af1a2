//! # Stress Runs
//!
//! Drives an [`RwSynced`] with many concurrent mutations while readers
//! observe it, then checks that nothing was lost or torn.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tether_core::RwSynced;
use tracing::{debug, info};

use crate::config::StressConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::pool::WorkPool;

/// Outcome of one stress run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StressReport {
    /// Mutations submitted.
    pub expected: u64,
    /// Final value read back.
    pub observed: u64,
    /// Reader observations made while mutations ran.
    pub reads: u64,
    /// Observations that broke the payload's invariant.
    pub torn_reads: u64,
    /// Wall time from first submission to final read.
    pub elapsed: Duration,
}

impl StressReport {
    /// Returns whether every mutation landed and no read was torn.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.expected == self.observed && self.torn_reads == 0
    }

    /// Turns a dirty report into the matching error.
    ///
    /// # Errors
    ///
    /// [`HarnessError::LostUpdates`] before [`HarnessError::TornRead`].
    pub fn verify(&self) -> HarnessResult<()> {
        if self.expected != self.observed {
            return Err(HarnessError::LostUpdates {
                expected: self.expected,
                observed: self.observed,
            });
        }
        if self.torn_reads > 0 {
            return Err(HarnessError::TornRead {
                count: self.torn_reads,
            });
        }
        Ok(())
    }
}

/// Reader loop shared by both runs.
///
/// Makes up to `checks` observations, stopping early once `done` is set.
/// `consistent` sees this reader's previous observation and the current one.
fn observe<V: Clone>(
    synced: &RwSynced<V>,
    checks: usize,
    done: &AtomicBool,
    reads: &AtomicU64,
    torn: &AtomicU64,
    consistent: impl Fn(Option<&V>, &V) -> bool,
) -> HarnessResult<()> {
    let mut previous = None;
    for _ in 0..checks {
        if done.load(Ordering::Acquire) {
            break;
        }
        let current = synced.read()?;
        reads.fetch_add(1, Ordering::Relaxed);
        if !consistent(previous.as_ref(), &current) {
            torn.fetch_add(1, Ordering::Relaxed);
        }
        previous = Some(current);
        thread::yield_now();
    }
    Ok(())
}

/// Runs readers alongside a batch of mutation tasks.
fn run_with_readers<V>(
    config: &StressConfig,
    synced: &RwSynced<V>,
    mutate: impl Fn(&mut V) + Sync,
    consistent: impl Fn(Option<&V>, &V) -> bool + Sync,
) -> HarnessResult<(u64, u64)>
where
    V: Clone + Send + Sync,
{
    config.validate()?;
    let pool = WorkPool::new(config.workers);
    let done = AtomicBool::new(false);
    let reads = AtomicU64::new(0);
    let torn = AtomicU64::new(0);

    thread::scope(|s| {
        let (done, reads, torn, consistent) = (&done, &reads, &torn, &consistent);
        let readers: Vec<_> = (0..config.readers)
            .map(|_| {
                s.spawn(move || observe(synced, config.read_checks, done, reads, torn, consistent))
            })
            .collect();

        let written = pool.perform(config.tasks, |_| {
            synced.apply(&mutate)?;
            Ok(())
        });
        done.store(true, Ordering::Release);

        let mut panicked = 0;
        for reader in readers {
            match reader.join() {
                Ok(result) => result?,
                Err(_) => panicked += 1,
            }
        }
        if panicked > 0 {
            return Err(HarnessError::WorkerPanicked { count: panicked });
        }
        written.map(|_| ())
    })?;

    Ok((reads.into_inner(), torn.into_inner()))
}

/// Applies `config.tasks` concurrent increments to a counter starting at 0.
///
/// Each reader checks that the counter never goes backwards or past the
/// target.
///
/// # Errors
///
/// Lock failures and worker panics. Lost updates are reported in the
/// returned [`StressReport`], not as an error.
pub fn run_increment_stress(config: &StressConfig) -> HarnessResult<StressReport> {
    let expected = config.tasks as u64;
    let counter = RwSynced::new(0u64)?;
    let start = Instant::now();

    let (reads, torn_reads) = run_with_readers(
        config,
        &counter,
        |n| *n += 1,
        |previous, &n| n <= expected && previous.map_or(true, |&p| p <= n),
    )?;

    let observed = counter.read()?;
    let report = StressReport {
        expected,
        observed,
        reads,
        torn_reads,
        elapsed: start.elapsed(),
    };
    info!(
        expected,
        observed,
        reads,
        torn_reads,
        elapsed_ms = report.elapsed.as_millis(),
        "increment stress finished"
    );
    Ok(report)
}

/// Applies `config.tasks` two-step mutations to a pair that must stay equal.
///
/// Each mutation bumps the first half, yields, then bumps the second half.
/// Any reader seeing the halves differ has observed a partial mutation.
///
/// # Errors
///
/// Lock failures and worker panics.
pub fn run_pair_consistency(config: &StressConfig) -> HarnessResult<StressReport> {
    let expected = config.tasks as u64;
    let pair = RwSynced::new((0u64, 0u64))?;
    let start = Instant::now();

    let (reads, torn_reads) = run_with_readers(
        config,
        &pair,
        |(a, b)| {
            *a += 1;
            thread::yield_now();
            *b += 1;
        },
        |_, (a, b)| a == b,
    )?;

    let (a, b) = pair.read()?;
    debug!(a, b, "pair after run");
    let report = StressReport {
        expected,
        observed: if a == b { a } else { a.min(b) },
        reads,
        torn_reads,
        elapsed: start.elapsed(),
    };
    info!(
        expected,
        observed = report.observed,
        reads,
        torn_reads,
        elapsed_ms = report.elapsed.as_millis(),
        "pair consistency finished"
    );
    Ok(report)
}

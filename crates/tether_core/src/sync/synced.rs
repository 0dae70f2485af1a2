//! # Reader-Writer Synchronized Value
//!
//! A payload guarded by a native reader-writer lock that lives in an
//! [`OwnedCell`].

#![allow(unsafe_code)]
//!
//! ## Architecture
//!
//! ```text
//!        ┌────────────────────────────────────┐
//!        │            RwSynced<V, L>          │
//!        │                                    │
//!        │  ┌──────────────┐   ┌───────────┐  │
//!        │  │ OwnedCell<L> │   │ value: V  │  │
//!        │  └──────┬───────┘   └─────▲─────┘  │
//!        └─────────┼─────────────────┼────────┘
//!                  │ stable address  │
//!                  ▼                 │
//!            ┌───────────┐   guards  │
//!            │  heap: L  │ ──────────┘
//!            └───────────┘
//!                  │
//!        ┌─────────┴──────────┐
//!        ▼                    ▼
//!   read / with_read        apply
//!   (shared, parallel)      (exclusive, serialized)
//! ```
//!
//! ## Thread Safety
//!
//! - `read` / `with_read`: any number at once, never alongside `apply`
//! - `apply`: one at a time, never alongside a reader
//! - There is no unguarded path to the payload while it is shared

use std::cell::UnsafeCell;
use std::fmt;

use super::lock::{NativeRwLock, ParkingRwLock, ScopedAcquire};
use crate::error::{LockMode, ResourceResult};
use crate::memory::OwnedCell;

/// A value guarded by a reader-writer lock with a stable heap address.
///
/// The lock is produced, set up, and torn down by the [`OwnedCell`] it lives
/// in; it is torn down only when the `RwSynced` itself is dropped.
///
/// Locks are not reentrant: calling `read` or `apply` on the same value from
/// inside an `apply` closure deadlocks.
///
/// ## Usage
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use tether_core::RwSynced;
///
/// let counter = Arc::new(RwSynced::new(0u64).unwrap());
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let counter = Arc::clone(&counter);
///         thread::spawn(move || {
///             for _ in 0..100 {
///                 counter.apply(|n| *n += 1).unwrap();
///             }
///         })
///     })
///     .collect();
///
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert_eq!(counter.read().unwrap(), 400);
/// ```
pub struct RwSynced<V, L: NativeRwLock = ParkingRwLock> {
    lock: OwnedCell<L>,
    value: UnsafeCell<V>,
}

impl<V> RwSynced<V> {
    /// Creates a value guarded by a [`ParkingRwLock`].
    ///
    /// # Errors
    ///
    /// Propagates allocation or setup failure of the lock. No value exists in
    /// that case.
    pub fn new(initial: V) -> ResourceResult<Self> {
        Self::with_lock(initial)
    }
}

impl<V, L: NativeRwLock> RwSynced<V, L> {
    /// Creates a value guarded by a lock of type `L`.
    ///
    /// # Errors
    ///
    /// Propagates allocation or setup failure of the lock. The lock is not
    /// torn down when its setup failed.
    pub fn with_lock(initial: V) -> ResourceResult<Self> {
        let lock = OwnedCell::builder(L::init)
            .set_up(L::set_up)
            .tear_down(L::tear_down)
            .build()?;
        Ok(Self {
            lock,
            value: UnsafeCell::new(initial),
        })
    }

    /// Returns a copy of the current payload.
    ///
    /// # Errors
    ///
    /// Propagates a shared acquisition failure.
    pub fn read(&self) -> ResourceResult<V>
    where
        V: Clone,
    {
        self.with_read(V::clone)
    }

    /// Runs `observe` against the payload under a shared acquisition.
    ///
    /// # Errors
    ///
    /// Propagates a shared acquisition failure; `observe` is not called.
    pub fn with_read<R>(&self, observe: impl FnOnce(&V) -> R) -> ResourceResult<R> {
        let _guard = ScopedAcquire::acquire(self.lock.get(), LockMode::Shared)?;
        // SAFETY: a shared acquisition is held, so no `&mut V` exists.
        let value = unsafe { &*self.value.get() };
        Ok(observe(value))
    }

    /// Runs `mutation` against the payload under an exclusive acquisition.
    ///
    /// The lock is released however `mutation` ends. If it panics, the payload
    /// keeps whatever partial changes were made before the panic.
    ///
    /// # Errors
    ///
    /// Propagates an exclusive acquisition failure; `mutation` is not called.
    pub fn apply<R>(&self, mutation: impl FnOnce(&mut V) -> R) -> ResourceResult<R> {
        let _guard = ScopedAcquire::acquire(self.lock.get(), LockMode::Exclusive)?;
        // SAFETY: the exclusive acquisition rules out every other reference.
        let value = unsafe { &mut *self.value.get() };
        Ok(mutation(value))
    }

    /// Consumes the holder, tearing down its lock and returning the payload.
    pub fn into_inner(self) -> V {
        let Self { lock, value } = self;
        drop(lock);
        value.into_inner()
    }
}

impl<V, L: NativeRwLock> fmt::Debug for RwSynced<V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwSynced")
            .field("lock", &self.lock.as_ptr())
            .finish_non_exhaustive()
    }
}

// SAFETY: readers share `&V` across threads (needs `Sync`) and `apply` hands
// `&mut V` to whichever thread holds the exclusive lock (needs `Send`).
unsafe impl<V: Send + Sync, L: NativeRwLock> Sync for RwSynced<V, L> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceError;
    use std::panic::{self, AssertUnwindSafe};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lock whose setup always fails. Counts teardowns.
    struct RefusingLock(ParkingRwLock);

    static REFUSING_TEAR_DOWNS: AtomicUsize = AtomicUsize::new(0);

    unsafe impl NativeRwLock for RefusingLock {
        fn init() -> Self {
            Self(ParkingRwLock::init())
        }

        fn set_up(self: Pin<&mut Self>) -> ResourceResult<()> {
            Err(ResourceError::SetupFailure("platform refused".to_string()))
        }

        fn acquire(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()> {
            self.inner().acquire(mode)
        }

        unsafe fn release(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()> {
            unsafe { self.inner().release(mode) }
        }

        fn tear_down(self: Pin<&mut Self>) -> ResourceResult<()> {
            REFUSING_TEAR_DOWNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl RefusingLock {
        fn inner(self: Pin<&Self>) -> Pin<&ParkingRwLock> {
            // SAFETY: the inner lock is structurally pinned.
            unsafe { self.map_unchecked(|outer| &outer.0) }
        }
    }

    /// Lock that sets up fine but refuses exclusive acquisition.
    struct ReadOnlyLock(ParkingRwLock);

    unsafe impl NativeRwLock for ReadOnlyLock {
        fn init() -> Self {
            Self(ParkingRwLock::init())
        }

        fn set_up(self: Pin<&mut Self>) -> ResourceResult<()> {
            // SAFETY: the inner lock is structurally pinned.
            unsafe { self.map_unchecked_mut(|outer| &mut outer.0) }.set_up()
        }

        fn acquire(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()> {
            if mode == LockMode::Exclusive {
                return Err(ResourceError::AcquireFailure {
                    mode,
                    reason: "read-only".to_string(),
                });
            }
            // SAFETY: the inner lock is structurally pinned.
            unsafe { self.map_unchecked(|outer| &outer.0) }.acquire(mode)
        }

        unsafe fn release(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()> {
            unsafe { self.map_unchecked(|outer| &outer.0).release(mode) }
        }

        fn tear_down(self: Pin<&mut Self>) -> ResourceResult<()> {
            // SAFETY: the inner lock is structurally pinned.
            unsafe { self.map_unchecked_mut(|outer| &mut outer.0) }.tear_down()
        }
    }

    #[test]
    fn test_read_and_apply() {
        let synced = RwSynced::new(10i32).unwrap();

        assert_eq!(synced.read().unwrap(), 10);
        synced.apply(|v| *v *= 3).unwrap();
        assert_eq!(synced.read().unwrap(), 30);
    }

    #[test]
    fn test_apply_returns_closure_result() {
        let synced = RwSynced::new(vec![1, 2, 3]).unwrap();

        let popped = synced.apply(Vec::pop).unwrap();

        assert_eq!(popped, Some(3));
        assert_eq!(synced.with_read(Vec::len).unwrap(), 2);
    }

    #[test]
    fn test_with_read_non_clone_payload() {
        struct Opaque(u8);

        let synced = RwSynced::new(Opaque(9)).unwrap();

        assert_eq!(synced.with_read(|o| o.0).unwrap(), 9);
    }

    #[test]
    fn test_panicking_apply_releases_lock() {
        let synced = RwSynced::new((0u32, 0u32)).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            synced
                .apply(|pair| {
                    pair.0 = 1;
                    panic!("mutation aborted halfway");
                })
                .unwrap();
        }));
        assert!(outcome.is_err());

        // Partial write is kept, and the lock is free again.
        assert_eq!(synced.read().unwrap(), (1, 0));
        synced.apply(|pair| pair.1 = 1).unwrap();
        assert_eq!(synced.read().unwrap(), (1, 1));
    }

    #[test]
    fn test_panicking_read_releases_lock() {
        struct FailingCopy(u32);

        impl Clone for FailingCopy {
            fn clone(&self) -> Self {
                panic!("copy failed");
            }
        }

        let synced = RwSynced::new(FailingCopy(4)).unwrap();

        let copied = panic::catch_unwind(AssertUnwindSafe(|| synced.read()));
        assert!(copied.is_err());
        assert_eq!(synced.apply(|v| v.0 + 1).unwrap(), 5);

        let observed = panic::catch_unwind(AssertUnwindSafe(|| {
            synced.with_read(|_| panic!("observer failed"))
        }));
        assert!(observed.is_err());
        assert_eq!(synced.apply(|v| v.0 * 2).unwrap(), 8);
    }

    #[test]
    fn test_set_up_failure_returns_no_value() {
        let result = RwSynced::<u64, RefusingLock>::with_lock(0);

        assert_eq!(
            result.err(),
            Some(ResourceError::SetupFailure("platform refused".to_string()))
        );
        assert_eq!(REFUSING_TEAR_DOWNS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_acquire_failure_propagates() {
        let synced = RwSynced::<u64, ReadOnlyLock>::with_lock(5).unwrap();
        let mut called = false;

        let result = synced.apply(|v| {
            called = true;
            *v += 1;
        });

        assert!(matches!(
            result,
            Err(ResourceError::AcquireFailure {
                mode: LockMode::Exclusive,
                ..
            })
        ));
        assert!(!called);
        assert_eq!(synced.read().unwrap(), 5);
    }

    #[test]
    fn test_into_inner() {
        let synced = RwSynced::new(String::from("payload")).unwrap();
        synced.apply(|s| s.push_str("!")).unwrap();

        assert_eq!(synced.into_inner(), "payload!");
    }

    #[test]
    fn test_debug_hides_payload() {
        let synced = RwSynced::new("secret").unwrap();
        let text = format!("{synced:?}");

        assert!(text.starts_with("RwSynced"));
        assert!(!text.contains("secret"));
    }
}

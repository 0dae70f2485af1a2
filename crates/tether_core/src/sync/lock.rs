//! # Native Reader-Writer Locks
//!
//! The contract a lock resource must meet to guard an [`RwSynced`] value,
//! the default implementation on top of `parking_lot`, and the scoped guard
//! that releases on every exit path.
//!
//! [`RwSynced`]: super::RwSynced

#![allow(unsafe_code)]

use std::marker::{PhantomData, PhantomPinned};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::lock_api::RawRwLock as _;
use parking_lot::RawRwLock;
use tracing::{debug, error};

use crate::error::{LockMode, ResourceError, ResourceResult};

/// A reader-writer lock resource with explicit setup and teardown.
///
/// Every method after [`init`](Self::init) receives the pinned, stable
/// address of the lock.
///
/// # Safety
///
/// Implementors must provide reader-writer exclusion: while an exclusive
/// acquisition is held, `acquire` for either mode must not return `Ok` on any
/// thread, and while any shared acquisition is held, an exclusive `acquire`
/// must not return `Ok`.
pub unsafe trait NativeRwLock: Send + Sync + Sized + 'static {
    /// Produces an unlocked, not yet set up lock value.
    fn init() -> Self;

    /// Prepares the lock at its final address.
    ///
    /// # Errors
    ///
    /// [`ResourceError::SetupFailure`] if the platform refuses the lock.
    fn set_up(self: Pin<&mut Self>) -> ResourceResult<()>;

    /// Blocks until the lock is held in `mode`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::AcquireFailure`] if the platform rejects the request.
    fn acquire(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()>;

    /// Releases one acquisition held in `mode`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::ReleaseFailure`] if the platform rejects the release.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock in `mode` from a matching
    /// successful [`acquire`](Self::acquire).
    unsafe fn release(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()>;

    /// Finalizes the lock before its storage is freed.
    ///
    /// # Errors
    ///
    /// [`ResourceError::TeardownFailure`] if the lock cannot be finalized.
    fn tear_down(self: Pin<&mut Self>) -> ResourceResult<()>;
}

/// Reader-writer lock backed by [`parking_lot::RawRwLock`].
///
/// Tracks its own lifecycle so misuse is reported instead of silently
/// accepted: acquiring before setup or after teardown fails, and tearing down
/// a held lock fails.
pub struct ParkingRwLock {
    raw: RawRwLock,
    ready: AtomicBool,
    _pinned: PhantomPinned,
}

impl ParkingRwLock {
    /// Returns whether the lock has been set up and not yet torn down.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns whether any acquisition is currently held.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

// SAFETY: exclusion is delegated to `parking_lot::RawRwLock`.
unsafe impl NativeRwLock for ParkingRwLock {
    fn init() -> Self {
        Self {
            raw: RawRwLock::INIT,
            ready: AtomicBool::new(false),
            _pinned: PhantomPinned,
        }
    }

    fn set_up(self: Pin<&mut Self>) -> ResourceResult<()> {
        if self.ready.swap(true, Ordering::AcqRel) {
            return Err(ResourceError::SetupFailure(
                "lock is already set up".to_string(),
            ));
        }
        debug!(address = ?std::ptr::from_ref(&*self), "rw lock set up");
        Ok(())
    }

    fn acquire(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()> {
        if !self.is_ready() {
            return Err(ResourceError::AcquireFailure {
                mode,
                reason: "lock is not set up".to_string(),
            });
        }
        match mode {
            LockMode::Shared => self.raw.lock_shared(),
            LockMode::Exclusive => self.raw.lock_exclusive(),
        }
        Ok(())
    }

    unsafe fn release(self: Pin<&Self>, mode: LockMode) -> ResourceResult<()> {
        match mode {
            // SAFETY: the caller holds a shared acquisition.
            LockMode::Shared => unsafe { self.raw.unlock_shared() },
            // SAFETY: the caller holds the exclusive acquisition.
            LockMode::Exclusive => unsafe { self.raw.unlock_exclusive() },
        }
        Ok(())
    }

    fn tear_down(self: Pin<&mut Self>) -> ResourceResult<()> {
        if self.raw.is_locked() {
            return Err(ResourceError::TeardownFailure(
                "lock is still held".to_string(),
            ));
        }
        if !self.ready.swap(false, Ordering::AcqRel) {
            return Err(ResourceError::TeardownFailure(
                "lock was never set up".to_string(),
            ));
        }
        debug!(address = ?std::ptr::from_ref(&*self), "rw lock torn down");
        Ok(())
    }
}

/// Holds one acquisition of a [`NativeRwLock`] and releases it on drop.
///
/// Release happens however the protected section ends: normal return, `?`,
/// or unwinding. Not `Send`: the acquisition is released on the thread that
/// made it.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedAcquire<'a, L: NativeRwLock> {
    lock: Pin<&'a L>,
    mode: LockMode,
    _not_send: PhantomData<*const ()>,
}

impl<'a, L: NativeRwLock> ScopedAcquire<'a, L> {
    /// Blocks until `lock` is held in `mode`.
    ///
    /// # Errors
    ///
    /// Propagates the lock's acquisition error. No guard exists in that case,
    /// so nothing is released.
    pub fn acquire(lock: Pin<&'a L>, mode: LockMode) -> ResourceResult<Self> {
        lock.acquire(mode)?;
        Ok(Self {
            lock,
            mode,
            _not_send: PhantomData,
        })
    }

    /// The mode this guard holds.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl<L: NativeRwLock> Drop for ScopedAcquire<'_, L> {
    fn drop(&mut self) {
        // SAFETY: the guard exists only after a successful acquire in `mode`,
        // and releases it exactly once here.
        if let Err(err) = unsafe { self.lock.release(self.mode) } {
            error!(mode = %self.mode, %err, "lock release failed");
        }
    }
}

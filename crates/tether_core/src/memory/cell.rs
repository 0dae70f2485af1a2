//! # Owned Resource Cell
//!
//! Heap ownership for native resources that must never move.
//!
//! ## Safety Note
//!
//! This module allocates and frees raw storage by hand so the resource is
//! written straight into its final address. Every unsafe block states the
//! invariant it relies on.

#![allow(unsafe_code)]
//!
//! ## Lifecycle
//!
//! ```text
//!   builder(producer)
//!         │
//!         ▼
//!   ┌───────────┐  reserve   ┌───────────┐  producer()  ┌───────────┐
//!   │  (none)   │ ─────────▶ │ Reserved  │ ───────────▶ │  Filled   │
//!   └───────────┘            └───────────┘              └─────┬─────┘
//!                                                             │ set_up(addr)
//!                                     Err ◀───────────────────┤
//!                              (finalize + free,              ▼
//!                               no teardown)           ┌────────────┐
//!                                                      │   Ready    │
//!                                                      └─────┬──────┘
//!                                                            │ drop / close
//!                                            tear_down(addr) ▼
//!                                         finalize ─▶ free ─▶ (gone)
//! ```
//!
//! Only `Ready` is ever observable from outside the builder.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::pin::Pin;
use std::ptr::{self, NonNull};

use tracing::{debug, error, warn};

use crate::error::{ResourceError, ResourceResult};

/// Callback run against the pinned resource during setup or teardown.
pub type Hook<T> = Box<dyn FnOnce(Pin<&mut T>) -> ResourceResult<()> + Send>;

/// Releases the storage behind a slot pointer when dropped.
struct FreeOnDrop<T>(NonNull<T>);

impl<T> Drop for FreeOnDrop<T> {
    fn drop(&mut self) {
        let layout = Layout::new::<T>();
        if layout.size() != 0 {
            // SAFETY: the pointer came from `alloc::alloc` with this exact layout
            // in `Slot::reserve` and is freed only here.
            unsafe { alloc::dealloc(self.0.as_ptr().cast(), layout) };
        }
    }
}

/// Heap storage for exactly one `T`.
///
/// Frees its storage on drop, finalizing the value first if one was written.
struct Slot<T> {
    ptr: NonNull<T>,
    filled: bool,
}

impl<T> Slot<T> {
    fn reserve() -> ResourceResult<Self> {
        let layout = Layout::new::<T>();
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // SAFETY: layout has a non-zero size.
            let raw = unsafe { alloc::alloc(layout) }.cast::<T>();
            NonNull::new(raw).ok_or(ResourceError::AllocationFailure {
                size: layout.size(),
                align: layout.align(),
            })?
        };
        Ok(Self { ptr, filled: false })
    }

    fn fill(&mut self, value: T) {
        debug_assert!(!self.filled, "slot filled twice");
        // SAFETY: `ptr` is aligned and valid for writes of one `T`, and holds
        // no live value yet.
        unsafe { self.ptr.as_ptr().write(value) };
        self.filled = true;
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        // Storage is freed even if finalizing the value panics.
        let _free = FreeOnDrop(self.ptr);
        if self.filled {
            self.filled = false;
            // SAFETY: the value was written by `fill` and has not been dropped.
            unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
        }
    }
}

/// Sole owner of one heap-allocated resource with a fixed address.
///
/// The resource is produced directly into heap storage, optionally set up,
/// and torn down exactly once before it is finalized and freed. The cell is
/// neither `Clone` nor `Copy`; moving the cell moves the pointer, never the
/// resource.
///
/// ## Usage
///
/// ```rust
/// use tether_core::OwnedCell;
///
/// let cell = OwnedCell::builder(|| [0u64; 4])
///     .set_up(|mut words| {
///         words[0] = 7;
///         Ok(())
///     })
///     .tear_down(|_| Ok(()))
///     .build()
///     .unwrap();
///
/// let addr = cell.as_ptr();
/// assert_eq!(cell[0], 7);
/// assert_eq!(cell.as_ptr(), addr);
/// ```
pub struct OwnedCell<T> {
    tear_down: Option<Hook<T>>,
    slot: Slot<T>,
    _owns: PhantomData<T>,
}

impl<T> OwnedCell<T> {
    /// Creates a cell with no setup or teardown.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::AllocationFailure`] if storage cannot be
    /// obtained. The producer is not called in that case.
    pub fn new<P>(producer: P) -> ResourceResult<Self>
    where
        P: FnOnce() -> T,
    {
        Self::builder(producer).build()
    }

    /// Starts building a cell whose initial value comes from `producer`.
    #[must_use]
    pub fn builder<P>(producer: P) -> CellBuilder<T, P>
    where
        P: FnOnce() -> T,
    {
        CellBuilder {
            producer,
            set_up: None,
            tear_down: None,
        }
    }

    /// Returns the stable address of the owned resource.
    ///
    /// Identical for every call over the cell's lifetime. Dangling once the
    /// cell is dropped.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<T> {
        self.slot.ptr
    }

    /// Shared, pinned access to the resource.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Pin<&T> {
        // SAFETY: the slot holds an initialized value for as long as `self`
        // lives, and the value is never moved before it is dropped in place.
        unsafe { Pin::new_unchecked(&*self.slot.ptr.as_ptr()) }
    }

    /// Exclusive, pinned access to the resource.
    #[inline]
    pub fn get_mut(&mut self) -> Pin<&mut T> {
        // SAFETY: `&mut self` guarantees uniqueness; pinning holds as in `get`.
        unsafe { Pin::new_unchecked(&mut *self.slot.ptr.as_ptr()) }
    }

    /// Returns whether a teardown action is still pending.
    #[inline]
    #[must_use]
    pub fn has_tear_down(&self) -> bool {
        self.tear_down.is_some()
    }

    /// Destroys the cell, reporting the teardown result.
    ///
    /// The value is finalized and its storage freed whatever teardown returns.
    ///
    /// # Errors
    ///
    /// Returns whatever error the teardown action reported.
    pub fn close(mut self) -> ResourceResult<()> {
        self.run_tear_down()
    }

    fn run_tear_down(&mut self) -> ResourceResult<()> {
        let Some(tear_down) = self.tear_down.take() else {
            return Ok(());
        };
        debug!(
            resource = std::any::type_name::<T>(),
            address = ?self.slot.ptr,
            "tearing down owned resource"
        );
        tear_down(self.get_mut())
    }
}

impl<T> Drop for OwnedCell<T> {
    fn drop(&mut self) {
        if let Err(err) = self.run_tear_down() {
            error!(
                resource = std::any::type_name::<T>(),
                address = ?self.slot.ptr,
                %err,
                "teardown failed during drop"
            );
        }
        // `slot` finalizes and frees after this, even if teardown panicked.
    }
}

impl<T> Deref for OwnedCell<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.get().get_ref()
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedCell")
            .field("address", &self.slot.ptr)
            .field("value", &**self)
            .field("has_tear_down", &self.has_tear_down())
            .finish()
    }
}

// SAFETY: the cell owns its `T` uniquely, and the teardown hook is `Send`.
unsafe impl<T: Send> Send for OwnedCell<T> {}
// SAFETY: `&OwnedCell<T>` only hands out `&T`; the hook is reachable only
// through `&mut self`.
unsafe impl<T: Sync> Sync for OwnedCell<T> {}

/// Declares how an [`OwnedCell`] is produced, set up, and torn down.
#[must_use = "a builder does nothing until `build` is called"]
pub struct CellBuilder<T, P> {
    producer: P,
    set_up: Option<Hook<T>>,
    tear_down: Option<Hook<T>>,
}

impl<T, P> CellBuilder<T, P>
where
    P: FnOnce() -> T,
{
    /// Action run once with the pinned resource right after it is produced.
    pub fn set_up<F>(mut self, set_up: F) -> Self
    where
        F: FnOnce(Pin<&mut T>) -> ResourceResult<()> + Send + 'static,
    {
        self.set_up = Some(Box::new(set_up));
        self
    }

    /// Action run once with the pinned resource before it is finalized.
    pub fn tear_down<F>(mut self, tear_down: F) -> Self
    where
        F: FnOnce(Pin<&mut T>) -> ResourceResult<()> + Send + 'static,
    {
        self.tear_down = Some(Box::new(tear_down));
        self
    }

    /// Allocates, produces, and sets up the resource.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::AllocationFailure`] if storage cannot be obtained.
    /// - Any error from the setup action. The value is finalized and freed,
    ///   and the teardown action is dropped without running.
    pub fn build(self) -> ResourceResult<OwnedCell<T>> {
        let Self {
            producer,
            set_up,
            tear_down,
        } = self;

        let mut slot = Slot::reserve()?;
        slot.fill(producer());

        let mut cell = OwnedCell {
            tear_down: None,
            slot,
            _owns: PhantomData,
        };

        if let Some(set_up) = set_up {
            if let Err(err) = set_up(cell.get_mut()) {
                warn!(
                    resource = std::any::type_name::<T>(),
                    %err,
                    "setup failed, releasing resource without teardown"
                );
                return Err(err);
            }
        }

        cell.tear_down = tear_down;
        debug!(
            resource = std::any::type_name::<T>(),
            address = ?cell.slot.ptr,
            "owned resource ready"
        );
        Ok(cell)
    }
}

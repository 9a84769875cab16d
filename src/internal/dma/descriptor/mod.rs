//! Transfer control descriptors.
//!
//! A TCD lives in two places: in descriptor memory, where the compiler writes
//! it and the engine fetches it on a scatter-gather load, and in the
//! channel's live register block. [`Tcd`] is the in-memory form,
//! [`TcdImage`] a plain value copy used to move a descriptor between the two.

pub mod bits;
pub mod tcd;

pub use tcd::{Tcd, TcdImage};

/// Volatile cell wrapper for descriptor fields
///
/// Ensures all accesses are volatile so the compiler neither caches nor
/// reorders descriptor field accesses the DMA engine may observe.
#[repr(transparent)]
pub(crate) struct VolatileCell<T: Copy> {
    value: core::cell::UnsafeCell<T>,
}

// Safety: descriptor fields are at most 32 bits wide and naturally aligned,
// so every volatile access is a single bus transaction.
unsafe impl<T: Copy> Sync for VolatileCell<T> {}

impl<T: Copy> VolatileCell<T> {
    /// Create a new volatile cell with the given initial value
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self {
            value: core::cell::UnsafeCell::new(value),
        }
    }

    /// Read the value (volatile read)
    #[inline(always)]
    pub fn get(&self) -> T {
        unsafe { core::ptr::read_volatile(self.value.get()) }
    }

    /// Write a value (volatile write)
    #[inline(always)]
    pub fn set(&self, value: T) {
        unsafe { core::ptr::write_volatile(self.value.get(), value) }
    }

    /// Update the value using a function (read-modify-write)
    #[inline(always)]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let old = self.get();
        self.set(f(old));
    }
}

impl<T: Copy + Default> Default for VolatileCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

//! System-wide resource registry collaborator.

use core::ops::Range;

use crate::driver::error::Result;

/// A reservation returned by [`ResourceRegistry::reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResourceHandle {
    /// First reserved value
    pub start: u32,
    /// Number of consecutive values reserved
    pub count: u32,
}

/// Allocator of exclusive integer ranges shared by every process.
///
/// Exclusivity between concurrent callers, in this process or any other,
/// is the implementation's responsibility. The engine relies on it for
/// channel ownership and takes no lock of its own for this step.
pub trait ResourceRegistry {
    /// Reserve `count` consecutive free values inside `range`.
    ///
    /// Fails with [`ResourceError::NoFreeChannel`] when no such run is free.
    ///
    /// [`ResourceError::NoFreeChannel`]: crate::ResourceError::NoFreeChannel
    fn reserve(&self, range: Range<u32>, count: u32) -> Result<ResourceHandle>;

    /// Return a reservation to the registry
    fn release(&self, handle: ResourceHandle);
}

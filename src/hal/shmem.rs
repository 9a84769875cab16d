//! Named process-shared memory collaborator.

use core::ptr::NonNull;

use crate::driver::error::Result;

/// A mapping of a named shared memory object.
#[derive(Debug)]
pub struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    created: bool,
}

impl SharedRegion {
    /// Describe a mapped shared object.
    ///
    /// # Safety
    ///
    /// `ptr` must be aligned to at least 8 bytes and point to `len` bytes
    /// mapped shared between processes, zero-filled when first created, and
    /// valid until the region is passed to [`SharedMemory::close`].
    pub const unsafe fn new(ptr: NonNull<u8>, len: usize, created: bool) -> Self {
        Self { ptr, len, created }
    }

    /// Start of the mapping
    #[inline(always)]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Mapping length in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for an empty mapping
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this call created the object (and so must initialize it)
    #[inline(always)]
    pub fn created(&self) -> bool {
        self.created
    }
}

// SAFETY: the region only describes a shared mapping; all access to its
// contents goes through atomics in `sync::coordination`.
unsafe impl Send for SharedRegion {}
// SAFETY: see above.
unsafe impl Sync for SharedRegion {}

/// Create-or-open named shared memory.
pub trait SharedMemory {
    /// Open `name`, creating it with `len` zeroed bytes if it does not exist
    fn open_or_create(&self, name: &str, len: usize) -> Result<SharedRegion>;

    /// Unmap a region. The object itself persists for other processes.
    fn close(&self, region: SharedRegion);
}

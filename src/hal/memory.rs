//! Physical memory collaborator.
//!
//! Maps controller register windows into the process and hands out
//! uncached, physically contiguous memory for descriptors and client
//! buffers.

use core::ptr::NonNull;

use crate::driver::error::Result;

/// Width-specific access to a mapped register window.
///
/// Offsets are byte offsets from the start of the window. Implementations
/// for real hardware perform volatile accesses; test doubles may emulate
/// side effects such as write-1-to-clear.
pub trait RegisterIo {
    /// Read a 32-bit register
    fn read32(&self, offset: usize) -> u32;

    /// Write a 32-bit register
    fn write32(&self, offset: usize, value: u32);

    /// Read a 16-bit register
    fn read16(&self, offset: usize) -> u16;

    /// Write a 16-bit register
    fn write16(&self, offset: usize, value: u16);

    /// Read an 8-bit register
    fn read8(&self, offset: usize) -> u8;

    /// Write an 8-bit register
    fn write8(&self, offset: usize, value: u8);
}

/// A block of DMA-visible memory.
///
/// `virt` is where the CPU sees the memory, `phys` where the DMA engine
/// does. The block is physically contiguous, so any byte at offset `n` has
/// physical address `phys + n`.
#[derive(Debug)]
pub struct DmaRegion {
    virt: NonNull<u8>,
    phys: u64,
    len: usize,
}

impl DmaRegion {
    /// Describe an allocated region.
    ///
    /// # Safety
    ///
    /// `virt` must point to `len` bytes of zero-initialized, uncached memory
    /// that stays mapped until the region is handed back to
    /// [`PhysMapper::free_dma`], and `phys` must be its bus address.
    pub const unsafe fn new(virt: NonNull<u8>, phys: u64, len: usize) -> Self {
        Self { virt, phys, len }
    }

    /// CPU-side address
    #[inline(always)]
    pub fn virt(&self) -> NonNull<u8> {
        self.virt
    }

    /// Bus address seen by the DMA engine
    #[inline(always)]
    pub fn phys(&self) -> u64 {
        self.phys
    }

    /// Length in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length region
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical address of the byte at `offset`, if inside the region
    pub fn phys_at(&self, offset: usize) -> Option<u64> {
        (offset < self.len).then(|| self.phys + offset as u64)
    }
}

// SAFETY: a DmaRegion is a plain description of memory owned by whoever
// holds the region; moving it between threads moves that ownership.
unsafe impl Send for DmaRegion {}

/// Physical memory mapper.
pub trait PhysMapper {
    /// Register window produced by [`map_window`](Self::map_window)
    type Window: RegisterIo;

    /// Map `len` bytes of device registers at physical address `phys`
    fn map_window(&self, phys: u64, len: usize) -> Result<Self::Window>;

    /// Unmap a window obtained from [`map_window`](Self::map_window)
    fn unmap_window(&self, window: Self::Window);

    /// Allocate `len` bytes of zeroed, uncached, physically contiguous memory
    fn alloc_dma(&self, len: usize) -> Result<DmaRegion>;

    /// Return memory obtained from [`alloc_dma`](Self::alloc_dma)
    fn free_dma(&self, region: DmaRegion);
}

//! Memory-mapped register access for the eDMA and DMAMUX blocks
//!
//! The register blocks are not at fixed addresses: the host maps them at
//! engine initialization and hands back a window. [`MmioWindow`] is the
//! volatile window used on hardware; the typed views in [`edma`] and
//! [`dmamux`] work over any [`RegisterIo`].

pub mod dmamux;
pub mod edma;

use core::ptr::NonNull;

use crate::hal::RegisterIo;

/// Read a register of width `T` at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn read_reg<T: Copy>(addr: *const T) -> T {
    unsafe { core::ptr::read_volatile(addr) }
}

/// Write a register of width `T` at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn write_reg<T: Copy>(addr: *mut T, value: T) {
    unsafe { core::ptr::write_volatile(addr, value) }
}

/// A mapped register window accessed with volatile loads and stores.
#[derive(Debug)]
pub struct MmioWindow {
    base: NonNull<u8>,
    len: usize,
}

impl MmioWindow {
    /// Wrap a mapping of device registers.
    ///
    /// # Safety
    ///
    /// `base` must be the start of a device mapping of at least `len` bytes
    /// that stays valid for the lifetime of the window.
    pub const unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Start of the mapping
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Mapping length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for an empty mapping
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    fn at<T>(&self, offset: usize) -> *mut T {
        debug_assert!(offset + core::mem::size_of::<T>() <= self.len);
        debug_assert!(offset % core::mem::align_of::<T>() == 0);
        // SAFETY: offset is inside the mapping (checked in debug builds)
        unsafe { self.base.as_ptr().add(offset).cast::<T>() }
    }
}

impl RegisterIo for MmioWindow {
    #[inline(always)]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: the window maps valid device memory
        unsafe { read_reg(self.at::<u32>(offset)) }
    }

    #[inline(always)]
    fn write32(&self, offset: usize, value: u32) {
        // SAFETY: the window maps valid device memory
        unsafe { write_reg(self.at::<u32>(offset), value) }
    }

    #[inline(always)]
    fn read16(&self, offset: usize) -> u16 {
        // SAFETY: the window maps valid device memory
        unsafe { read_reg(self.at::<u16>(offset)) }
    }

    #[inline(always)]
    fn write16(&self, offset: usize, value: u16) {
        // SAFETY: the window maps valid device memory
        unsafe { write_reg(self.at::<u16>(offset), value) }
    }

    #[inline(always)]
    fn read8(&self, offset: usize) -> u8 {
        // SAFETY: the window maps valid device memory
        unsafe { read_reg(self.at::<u8>(offset)) }
    }

    #[inline(always)]
    fn write8(&self, offset: usize, value: u8) {
        // SAFETY: the window maps valid device memory
        unsafe { write_reg(self.at::<u8>(offset), value) }
    }
}

// SAFETY: registers are hardware; concurrent access is arbitrated by the
// eDMA's set/clear-by-index registers and the per-controller lock.
unsafe impl Send for MmioWindow {}
// SAFETY: see above.
unsafe impl Sync for MmioWindow {}

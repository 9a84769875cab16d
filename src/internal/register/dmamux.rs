//! DMAMUX Register Definitions
//!
//! Each DMAMUX instance has one byte-wide channel configuration register per
//! eDMA channel it serves. Writing a source number with ENBL routes that
//! peripheral's request line to the channel; writing zero unbinds it.

use crate::hal::RegisterIo;

/// Channel configuration register stride
pub const CHCFG_STRIDE: usize = 1;

/// DMA Channel Source (slot) mask
pub const CHCFG_SOURCE_MASK: u8 = 0x3F;
/// DMA Channel Enable
pub const CHCFG_ENBL: u8 = 1 << 7;

/// Length of the register window for a mux serving `channels` channels
pub const fn window_len(channels: usize) -> usize {
    // Registers are byte wide but the block is mapped in whole words
    (channels * CHCFG_STRIDE + 3) & !3
}

/// Typed view of one DMAMUX instance.
pub struct DmamuxRegs<'a, W: RegisterIo + ?Sized> {
    io: &'a W,
}

impl<'a, W: RegisterIo + ?Sized> DmamuxRegs<'a, W> {
    /// Wrap a mapped DMAMUX register window
    #[inline(always)]
    pub fn new(io: &'a W) -> Self {
        Self { io }
    }

    /// Route peripheral `source` to the mux-local `channel`.
    ///
    /// The channel is disabled first; the reference manual requires ENBL to be
    /// clear while SOURCE changes.
    pub fn bind(&self, channel: u8, source: u8) {
        let offset = channel as usize * CHCFG_STRIDE;
        self.io.write8(offset, 0);
        self.io.write8(offset, CHCFG_ENBL | (source & CHCFG_SOURCE_MASK));
    }

    /// Remove any routing from the mux-local `channel`. Idempotent.
    pub fn unbind(&self, channel: u8) {
        self.io.write8(channel as usize * CHCFG_STRIDE, 0);
    }
}

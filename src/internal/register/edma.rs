//! eDMA Controller Register Definitions
//!
//! The eDMA block holds a set of channel-global control and status registers
//! followed by one 32-byte transfer control descriptor per channel. Per-channel
//! status is never modified by read-modify-write: the byte-wide clear/set
//! registers (CERQ, SERQ, CDNE, CINT, CERR, ...) take a channel index and
//! update a single bit atomically in hardware.

use crate::hal::RegisterIo;
use crate::internal::dma::descriptor::TcdImage;

// =============================================================================
// Register Offsets
// =============================================================================

/// Control Register offset
pub const CR_OFFSET: usize = 0x00;
/// Error Status Register offset
pub const ES_OFFSET: usize = 0x04;
/// Enable Request Register offset
pub const ERQ_OFFSET: usize = 0x0C;
/// Enable Error Interrupt Register offset
#[cfg(test)]
pub const EEI_OFFSET: usize = 0x14;
/// Clear Enable Error Interrupt Register offset
pub const CEEI_OFFSET: usize = 0x18;
/// Set Enable Error Interrupt Register offset
pub const SEEI_OFFSET: usize = 0x19;
/// Clear Enable Request Register offset
pub const CERQ_OFFSET: usize = 0x1A;
/// Set Enable Request Register offset
pub const SERQ_OFFSET: usize = 0x1B;
/// Clear DONE Status Bit Register offset
pub const CDNE_OFFSET: usize = 0x1C;
/// Set START Bit Register offset
pub const SSRT_OFFSET: usize = 0x1D;
/// Clear Error Register offset
pub const CERR_OFFSET: usize = 0x1E;
/// Clear Interrupt Request Register offset
pub const CINT_OFFSET: usize = 0x1F;
/// Interrupt Request Register offset (write 1 to clear)
pub const INT_OFFSET: usize = 0x24;
/// Error Register offset (write 1 to clear)
pub const ERR_OFFSET: usize = 0x2C;
/// Channel Priority Registers base offset
pub const DCHPRI_BASE: usize = 0x100;
/// First channel TCD offset
pub const TCD_BASE: usize = 0x1000;
/// Stride between channel TCDs
pub const TCD_STRIDE: usize = 32;

/// Offsets of the TCD fields relative to a channel's TCD
pub mod tcd {
    /// Source Address
    pub const SADDR: usize = 0x00;
    /// Signed Source Address Offset
    pub const SOFF: usize = 0x04;
    /// Transfer Attributes
    pub const ATTR: usize = 0x06;
    /// Minor Byte Count
    pub const NBYTES: usize = 0x08;
    /// Last Source Address Adjustment
    pub const SLAST: usize = 0x0C;
    /// Destination Address
    pub const DADDR: usize = 0x10;
    /// Signed Destination Address Offset
    pub const DOFF: usize = 0x14;
    /// Current Major Iteration Count
    pub const CITER: usize = 0x16;
    /// Last Destination Address Adjustment / Scatter-Gather Address
    pub const DLAST_SGA: usize = 0x18;
    /// Control and Status
    pub const CSR: usize = 0x1C;
    /// Beginning Major Iteration Count
    pub const BITER: usize = 0x1E;
}

/// Length of the register window for a controller with `channels` channels
pub const fn window_len(channels: usize) -> usize {
    TCD_BASE + channels * TCD_STRIDE
}

/// Offset of a channel's TCD
#[inline(always)]
pub const fn tcd_offset(channel: u8) -> usize {
    TCD_BASE + channel as usize * TCD_STRIDE
}

/// Offset of a channel's DCHPRI byte.
///
/// Priority registers are big-endian within each 32-bit group, so channel 0
/// sits at 0x103, channel 3 at 0x100, channel 4 at 0x107 and so on.
#[inline(always)]
pub const fn dchpri_offset(channel: u8) -> usize {
    let ch = channel as usize;
    DCHPRI_BASE + 4 * (ch / 4) + (3 - ch % 4)
}

// =============================================================================
// Control Register (CR) Bits
// =============================================================================

/// Enable Round Robin Channel Arbitration
pub const CR_ERCA: u32 = 1 << 2;
/// Halt On Error: any error sets HALT and stops all channels
pub const CR_HOE: u32 = 1 << 4;

// =============================================================================
// Error Status Register (ES) Bits
// =============================================================================

/// Destination Bus Error
#[cfg(test)]
pub const ES_DBE: u32 = 1 << 0;
/// Error Channel Number shift
pub const ES_ERRCHN_SHIFT: u32 = 8;
/// Error Channel Number mask
pub const ES_ERRCHN_MASK: u32 = 0x1F << 8;
/// Logical OR of all ERR bits
#[cfg(test)]
pub const ES_VLD: u32 = 1 << 31;

// =============================================================================
// Clear/Set-by-index Register Bits
// =============================================================================

/// Channel index field of the byte-wide clear/set registers
pub const INDEX_MASK: u8 = 0x1F;
/// Apply the operation to every channel (CAER, CAEE, CAIR, CADN, SAER, ...)
pub const INDEX_ALL: u8 = 1 << 6;

// =============================================================================
// DCHPRI Bits
// =============================================================================

/// Channel arbitration priority mask
pub const DCHPRI_CHPRI_MASK: u8 = 0x0F;

// =============================================================================
// Register View
// =============================================================================

/// Typed view of one controller's eDMA registers.
pub struct EdmaRegs<'a, W: RegisterIo + ?Sized> {
    io: &'a W,
}

impl<'a, W: RegisterIo + ?Sized> EdmaRegs<'a, W> {
    /// Wrap a mapped eDMA register window
    #[inline(always)]
    pub fn new(io: &'a W) -> Self {
        Self { io }
    }

    /// Write the control register
    pub fn set_cr(&self, value: u32) {
        self.io.write32(CR_OFFSET, value);
    }

    /// Read the error status register
    pub fn es(&self) -> u32 {
        self.io.read32(ES_OFFSET)
    }

    /// Read the request-enable bitmap
    pub fn erq(&self) -> u32 {
        self.io.read32(ERQ_OFFSET)
    }

    /// Read the pending-interrupt bitmap
    pub fn int(&self) -> u32 {
        self.io.read32(INT_OFFSET)
    }

    /// Read the error bitmap
    pub fn err(&self) -> u32 {
        self.io.read32(ERR_OFFSET)
    }

    /// Disable hardware requests for a channel (CERQ)
    pub fn disable_request(&self, channel: u8) {
        self.io.write8(CERQ_OFFSET, channel & INDEX_MASK);
    }

    /// Enable hardware requests for a channel (SERQ)
    pub fn enable_request(&self, channel: u8) {
        self.io.write8(SERQ_OFFSET, channel & INDEX_MASK);
    }

    /// Disable hardware requests for every channel
    pub fn disable_all_requests(&self) {
        self.io.write8(CERQ_OFFSET, INDEX_ALL);
    }

    /// Enable the error interrupt for a channel (SEEI)
    pub fn enable_error_interrupt(&self, channel: u8) {
        self.io.write8(SEEI_OFFSET, channel & INDEX_MASK);
    }

    /// Disable the error interrupt for a channel (CEEI)
    pub fn disable_error_interrupt(&self, channel: u8) {
        self.io.write8(CEEI_OFFSET, channel & INDEX_MASK);
    }

    /// Disable the error interrupt for every channel
    pub fn disable_all_error_interrupts(&self) {
        self.io.write8(CEEI_OFFSET, INDEX_ALL);
    }

    /// Clear a channel's CSR.DONE (CDNE)
    pub fn clear_done(&self, channel: u8) {
        self.io.write8(CDNE_OFFSET, channel & INDEX_MASK);
    }

    /// Clear CSR.DONE on every channel
    pub fn clear_all_done(&self) {
        self.io.write8(CDNE_OFFSET, INDEX_ALL);
    }

    /// Request a software start of a channel (SSRT)
    pub fn start(&self, channel: u8) {
        self.io.write8(SSRT_OFFSET, channel & INDEX_MASK);
    }

    /// Clear a channel's error flag (CERR)
    pub fn clear_error(&self, channel: u8) {
        self.io.write8(CERR_OFFSET, channel & INDEX_MASK);
    }

    /// Clear every channel's error flag
    pub fn clear_all_errors(&self) {
        self.io.write8(CERR_OFFSET, INDEX_ALL);
    }

    /// Clear a channel's interrupt request (CINT)
    pub fn clear_interrupt(&self, channel: u8) {
        self.io.write8(CINT_OFFSET, channel & INDEX_MASK);
    }

    /// Clear every channel's interrupt request
    pub fn clear_all_interrupts(&self) {
        self.io.write8(CINT_OFFSET, INDEX_ALL);
    }

    /// Program a channel's arbitration priority
    pub fn set_priority(&self, channel: u8, priority: u8) {
        self.io
            .write8(dchpri_offset(channel), priority & DCHPRI_CHPRI_MASK);
    }

    /// Read a channel's live CSR
    pub fn tcd_csr(&self, channel: u8) -> u16 {
        self.io.read16(tcd_offset(channel) + tcd::CSR)
    }

    /// Write a channel's live CSR
    pub fn set_tcd_csr(&self, channel: u8, value: u16) {
        self.io.write16(tcd_offset(channel) + tcd::CSR, value);
    }

    /// Read a channel's live source address
    pub fn tcd_saddr(&self, channel: u8) -> u32 {
        self.io.read32(tcd_offset(channel) + tcd::SADDR)
    }

    /// Read a channel's live destination address
    pub fn tcd_daddr(&self, channel: u8) -> u32 {
        self.io.read32(tcd_offset(channel) + tcd::DADDR)
    }

    /// Write a channel's live DLAST_SGA
    pub fn set_tcd_dlast_sga(&self, channel: u8, value: i32) {
        self.io
            .write32(tcd_offset(channel) + tcd::DLAST_SGA, value as u32);
    }

    /// Load a descriptor into a channel's live registers.
    ///
    /// CSR is written last so that a START or ESG bit only takes effect once
    /// the rest of the descriptor is in place.
    pub fn write_tcd(&self, channel: u8, image: &TcdImage) {
        let base = tcd_offset(channel);
        self.io.write16(base + tcd::CSR, 0);
        self.io.write32(base + tcd::SADDR, image.saddr);
        self.io.write16(base + tcd::SOFF, image.soff as u16);
        self.io.write16(base + tcd::ATTR, image.attr);
        self.io.write32(base + tcd::NBYTES, image.nbytes);
        self.io.write32(base + tcd::SLAST, image.slast as u32);
        self.io.write32(base + tcd::DADDR, image.daddr);
        self.io.write16(base + tcd::DOFF, image.doff as u16);
        self.io.write16(base + tcd::CITER, image.citer);
        self.io.write32(base + tcd::DLAST_SGA, image.dlast_sga as u32);
        self.io.write16(base + tcd::BITER, image.biter);
        self.io.write16(base + tcd::CSR, image.csr);
    }

    /// Snapshot a channel's live registers
    pub fn read_tcd(&self, channel: u8) -> TcdImage {
        let base = tcd_offset(channel);
        TcdImage {
            saddr: self.io.read32(base + tcd::SADDR),
            soff: self.io.read16(base + tcd::SOFF) as i16,
            attr: self.io.read16(base + tcd::ATTR),
            nbytes: self.io.read32(base + tcd::NBYTES),
            slast: self.io.read32(base + tcd::SLAST) as i32,
            daddr: self.io.read32(base + tcd::DADDR),
            doff: self.io.read16(base + tcd::DOFF) as i16,
            citer: self.io.read16(base + tcd::CITER),
            dlast_sga: self.io.read32(base + tcd::DLAST_SGA) as i32,
            csr: self.io.read16(base + tcd::CSR),
            biter: self.io.read16(base + tcd::BITER),
        }
    }
}

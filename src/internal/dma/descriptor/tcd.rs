//! In-memory transfer control descriptor.

use super::VolatileCell;
use super::bits::csr;
use crate::internal::constants::TCD_SIZE;

/// Value copy of a TCD.
///
/// Built by the transfer compiler, stored into descriptor memory with
/// [`Tcd::store`] and loaded into live registers by the register layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TcdImage {
    /// Source address
    pub saddr: u32,
    /// Signed source offset applied after each read
    pub soff: i16,
    /// Transfer attributes (SSIZE/DSIZE/SMOD/DMOD)
    pub attr: u16,
    /// Bytes moved per minor loop
    pub nbytes: u32,
    /// Source adjustment applied at major loop completion
    pub slast: i32,
    /// Destination address
    pub daddr: u32,
    /// Signed destination offset applied after each write
    pub doff: i16,
    /// Current major iteration count
    pub citer: u16,
    /// Destination adjustment, or next TCD address when CSR.ESG is set
    pub dlast_sga: i32,
    /// Control and status
    pub csr: u16,
    /// Beginning major iteration count
    pub biter: u16,
}

#[cfg(test)]
impl TcdImage {
    /// True if this descriptor chains to another
    #[inline(always)]
    #[must_use]
    pub fn chains(&self) -> bool {
        self.csr & csr::ESG != 0
    }

    /// Physical address of the next descriptor, if chained
    #[inline(always)]
    #[must_use]
    pub fn next_phys(&self) -> Option<u32> {
        self.chains().then_some(self.dlast_sga as u32)
    }
}

/// Hardware TCD in descriptor memory (32 bytes, 32-byte aligned).
#[repr(C, align(32))]
pub struct Tcd {
    saddr: VolatileCell<u32>,
    soff: VolatileCell<i16>,
    attr: VolatileCell<u16>,
    nbytes: VolatileCell<u32>,
    slast: VolatileCell<i32>,
    daddr: VolatileCell<u32>,
    doff: VolatileCell<i16>,
    citer: VolatileCell<u16>,
    dlast_sga: VolatileCell<i32>,
    csr: VolatileCell<u16>,
    biter: VolatileCell<u16>,
}

const _: () = assert!(core::mem::size_of::<Tcd>() == TCD_SIZE);

impl Tcd {
    /// Create a zeroed descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            saddr: VolatileCell::new(0),
            soff: VolatileCell::new(0),
            attr: VolatileCell::new(0),
            nbytes: VolatileCell::new(0),
            slast: VolatileCell::new(0),
            daddr: VolatileCell::new(0),
            doff: VolatileCell::new(0),
            citer: VolatileCell::new(0),
            dlast_sga: VolatileCell::new(0),
            csr: VolatileCell::new(0),
            biter: VolatileCell::new(0),
        }
    }

    /// Write every field. CSR goes last.
    pub fn store(&self, image: &TcdImage) {
        self.saddr.set(image.saddr);
        self.soff.set(image.soff);
        self.attr.set(image.attr);
        self.nbytes.set(image.nbytes);
        self.slast.set(image.slast);
        self.daddr.set(image.daddr);
        self.doff.set(image.doff);
        self.citer.set(image.citer);
        self.dlast_sga.set(image.dlast_sga);
        self.biter.set(image.biter);
        self.csr.set(image.csr);
    }

    /// Read every field.
    #[must_use]
    pub fn load(&self) -> TcdImage {
        TcdImage {
            saddr: self.saddr.get(),
            soff: self.soff.get(),
            attr: self.attr.get(),
            nbytes: self.nbytes.get(),
            slast: self.slast.get(),
            daddr: self.daddr.get(),
            doff: self.doff.get(),
            citer: self.citer.get(),
            dlast_sga: self.dlast_sga.get(),
            csr: self.csr.get(),
            biter: self.biter.get(),
        }
    }

    /// Zero every field.
    pub fn clear(&self) {
        self.store(&TcdImage::default());
    }

    /// Control and status word
    #[inline(always)]
    #[must_use]
    pub fn csr(&self) -> u16 {
        self.csr.get()
    }

    /// Scatter-gather link or destination adjustment
    #[inline(always)]
    #[must_use]
    pub fn dlast_sga(&self) -> i32 {
        self.dlast_sga.get()
    }

    /// Chain this descriptor to the TCD at `next_phys`.
    ///
    /// Clears DREQ so the channel keeps its request enabled into the next
    /// descriptor.
    pub fn link_to(&self, next_phys: u32) {
        self.dlast_sga.set(next_phys as i32);
        self.csr.update(|v| (v | csr::ESG) & !csr::DREQ);
    }
}

impl Default for Tcd {
    fn default() -> Self {
        Self::new()
    }
}

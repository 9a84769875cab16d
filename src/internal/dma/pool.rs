//! Per-channel descriptor pool.
//!
//! A pool pairs an array of hardware TCDs in DMA memory with a logical ring
//! of nodes, one per TCD. Nodes are linked by index into a single cycle whose
//! length is the pool capacity. The in-use arc starts at `head` and spans
//! `in_use` nodes; the free arc is the rest of the cycle and starts at
//! `cursor`. Both arcs are always contiguous.

use alloc::vec::Vec;
use core::ptr::NonNull;

use super::descriptor::Tcd;
use crate::driver::config::AddrStep;
use crate::driver::error::{ConfigError, ResourceError, Result};
use crate::hal::{DmaRegion, PhysMapper};
use crate::internal::constants::{TCD_ALIGN, TCD_SIZE};

/// Memory-side bookkeeping for the segment a descriptor carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// First address the hardware touches
    pub addr: u32,
    /// Bytes moved by the descriptor
    pub len: u32,
    /// How the address moves
    pub step: AddrStep,
}

impl Segment {
    /// Bytes already moved if the live position register reads `pos`.
    ///
    /// Returns `None` when `pos` lies outside the segment.
    pub fn progress(&self, pos: u32) -> Option<u32> {
        match self.step {
            AddrStep::Increment => {
                let done = pos.wrapping_sub(self.addr);
                (pos >= self.addr && done < self.len).then_some(done)
            }
            AddrStep::Decrement => {
                let done = self.addr.wrapping_sub(pos);
                (pos <= self.addr && done < self.len).then_some(done)
            }
            AddrStep::Fixed => (pos == self.addr).then_some(0),
        }
    }
}

/// Logical twin of one hardware descriptor
#[derive(Debug, Clone, Copy)]
pub struct DescNode {
    /// Previous node in the cycle
    pub prev: usize,
    /// Next node in the cycle
    pub next: usize,
    /// Bus address of the node's TCD
    pub phys: u32,
    /// Segment last compiled into the TCD
    pub segment: Segment,
}

/// Fixed-capacity descriptor pool owned by one channel.
pub struct DescriptorPool {
    region: DmaRegion,
    tcds: NonNull<Tcd>,
    nodes: Vec<DescNode>,
    head: usize,
    cursor: usize,
    in_use: usize,
}

// SAFETY: the pool exclusively owns its DMA region; the raw pointer is only
// dereferenced through `&self`/`&mut self`.
unsafe impl Send for DescriptorPool {}

impl DescriptorPool {
    /// Allocate `capacity` zeroed descriptors and link their nodes.
    ///
    /// One extra descriptor's worth of memory is requested so the array can be
    /// aligned to the TCD boundary. On failure nothing stays allocated.
    pub fn allocate<M: PhysMapper + ?Sized>(mapper: &M, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::InvalidDescriptorCount.into());
        }

        let len = (capacity + 1) * TCD_SIZE;
        let region = mapper.alloc_dma(len).map_err(|_| ResourceError::AllocFailed)?;

        let align = TCD_ALIGN as u64;
        let pad = region.phys().next_multiple_of(align) - region.phys();
        let base_phys = region.phys() + pad;
        let end_phys = base_phys + (capacity * TCD_SIZE) as u64;
        // SAFETY: pad < TCD_ALIGN and the region holds capacity + 1 descriptors
        let base = unsafe { region.virt().as_ptr().add(pad as usize) };

        if end_phys > u64::from(u32::MAX) + 1 || base.align_offset(TCD_ALIGN) != 0 {
            error!("descriptor memory not addressable by the engine");
            mapper.free_dma(region);
            return Err(ResourceError::AllocFailed.into());
        }

        let tcds = match NonNull::new(base.cast::<Tcd>()) {
            Some(ptr) => ptr,
            None => {
                mapper.free_dma(region);
                return Err(ResourceError::AllocFailed.into());
            }
        };

        let nodes = (0..capacity)
            .map(|i| DescNode {
                prev: (i + capacity - 1) % capacity,
                next: (i + 1) % capacity,
                phys: (base_phys + (i * TCD_SIZE) as u64) as u32,
                segment: Segment::default(),
            })
            .collect();

        let pool = Self {
            region,
            tcds,
            nodes,
            head: 0,
            cursor: 0,
            in_use: 0,
        };
        for i in 0..capacity {
            pool.tcd(i).clear();
        }

        debug!("descriptor pool: {} TCDs at {:#x}", capacity, base_phys);
        Ok(pool)
    }

    /// Total descriptors in the pool
    #[inline(always)]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Descriptors on the in-use arc
    #[inline(always)]
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Descriptors on the free arc
    #[inline(always)]
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - self.in_use
    }

    /// First node of the in-use arc
    #[must_use]
    pub fn head(&self) -> Option<usize> {
        (self.in_use > 0).then_some(self.head)
    }

    /// Last node of the in-use arc
    #[must_use]
    pub fn tail(&self) -> Option<usize> {
        (self.in_use > 0).then(|| self.nodes[self.cursor].prev)
    }

    /// Claim the node at the free cursor and advance the cursor.
    ///
    /// Returns `None` when the free arc is empty.
    pub fn next_free(&mut self) -> Option<usize> {
        if self.in_use == self.capacity() {
            return None;
        }
        let index = self.cursor;
        self.cursor = self.nodes[index].next;
        self.in_use += 1;
        Some(index)
    }

    /// Return the whole in-use arc to the free arc.
    ///
    /// The next chain starts where the previous one ended, so descriptors are
    /// reused only after the cycle comes back round.
    pub fn reclaim(&mut self) {
        self.head = self.cursor;
        self.in_use = 0;
    }

    /// Indices of the in-use arc, head first
    pub fn in_use_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let mut index = self.head;
        (0..self.in_use).map(move |_| {
            let current = index;
            index = self.nodes[current].next;
            current
        })
    }

    /// Logical node at `index`
    #[inline(always)]
    #[must_use]
    pub fn node(&self, index: usize) -> &DescNode {
        &self.nodes[index]
    }

    /// Record the segment compiled into the descriptor at `index`
    pub fn set_segment(&mut self, index: usize, segment: Segment) {
        self.nodes[index].segment = segment;
    }

    /// Bus address of the descriptor at `index`
    #[inline(always)]
    #[must_use]
    pub fn phys(&self, index: usize) -> u32 {
        self.nodes[index].phys
    }

    /// Node whose descriptor lives at bus address `phys`
    #[cfg(test)]
    #[must_use]
    pub fn index_of(&self, phys: u32) -> Option<usize> {
        let base = self.nodes.first()?.phys;
        let offset = phys.checked_sub(base)? as usize;
        (offset % TCD_SIZE == 0 && offset / TCD_SIZE < self.capacity())
            .then_some(offset / TCD_SIZE)
    }

    /// Hardware descriptor at `index`
    #[must_use]
    pub fn tcd(&self, index: usize) -> &Tcd {
        assert!(index < self.capacity());
        // SAFETY: index is within the aligned array set up by `allocate`
        unsafe { &*self.tcds.as_ptr().add(index) }
    }

    /// Release the descriptor memory together with the logical nodes.
    pub fn free_with<M: PhysMapper + ?Sized>(self, mapper: &M) {
        let Self { region, nodes, .. } = self;
        drop(nodes);
        mapper.free_dma(region);
    }
}

impl core::fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DescriptorPool")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("in_use", &self.in_use)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Transfer compiler
//!
//! Turns a [`TransferRequest`] into a chain of hardware descriptors in the
//! channel's pool. A request is split into equal segments, one descriptor
//! each; segment count is the larger of the two fragment counts.
//!
//! Device-paced segments move one unit per hardware request (NBYTES is the
//! unit, CITER the unit count). Memory-to-memory segments move the whole
//! segment in one self-started minor loop (NBYTES is the segment, CITER 1).
//!
//! Compiling onto an idle channel replaces its chain. Compiling onto a
//! running channel appends to the live chain without stopping it.

use alloc::vec::Vec;

use super::channel::Channel;
use super::config::{AddrStep, Direction, Fragment, TransferFlags, TransferRequest};
use super::error::{ConfigError, ResourceError, Result, TransferError};
use crate::hal::Platform;
use crate::internal::constants::MAX_MAJOR_ITERATIONS;
use crate::internal::dma::Segment;
use crate::internal::dma::descriptor::TcdImage;
use crate::internal::dma::descriptor::bits::{attr, csr};

// =============================================================================
// Planning
// =============================================================================

/// Geometry shared by every segment of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Plan {
    pub segments: usize,
    pub segment_len: u32,
    pub unit: u32,
    size_code: u16,
    src_segmented: bool,
    dst_segmented: bool,
}

/// A side is segmented when flagged so or when it lists several fragments
fn segmented(fragments: &[Fragment], flag: bool) -> bool {
    flag || fragments.len() > 1
}

/// Check one side's fragments against the segment geometry
fn check_side(fragments: &[Fragment], segmented: bool, step: AddrStep, plan: &Plan, total: u32) -> Result<()> {
    if segmented {
        if fragments.len() != plan.segments {
            return Err(ConfigError::SegmentMismatch.into());
        }
        if fragments.iter().any(|f| f.len.is_some_and(|len| len < plan.segment_len)) {
            return Err(ConfigError::FragmentTooShort.into());
        }
    } else {
        let needed = if step == AddrStep::Fixed { plan.unit } else { total };
        if fragments[0].len.is_some_and(|len| len < needed) {
            return Err(ConfigError::FragmentTooShort.into());
        }
    }
    Ok(())
}

/// Validate a request against `available` free descriptors.
///
/// Checks run in a fixed order and the first failure is reported: unit
/// size, fragment presence, segment divisibility, segment length, fragment
/// coverage, descriptor count.
pub(crate) fn plan(request: &TransferRequest<'_>, available: usize) -> Result<Plan> {
    let size_code = attr::size_code(request.unit_size).ok_or(ConfigError::InvalidUnitSize)?;
    if request.src.is_empty() || request.dst.is_empty() {
        return Err(ConfigError::NoFragments.into());
    }

    let segments = request.src.len().max(request.dst.len());
    if request.total % segments as u32 != 0 {
        return Err(ConfigError::SegmentMismatch.into());
    }
    let segment_len = request.total / segments as u32;
    let unit = request.unit_size;
    if segment_len == 0 || segment_len % unit != 0 || segment_len / unit > MAX_MAJOR_ITERATIONS {
        return Err(ConfigError::InvalidLength.into());
    }

    let flags = request.flags;
    let plan = Plan {
        segments,
        segment_len,
        unit,
        size_code,
        src_segmented: segmented(request.src, flags.contains(TransferFlags::SRC_SEGMENTED)),
        dst_segmented: segmented(request.dst, flags.contains(TransferFlags::DST_SEGMENTED)),
    };
    check_side(request.src, plan.src_segmented, flags.src_step(), &plan, request.total)?;
    check_side(request.dst, plan.dst_segmented, flags.dst_step(), &plan, request.total)?;

    if segments > available {
        return Err(ResourceError::OutOfDescriptors.into());
    }
    Ok(plan)
}

// =============================================================================
// Segment Building
// =============================================================================

fn side_addr(fragments: &[Fragment], segmented: bool, step: AddrStep, index: usize, len: u32) -> u32 {
    if segmented {
        return fragments[index].paddr;
    }
    let base = fragments[0].paddr;
    let offset = len.wrapping_mul(index as u32);
    match step {
        AddrStep::Increment => base.wrapping_add(offset),
        AddrStep::Decrement => base.wrapping_sub(offset),
        AddrStep::Fixed => base,
    }
}

fn access_offset(step: AddrStep, unit: u32) -> i16 {
    match step {
        AddrStep::Increment => unit as i16,
        AddrStep::Decrement => -(unit as i16),
        AddrStep::Fixed => 0,
    }
}

/// Adjustment that brings an address back to the segment start
fn wrap(step: AddrStep, len: u32) -> i32 {
    match step {
        AddrStep::Increment => -(len as i32),
        AddrStep::Decrement => len as i32,
        AddrStep::Fixed => 0,
    }
}

/// Descriptor for segment `index`, without chain links or interrupt bits,
/// and the memory-side range it covers.
pub(crate) fn build_segment(request: &TransferRequest<'_>, plan: &Plan, index: usize) -> (TcdImage, Segment) {
    let src_step = request.flags.src_step();
    let dst_step = request.flags.dst_step();
    let len = plan.segment_len;
    let saddr = side_addr(request.src, plan.src_segmented, src_step, index, len);
    let daddr = side_addr(request.dst, plan.dst_segmented, dst_step, index, len);

    let device = request.direction.is_device_paced();
    let (nbytes, iterations) = if device { (plan.unit, len / plan.unit) } else { (len, 1) };

    let image = TcdImage {
        saddr,
        soff: access_offset(src_step, plan.unit),
        attr: attr::same_size(plan.size_code),
        nbytes,
        slast: wrap(src_step, len),
        daddr,
        doff: access_offset(dst_step, plan.unit),
        citer: iterations as u16,
        dlast_sga: wrap(dst_step, len),
        csr: if device { 0 } else { csr::START },
        biter: iterations as u16,
    };

    let segment = match request.direction {
        Direction::MemToDevice => Segment {
            addr: saddr,
            len,
            step: src_step,
        },
        Direction::DeviceToMem | Direction::MemToMem => Segment {
            addr: daddr,
            len,
            step: dst_step,
        },
    };
    (image, segment)
}

// =============================================================================
// Channel Compile
// =============================================================================

impl<P: Platform> Channel<'_, P> {
    /// Compile `request` onto the channel.
    ///
    /// On an idle or configured channel the previous chain is discarded and
    /// the new one becomes the channel's chain; the channel is `Configured`
    /// afterwards. On a running channel the new segments are appended to the
    /// live chain; they must use the running chain's direction.
    ///
    /// Validation failures leave the channel untouched.
    pub fn compile(&mut self, request: &TransferRequest<'_>) -> Result<()> {
        let pool = self.pool.as_ref().ok_or(TransferError::Released)?;
        if self.running && request.direction != self.direction {
            return Err(TransferError::AlreadyRunning.into());
        }
        let available = if self.running { pool.free() } else { pool.capacity() };
        let plan = plan(request, available)?;

        if self.running {
            self.append(request, &plan)
        } else {
            self.replace(request, &plan);
            Ok(())
        }
    }

    /// Notification bits for descriptor `index` of `count`
    fn notify_bits(&self, flags: TransferFlags, index: usize, count: usize) -> u16 {
        let wants_each = flags.contains(TransferFlags::NOTIFY_EACH_SEGMENT);
        let wants_end = flags.contains(TransferFlags::NOTIFY_ON_COMPLETE)
            || (!wants_each
                && self
                    .engine
                    .dispatcher()
                    .has_event(self.route.controller, self.route.channel));
        if wants_each || (wants_end && index + 1 == count) {
            csr::INTMAJOR
        } else {
            0
        }
    }

    /// Claim and fill descriptors for every segment.
    ///
    /// The last descriptor links to `ring_head` for a repeating request;
    /// otherwise it ends the chain.
    fn emit(&mut self, request: &TransferRequest<'_>, plan: &Plan, ring_head: Option<u32>) -> Option<Vec<usize>> {
        let mut indices = Vec::with_capacity(plan.segments);
        {
            let pool = self.pool.as_mut()?;
            for _ in 0..plan.segments {
                indices.push(pool.next_free()?);
            }
        }
        let head_phys = {
            let pool = self.pool.as_ref()?;
            pool.phys(indices[0])
        };

        let count = indices.len();
        let device = request.direction.is_device_paced();
        let repeat = request.flags.contains(TransferFlags::REPEAT);
        for (i, &index) in indices.iter().enumerate() {
            let (mut image, segment) = build_segment(request, plan, i);
            image.csr |= self.notify_bits(request.flags, i, count);

            let pool = self.pool.as_mut()?;
            if let Some(&next) = indices.get(i + 1) {
                image.csr |= csr::ESG;
                image.dlast_sga = pool.phys(next) as i32;
            } else if repeat {
                image.csr |= csr::ESG;
                image.dlast_sga = ring_head.unwrap_or(head_phys) as i32;
            } else if device {
                image.csr |= csr::DREQ;
            }
            pool.tcd(index).store(&image);
            pool.set_segment(index, segment);
        }
        Some(indices)
    }

    fn replace(&mut self, request: &TransferRequest<'_>, plan: &Plan) {
        if let Some(pool) = self.pool.as_mut() {
            pool.reclaim();
        }
        if self.emit(request, plan, None).is_none() {
            return;
        }
        self.direction = request.direction;
        self.flags = request.flags;
        self.total = request.total;
        self.segments = plan.segments;
        self.configured = true;
        debug!(
            "eDMA{} channel {}: compiled {} segments of {} bytes",
            self.route.controller.0, self.route.channel.0, plan.segments, plan.segment_len
        );
    }

    /// Extend the live chain.
    ///
    /// The new descriptors go after the current tail. The tail's memory copy
    /// is relinked to them; if the hardware is executing the tail right now,
    /// its live registers are relinked too. If the tail finished before the
    /// live link took effect, the channel is restarted at the first new
    /// descriptor.
    fn append(&mut self, request: &TransferRequest<'_>, plan: &Plan) -> Result<()> {
        let engine = self.engine;
        let _lock = engine.lock(self.route.controller)?;

        let pool = self.pool.as_ref().ok_or(TransferError::Released)?;
        let tail = pool.tail().ok_or(TransferError::NotConfigured)?;
        let tail_csr = pool.tcd(tail).csr();
        let tail_link = pool.tcd(tail).dlast_sga();
        let ring_head = pool.head().map(|head| pool.phys(head));

        let indices = self
            .emit(request, plan, ring_head)
            .ok_or(ResourceError::OutOfDescriptors)?;
        let pool = self.pool.as_ref().ok_or(TransferError::Released)?;
        let new_head = indices[0];
        let new_head_phys = pool.phys(new_head);
        pool.tcd(tail).link_to(new_head_phys);

        self.flags = request.flags;
        self.total = self.total.saturating_add(request.total);
        self.segments += plan.segments;

        let regs = self.regs();
        let ch = self.route.channel.0;
        let live = regs.read_tcd(ch);
        let on_tail = live.dlast_sga == tail_link && (live.csr & csr::ESG) == (tail_csr & csr::ESG);
        if !on_tail {
            trace!("append: hardware ahead of the tail, memory link suffices");
            return Ok(());
        }

        regs.set_tcd_dlast_sga(ch, new_head_phys as i32);
        let current = regs.tcd_csr(ch);
        regs.set_tcd_csr(ch, (current | csr::ESG) & !(csr::DREQ | csr::START));

        let after = regs.tcd_csr(ch);
        if after & csr::DONE != 0 || after & csr::ESG == 0 {
            debug!(
                "eDMA{} channel {}: tail finished before relink, restarting",
                self.route.controller.0, ch
            );
            self.halt();
            self.load_and_go(new_head);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! DMA channel handle
//!
//! A [`Channel`] owns one hardware channel of one controller from
//! [`Engine::acquire`] until [`Channel::release`] (or drop). It holds the
//! channel's descriptor pool and the bookkeeping for the chain most recently
//! compiled onto it.
//!
//! # State Machine
//!
//! ```text
//!            compile              start
//!   Idle ────────────▶ Configured ──────▶ Running ──▶ Completing / Error
//!    ▲                     ▲                 │              │
//!    │                     └──── abort ──────┘              │
//!    └────────────────────── complete (one-shot) ───────────┘
//! ```
//!
//! A repeating chain stays in `Running`; `complete` only acknowledges the
//! notification. `Completing` and `Error` are read from the hardware and the
//! interrupt dispatcher, not stored.
//!
//! [`Engine::acquire`]: super::Engine::acquire

use super::config::{Direction, TransferFlags};
use super::engine::Engine;
use super::error::{Result, TransferError};
use super::interrupt::ChannelStatus;
use super::resource::{ChannelId, ChannelRoute, ControllerId};
use crate::hal::Platform;
use crate::internal::constants::POLL_INTERVAL_US;
use crate::internal::dma::DescriptorPool;
use crate::internal::dma::descriptor::TcdImage;
use crate::internal::dma::descriptor::bits::csr;
use crate::internal::register::edma::EdmaRegs;
use crate::sync::wait_for;

// =============================================================================
// Channel State
// =============================================================================

/// Lifecycle state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// No chain compiled (or released)
    Idle,
    /// Chain compiled, hardware not started
    Configured,
    /// Hardware started
    Running,
    /// Hardware finished the chain; waiting for `complete`
    Completing,
    /// Hardware reported an error on the channel
    Error,
}

// =============================================================================
// Channel
// =============================================================================

/// An acquired eDMA channel.
pub struct Channel<'e, P: Platform> {
    pub(super) engine: &'e Engine<P>,
    pub(super) route: ChannelRoute,
    pub(super) pool: Option<DescriptorPool>,
    pub(super) direction: Direction,
    pub(super) flags: TransferFlags,
    /// Bytes moved by the whole compiled chain
    pub(super) total: u32,
    pub(super) segments: usize,
    pub(super) configured: bool,
    pub(super) running: bool,
}

impl<'e, P: Platform> Channel<'e, P> {
    pub(super) fn new(engine: &'e Engine<P>, route: ChannelRoute, pool: DescriptorPool) -> Self {
        Self {
            engine,
            route,
            pool: Some(pool),
            direction: Direction::MemToMem,
            flags: TransferFlags::empty(),
            total: 0,
            segments: 0,
            configured: false,
            running: false,
        }
    }

    /// Controller serving the channel
    #[inline(always)]
    pub fn controller(&self) -> ControllerId {
        self.route.controller
    }

    /// Controller-local channel number
    #[inline(always)]
    pub fn channel(&self) -> ChannelId {
        self.route.channel
    }

    /// Mux slot the channel was acquired for
    #[inline(always)]
    pub fn slot(&self) -> u32 {
        self.route.slot
    }

    /// Descriptor pool capacity, zero once released
    pub fn descriptors(&self) -> usize {
        self.pool.as_ref().map_or(0, DescriptorPool::capacity)
    }

    /// True once [`release`](Self::release) has run
    #[inline(always)]
    pub fn is_released(&self) -> bool {
        self.pool.is_none()
    }

    pub(super) fn regs(&self) -> EdmaRegs<'e, P::Window> {
        self.engine.edma(self.route.controller)
    }

    #[inline(always)]
    fn hw_channel(&self) -> u8 {
        self.route.channel.0
    }

    // =========================================================================
    // Engine Control
    // =========================================================================

    /// Start the compiled chain.
    ///
    /// Device-paced chains are armed by binding the mux and enabling the
    /// channel's requests; memory-to-memory chains are started in software.
    pub fn start(&mut self) -> Result<()> {
        let pool = self.pool.as_ref().ok_or(TransferError::Released)?;
        if self.running {
            return Err(TransferError::AlreadyRunning.into());
        }
        let head = match pool.head() {
            Some(head) if self.configured => head,
            _ => return Err(TransferError::NotConfigured.into()),
        };

        let engine = self.engine;
        let _lock = engine.lock(self.route.controller)?;
        let regs = self.regs();
        regs.clear_error(self.hw_channel());
        engine
            .dispatcher()
            .clear_fault(self.route.controller, self.route.channel);
        self.load_and_go(head);
        self.running = true;

        debug!(
            "eDMA{} channel {} started ({} segments, {} bytes)",
            self.route.controller.0,
            self.hw_channel(),
            self.segments,
            self.total
        );
        Ok(())
    }

    /// Stop the channel, leaving the compiled chain in place.
    ///
    /// Aborting a channel that is not running is a no-op.
    pub fn abort(&mut self) -> Result<()> {
        if self.pool.is_none() {
            return Err(TransferError::Released.into());
        }
        if !self.running {
            return Ok(());
        }
        let engine = self.engine;
        let _lock = engine.lock(self.route.controller)?;
        self.halt();
        self.running = false;
        debug!("eDMA{} channel {} aborted", self.route.controller.0, self.hw_channel());
        Ok(())
    }

    /// Acknowledge a completion.
    ///
    /// A repeating chain only has its DONE flag cleared and keeps running. A
    /// one-shot chain is halted and the channel returns to `Idle`; compile a
    /// new chain before starting it again.
    pub fn complete(&mut self) -> Result<()> {
        if self.pool.is_none() {
            return Err(TransferError::Released.into());
        }
        if !self.running {
            return Err(TransferError::NotRunning.into());
        }

        let engine = self.engine;
        let ch = self.hw_channel();
        if self.flags.contains(TransferFlags::REPEAT) {
            self.regs().clear_done(ch);
            return Ok(());
        }

        let _lock = engine.lock(self.route.controller)?;
        self.halt();
        self.regs().clear_done(ch);
        self.running = false;
        self.configured = false;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        if self.pool.is_none() {
            return ChannelState::Idle;
        }
        if self
            .engine
            .dispatcher()
            .fault(self.route.controller, self.route.channel)
        {
            return ChannelState::Error;
        }
        if self.running {
            let live = self.regs().tcd_csr(self.hw_channel());
            if live & csr::DONE != 0 && live & csr::ESG == 0 {
                ChannelState::Completing
            } else {
                ChannelState::Running
            }
        } else if self.configured {
            ChannelState::Configured
        } else {
            ChannelState::Idle
        }
    }

    /// State together with the channel's hardware flags
    pub fn status(&self) -> ChannelStatus {
        let regs = self.regs();
        let ch = self.hw_channel();
        let bit = 1u32 << ch;
        let live = regs.tcd_csr(ch);
        let fault = self
            .engine
            .dispatcher()
            .fault(self.route.controller, self.route.channel);
        ChannelStatus {
            state: self.state(),
            request_enabled: regs.erq() & bit != 0,
            done: live & csr::DONE != 0,
            active: live & csr::ACTIVE != 0,
            error: fault || regs.err() & bit != 0,
            descriptors_in_use: self.pool.as_ref().map_or(0, DescriptorPool::in_use),
        }
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Bytes of the compiled chain not yet transferred.
    ///
    /// Derived from the live memory-side address register: the segments
    /// before the one containing that address count as done. Returns zero
    /// when the channel is not running.
    ///
    /// A multi-segment memory-to-memory one-shot chain cannot be located from
    /// the live registers and reports zero.
    pub fn bytes_remaining(&self) -> u32 {
        let Some(pool) = self.pool.as_ref() else {
            return 0;
        };
        if !self.running {
            return 0;
        }

        let regs = self.regs();
        let ch = self.hw_channel();
        let live = regs.tcd_csr(ch);

        if self.segments == 1 && live & csr::DONE != 0 {
            return self.total;
        }
        if self.segments > 1
            && !self.flags.contains(TransferFlags::REPEAT)
            && !self.direction.is_device_paced()
        {
            return 0;
        }

        let position = match self.direction {
            Direction::MemToDevice => regs.tcd_saddr(ch),
            Direction::DeviceToMem | Direction::MemToMem => regs.tcd_daddr(ch),
        };
        // The last descriptor of a device chain stops with DREQ and DONE set
        // and its address wrapped back to the segment start
        let stopped = live & csr::DREQ != 0 && live & csr::DONE != 0;

        let mut transferred = 0u32;
        for index in pool.in_use_indices() {
            let segment = pool.node(index).segment;
            if let Some(done) = segment.progress(position) {
                transferred += if stopped && done == 0 { segment.len } else { done };
                return self.total.saturating_sub(transferred);
            }
            transferred += segment.len;
        }
        self.total
    }

    // =========================================================================
    // Hardware Sequences
    // =========================================================================

    /// Disable requests and wait, bounded, for the channel to go inactive.
    ///
    /// The live CSR loses START and ESG so a self-starting chain does not
    /// continue into its next descriptor. Callers hold the controller lock
    /// when they can.
    pub(super) fn halt(&self) {
        let regs = self.regs();
        let ch = self.hw_channel();
        regs.disable_request(ch);

        let mut delay = self.engine.platform().delay();
        let idle = wait_for(
            &mut delay,
            self.engine.config().halt_timeout_us,
            POLL_INTERVAL_US,
            || regs.tcd_csr(ch) & csr::ACTIVE == 0,
        );
        if !idle {
            warn!("eDMA{} channel {} still active after halt", self.route.controller.0, ch);
        }
        let live = regs.tcd_csr(ch);
        regs.set_tcd_csr(ch, live & !(csr::START | csr::ESG));
    }

    /// Load descriptor `index` into the live registers and arm the channel.
    ///
    /// Caller holds the controller lock.
    pub(super) fn load_and_go(&self, index: usize) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };
        let regs = self.regs();
        let ch = self.hw_channel();
        let image = pool.tcd(index).load();

        regs.clear_done(ch);
        regs.write_tcd(
            ch,
            &TcdImage {
                csr: image.csr & !csr::START,
                ..image
            },
        );
        if self.direction.is_device_paced()
            && let Some(mux) = self.engine.mux(self.route.controller, self.route.mux)
        {
            mux.bind(self.route.mux_channel, self.route.source);
        }
        regs.enable_error_interrupt(ch);
        if self.direction.is_device_paced() {
            regs.enable_request(ch);
        } else {
            regs.start(ch);
        }
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Stop the channel and return every resource it holds.
    ///
    /// Idempotent. Runs automatically on drop. If the controller lock cannot
    /// be taken the halt goes ahead without it.
    pub fn release(&mut self) {
        if self.pool.is_none() {
            return;
        }

        let engine = self.engine;
        let ch = self.hw_channel();
        match engine.lock(self.route.controller) {
            Ok(_lock) => self.halt(),
            Err(_) => {
                warn!("eDMA{} channel {}: releasing without the lock", self.route.controller.0, ch);
                self.halt();
            }
        }

        let regs = self.regs();
        regs.disable_error_interrupt(ch);
        regs.clear_done(ch);
        regs.clear_interrupt(ch);
        if let Some(mux) = engine.mux(self.route.controller, self.route.mux) {
            mux.unbind(self.route.mux_channel);
        }

        if let Some(pool) = self.pool.take() {
            pool.free_with(engine.platform());
        }
        engine
            .dispatcher()
            .unbind(self.route.controller, self.route.channel);
        self.route.release(engine.platform());

        self.running = false;
        self.configured = false;
        info!("eDMA{} channel {} released", self.route.controller.0, ch);
    }
}

impl<P: Platform> Drop for Channel<'_, P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P: Platform> core::fmt::Debug for Channel<'_, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("route", &self.route)
            .field("pool", &self.pool)
            .field("direction", &self.direction)
            .field("total", &self.total)
            .field("segments", &self.segments)
            .field("configured", &self.configured)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

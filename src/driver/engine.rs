//! Engine bring-up, channel acquisition and interrupt entry.
//!
//! One [`Engine`] exists per process. Creating it maps every controller's
//! registers, joins the process-shared coordination region and attaches the
//! interrupt lines. The first process to join resets the controllers; the
//! last one to leave disables them again.
//!
//! Channels borrow the engine, so the borrow checker guarantees every
//! [`Channel`] is released before the engine tears down.

use alloc::vec::Vec;

use super::channel::Channel;
use super::config::{ChannelConfig, ControllerDesc, EngineConfig};
use super::error::{ResourceError, Result};
use super::interrupt::{InterruptDispatcher, IrqKind};
use super::resource::{ChannelRoute, ControllerId};
use crate::hal::{DmaRegion, IrqHandle, Platform};
use crate::internal::dma::DescriptorPool;
use crate::internal::dma::descriptor::TcdImage;
use crate::internal::register::dmamux::{self, DmamuxRegs};
use crate::internal::register::edma::{self, CR_ERCA, CR_HOE, EdmaRegs};
use crate::sync::{ProcessLease, SharedLock};

// =============================================================================
// Helper Types
// =============================================================================

/// Mapped register windows of one controller
struct Controller<W> {
    desc: ControllerDesc,
    edma: W,
    muxes: Vec<W>,
}

/// One attached interrupt line
#[derive(Debug, Clone, Copy)]
struct IrqBinding {
    irq: u32,
    controller: ControllerId,
    kind: IrqKind,
    handle: IrqHandle,
}

// =============================================================================
// Engine
// =============================================================================

/// Process-wide eDMA engine.
///
/// # Example
///
/// ```ignore
/// let config = EngineConfig::for_machine("vf610-twr")?;
/// let engine = Engine::new(platform, config)?;
///
/// let mut channel = engine.acquire(ChannelConfig::new(12).with_event(event))?;
/// channel.compile(&request)?;
/// channel.start()?;
///
/// // From the host's interrupt thread:
/// if let Some(event) = engine.handle_interrupt(irq) {
///     deliver(event);
/// }
/// ```
pub struct Engine<P: Platform> {
    platform: P,
    config: EngineConfig,
    controllers: Vec<Controller<P::Window>>,
    dispatcher: InterruptDispatcher<P::Event>,
    irqs: Vec<IrqBinding>,
    lease: Option<ProcessLease>,
    joined: bool,
}

impl<P: Platform> Engine<P> {
    /// Bring the engine up for this process.
    ///
    /// On any failure everything acquired so far is handed back before the
    /// error is returned.
    pub fn new(platform: P, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let dispatcher = InterruptDispatcher::new(config.controllers.iter().map(|c| c.channels));
        let mut engine = Self {
            platform,
            config,
            controllers: Vec::new(),
            dispatcher,
            irqs: Vec::new(),
            lease: None,
            joined: false,
        };

        engine.map_controllers()?;

        let mut delay = engine.platform.delay();
        let lease = ProcessLease::open(
            &engine.platform,
            engine.config.shared_name,
            &mut delay,
            engine.config.lock_timeout_us,
        )?;
        let joined = lease.join(&mut delay, |first| {
            if first {
                engine.reset_controllers();
            }
        });
        if let Err(e) = joined {
            lease.close(&engine.platform);
            return Err(e);
        }
        engine.lease = Some(lease);
        engine.joined = true;

        engine.attach_irqs()?;

        info!(
            "eDMA engine up: {} controllers, {} slots",
            engine.controllers.len(),
            engine.config.total_slots()
        );
        Ok(engine)
    }

    fn map_controllers(&mut self) -> Result<()> {
        for desc in &self.config.controllers {
            let edma = self
                .platform
                .map_window(desc.base, edma::window_len(desc.channels as usize))
                .map_err(|_| ResourceError::MapFailed)?;
            let mut controller = Controller {
                desc: *desc,
                edma,
                muxes: Vec::with_capacity(desc.muxes.len()),
            };
            for mux in desc.muxes {
                match self
                    .platform
                    .map_window(mux.base, dmamux::window_len(mux.channels as usize))
                {
                    Ok(window) => controller.muxes.push(window),
                    Err(_) => {
                        error!("cannot map DMAMUX at {:#x}", mux.base);
                        Self::unmap_controller(&self.platform, controller);
                        return Err(ResourceError::MapFailed.into());
                    }
                }
            }
            self.controllers.push(controller);
        }
        Ok(())
    }

    fn attach_irqs(&mut self) -> Result<()> {
        for (index, desc) in self.config.controllers.iter().enumerate() {
            let controller = ControllerId(index as u8);
            let lines = desc
                .completion_irqs
                .iter()
                .map(|&irq| (irq, IrqKind::Completion))
                .chain(core::iter::once((desc.error_irq, IrqKind::Error)));
            for (irq, kind) in lines {
                let handle = self.platform.attach(irq).map_err(|_| {
                    error!("cannot attach interrupt {}", irq);
                    ResourceError::IrqAttachFailed
                })?;
                self.irqs.push(IrqBinding {
                    irq,
                    controller,
                    kind,
                    handle,
                });
            }
        }
        Ok(())
    }

    fn unmap_controller(platform: &P, controller: Controller<P::Window>) {
        for mux in controller.muxes {
            platform.unmap_window(mux);
        }
        platform.unmap_window(controller.edma);
    }

    /// Put every controller into a known state: no requests, no pending
    /// flags, zeroed descriptors, no mux routing.
    fn reset_controllers(&self) {
        for controller in &self.controllers {
            let regs = EdmaRegs::new(&controller.edma);
            regs.disable_all_requests();
            regs.disable_all_error_interrupts();
            regs.clear_all_interrupts();
            regs.clear_all_errors();
            regs.clear_all_done();

            let mut cr = CR_ERCA;
            if self.config.halt_on_error {
                cr |= CR_HOE;
            }
            regs.set_cr(cr);

            for channel in 0..controller.desc.channels {
                regs.write_tcd(channel, &TcdImage::default());
            }
            self.unbind_muxes(controller);
        }
        info!("controllers reset");
    }

    fn disable_controllers(&self) {
        for controller in &self.controllers {
            let regs = EdmaRegs::new(&controller.edma);
            regs.disable_all_requests();
            regs.disable_all_error_interrupts();
            self.unbind_muxes(controller);
        }
        info!("controllers disabled");
    }

    fn unbind_muxes(&self, controller: &Controller<P::Window>) {
        for (window, desc) in controller.muxes.iter().zip(controller.desc.muxes) {
            let mux = DmamuxRegs::new(window);
            for channel in 0..desc.channels {
                mux.unbind(channel);
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Engine configuration
    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Host platform
    #[inline(always)]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mux slots served across every controller
    pub fn total_slots(&self) -> u32 {
        self.config.total_slots()
    }

    pub(super) fn dispatcher(&self) -> &InterruptDispatcher<P::Event> {
        &self.dispatcher
    }

    pub(super) fn edma(&self, controller: ControllerId) -> EdmaRegs<'_, P::Window> {
        EdmaRegs::new(&self.controllers[controller.index()].edma)
    }

    pub(super) fn mux(&self, controller: ControllerId, mux: usize) -> Option<DmamuxRegs<'_, P::Window>> {
        let window = self.controllers.get(controller.index())?.muxes.get(mux)?;
        Some(DmamuxRegs::new(window))
    }

    /// Take the cross-process lock of one controller
    pub fn lock(&self, controller: ControllerId) -> Result<SharedLock<'_>> {
        let lease = self
            .lease
            .as_ref()
            .ok_or(ResourceError::SharedMemoryFailed)?;
        let mut delay = self.platform.delay();
        lease.lock_controller(controller.index(), &mut delay)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Claim a channel for a mux slot.
    ///
    /// The channel comes back quiesced, with its pool allocated and its
    /// notifications installed.
    pub fn acquire(&self, config: ChannelConfig<P::Event>) -> Result<Channel<'_, P>> {
        let route = ChannelRoute::claim(&self.platform, &self.config.controllers, config.slot)?;
        let capacity = config.descriptors.unwrap_or(self.config.descriptors);
        let pool = match DescriptorPool::allocate(&self.platform, capacity) {
            Ok(pool) => pool,
            Err(e) => {
                route.release(&self.platform);
                return Err(e);
            }
        };

        let regs = self.edma(route.controller);
        let ch = route.channel.0;
        regs.disable_request(ch);
        regs.disable_error_interrupt(ch);
        regs.clear_done(ch);
        regs.clear_error(ch);
        regs.clear_interrupt(ch);
        if let Some(priority) = config.priority {
            regs.set_priority(ch, priority);
        }
        if let Some(mux) = self.mux(route.controller, route.mux) {
            mux.unbind(route.mux_channel);
        }

        self.dispatcher
            .bind(route.controller, route.channel, config.event, config.error_event);

        info!(
            "eDMA{} channel {} acquired for slot {} ({} descriptors)",
            route.controller.0, ch, route.slot, capacity
        );
        Ok(Channel::new(self, route, pool))
    }

    // =========================================================================
    // Interrupts
    // =========================================================================

    /// Service interrupt line `irq` and return the notification to deliver.
    ///
    /// Call once per interrupt. Lines not attached by this engine return
    /// `None`.
    pub fn handle_interrupt(&self, irq: u32) -> Option<P::Event> {
        self.irqs
            .iter()
            .filter(|binding| binding.irq == irq)
            .find_map(|binding| {
                let regs = self.edma(binding.controller);
                match binding.kind {
                    IrqKind::Completion => self.dispatcher.on_completion(binding.controller, &regs),
                    IrqKind::Error => self.dispatcher.on_error(binding.controller, &regs),
                }
            })
    }

    /// Interrupt lines attached by this engine
    pub fn irqs(&self) -> impl Iterator<Item = (u32, IrqKind)> + '_ {
        self.irqs.iter().map(|binding| (binding.irq, binding.kind))
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    /// Allocate a DMA-visible buffer addressable by the engine
    pub fn alloc_buffer(&self, len: usize) -> Result<DmaRegion> {
        let region = self
            .platform
            .alloc_dma(len)
            .map_err(|_| ResourceError::AllocFailed)?;
        if region.phys() + len as u64 > u64::from(u32::MAX) + 1 {
            self.platform.free_dma(region);
            return Err(ResourceError::AllocFailed.into());
        }
        Ok(region)
    }

    /// Return a buffer from [`alloc_buffer`](Self::alloc_buffer)
    pub fn free_buffer(&self, region: DmaRegion) {
        self.platform.free_dma(region);
    }
}

impl<P: Platform> Drop for Engine<P> {
    fn drop(&mut self) {
        for binding in self.irqs.drain(..) {
            self.platform.detach(binding.handle);
        }

        if let Some(lease) = self.lease.take() {
            if self.joined {
                let mut delay = self.platform.delay();
                lease.leave(&mut delay, |last| {
                    if last {
                        self.disable_controllers();
                    }
                });
            }
            lease.close(&self.platform);
        }

        for controller in core::mem::take(&mut self.controllers) {
            Self::unmap_controller(&self.platform, controller);
        }
        debug!("eDMA engine down");
    }
}

impl<P: Platform> core::fmt::Debug for Engine<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("controllers", &self.controllers.len())
            .field("irqs", &self.irqs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::sync::Barrier;
    use std::vec::Vec;

    use super::*;
    use crate::driver::config::{Direction, Fragment, TransferFlags, TransferRequest};
    use crate::driver::error::{ConfigError, Error};
    use crate::hal::RegisterIo;
    use crate::internal::register::dmamux::CHCFG_ENBL;
    use crate::internal::register::edma::SERQ_OFFSET;
    use crate::testing::{MockPlatform, Rig, TEST_CONTROLLERS, TEST_FIFO, test_config};

    #[test]
    fn first_process_resets_the_controllers() {
        let platform = MockPlatform::new();
        let engine = Engine::new(platform.clone(), test_config()).unwrap();
        let hw = platform.registers(TEST_CONTROLLERS[0].base);
        assert_eq!(hw.cr(), CR_ERCA);
        assert_eq!(hw.erq(), 0);
        assert_eq!(platform.attached_irqs(), [40, 41, 42, 44, 43]);
        assert_eq!(platform.live_windows(), 5);
        assert_eq!(engine.irqs().count(), 5);

        drop(engine);
        assert!(platform.attached_irqs().is_empty());
        assert_eq!(platform.live_windows(), 0);
    }

    #[test]
    fn halt_on_error_is_programmed() {
        let platform = MockPlatform::new();
        let _engine = Engine::new(platform.clone(), test_config().with_halt_on_error(true)).unwrap();
        assert_eq!(platform.registers(TEST_CONTROLLERS[1].base).cr(), CR_ERCA | CR_HOE);
    }

    #[test]
    fn later_processes_share_the_hardware() {
        let platform = MockPlatform::new();
        let a = Engine::new(platform.clone(), test_config()).unwrap();
        let mut channel = a.acquire(ChannelConfig::new(5)).unwrap();
        let ch = channel.channel().0;

        let s = [Fragment::new(0x2000_0000)];
        let d = [Fragment::new(TEST_FIFO)];
        let request = TransferRequest::new(Direction::MemToDevice, &s, &d, 16)
            .with_flags(TransferFlags::DST_NO_INCREMENT);
        channel.compile(&request).unwrap();
        channel.start().unwrap();

        // Joining does not reset a running channel
        let b = Engine::new(platform.clone(), test_config()).unwrap();
        let hw = platform.registers(TEST_CONTROLLERS[0].base);
        assert_ne!(hw.erq() & (1 << ch), 0);

        // A channel claimed by one process is not handed out by the other
        let other = b.acquire(ChannelConfig::new(6)).unwrap();
        assert_ne!(other.channel(), channel.channel());
        drop(other);

        drop(b);
        assert_ne!(hw.erq() & (1 << ch), 0);

        // Leave the request enabled so the last process has something to disable
        core::mem::forget(channel);
        drop(a);
        let mux = platform.registers(TEST_CONTROLLERS[0].muxes[0].base);
        assert_eq!(hw.erq(), 0);
        assert_eq!(mux.chcfg(ch) & CHCFG_ENBL, 0);
    }

    #[test]
    fn irq_failure_unwinds_everything() {
        let platform = MockPlatform::new();
        platform.fail_irq(Some(43));
        let err = Engine::new(platform.clone(), test_config()).err();
        assert_eq!(err, Some(Error::Resource(ResourceError::IrqAttachFailed)));
        assert!(platform.attached_irqs().is_empty());
        assert_eq!(platform.live_windows(), 0);

        // The failed engine left the coordination region: the next one is
        // first again and resets the hardware
        let hw = platform.registers(TEST_CONTROLLERS[0].base);
        hw.write8(SERQ_OFFSET, 3);
        assert_eq!(hw.erq(), 1 << 3);
        platform.fail_irq(None);
        let _engine = Engine::new(platform.clone(), test_config()).unwrap();
        assert_eq!(hw.erq(), 0);
    }

    #[test]
    fn map_failure_unwinds() {
        let platform = MockPlatform::new();
        platform.fail_map_at(Some(0x4002_5000));
        let err = Engine::new(platform.clone(), test_config()).err();
        assert_eq!(err, Some(Error::Resource(ResourceError::MapFailed)));
        assert_eq!(platform.live_windows(), 0);
        assert!(platform.attached_irqs().is_empty());
    }

    #[test]
    fn invalid_config_touches_nothing() {
        let platform = MockPlatform::new();
        let err = Engine::new(platform.clone(), EngineConfig::new()).err();
        assert_eq!(err, Some(Error::Config(ConfigError::InvalidController)));
        assert_eq!(platform.live_windows(), 0);
    }

    #[test]
    fn acquire_quiesces_and_applies_options() {
        let rig = Rig::new();
        let channel = rig
            .engine
            .acquire(ChannelConfig::new(66).with_descriptors(3).with_priority(9))
            .unwrap();
        assert_eq!(channel.controller(), ControllerId(1));
        assert_eq!(channel.descriptors(), 3);
        assert_eq!(rig.edma1().priority(channel.channel().0), 9);
        assert_eq!(rig.edma1().erq(), 0);
        assert_eq!(rig.edma1().eei(), 0);
    }

    #[test]
    fn acquire_failure_returns_the_channel() {
        let rig = Rig::new();
        rig.platform.fail_dma_alloc(true);
        assert_eq!(
            rig.engine.acquire(ChannelConfig::new(0)).err(),
            Some(Error::Resource(ResourceError::AllocFailed))
        );
        assert_eq!(rig.platform.reserved_channels(), 0);

        assert_eq!(
            rig.engine.acquire(ChannelConfig::new(80)).err(),
            Some(Error::Config(ConfigError::SlotOutOfRange))
        );
    }

    #[test]
    fn concurrent_acquisition_never_shares_a_channel() {
        let platform = MockPlatform::new();
        let config = test_config().with_lock_timeout_us(1_000_000);
        let barrier = Barrier::new(8);

        // Every worker stands in for a separate process with its own engine
        let claimed: Vec<Option<u8>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8u32)
                .map(|i| {
                    let platform = platform.clone();
                    let config = config.clone();
                    let barrier = &barrier;
                    scope.spawn(move || {
                        let engine = Engine::new(platform, config).unwrap();
                        let channel = engine.acquire(ChannelConfig::new(64 + i)).ok();
                        let id = channel.as_ref().map(|c| c.channel().0);
                        // Hold every channel and engine until all workers have tried
                        barrier.wait();
                        id
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let mut ids: Vec<u8> = claimed.into_iter().flatten().collect();
        ids.sort_unstable();
        assert_eq!(ids, [0, 1, 2, 3]);
        assert_eq!(platform.reserved_channels(), 0);
        assert_eq!(platform.live_windows(), 0);
    }

    #[test]
    fn unknown_or_idle_lines_deliver_nothing() {
        let rig = Rig::new();
        assert_eq!(rig.engine.handle_interrupt(7), None);
        assert_eq!(rig.engine.handle_interrupt(40), None);
        assert_eq!(rig.engine.handle_interrupt(41), None);
    }

    #[test]
    fn second_completion_line_serves_the_same_controller() {
        let rig = Rig::new();
        let channel = rig
            .engine
            .acquire(ChannelConfig::new(65).with_event(11))
            .unwrap();
        rig.edma1().raise_interrupt(channel.channel().0);
        assert_eq!(rig.engine.handle_interrupt(44), Some(11));
        assert_eq!(rig.edma1().int(), 0);
    }

    #[test]
    fn buffers_must_be_addressable() {
        let platform = MockPlatform::with_phys_base(0xFFFF_FF00);
        let engine = Engine::new(platform.clone(), test_config()).unwrap();
        assert_eq!(
            engine.alloc_buffer(0x200).err(),
            Some(Error::Resource(ResourceError::AllocFailed))
        );
        assert_eq!(platform.live_dma_regions(), 0);

        let engine_low = Rig::new();
        let buffer = engine_low.engine.alloc_buffer(64).unwrap();
        assert_eq!(buffer.len(), 64);
        assert_eq!(engine_low.platform.live_dma_regions(), 1);
        engine_low.engine.free_buffer(buffer);
        assert_eq!(engine_low.platform.live_dma_regions(), 0);
    }
}

//! Interrupt dispatch and channel status
//!
//! Every controller raises completion interrupts on one or more lines and
//! errors on a separate line. The dispatcher keeps one table entry per
//! channel of every controller holding the notifications to deliver, and
//! decodes the controller's INT and ERR bitmaps into those notifications.
//!
//! Handlers run in interrupt context, so the table lives in a
//! [`CriticalSectionCell`] and the decode path never allocates.

use alloc::vec::Vec;

use super::channel::ChannelState;
use super::resource::{ChannelId, ControllerId};
use crate::hal::RegisterIo;
use crate::internal::register::edma::{ES_ERRCHN_MASK, ES_ERRCHN_SHIFT, EdmaRegs};
use crate::sync::CriticalSectionCell;

// =============================================================================
// Interrupt Kinds
// =============================================================================

/// What an attached interrupt line reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqKind {
    /// Major loop completion
    Completion,
    /// Channel error
    Error,
}

// =============================================================================
// Channel Status
// =============================================================================

/// Snapshot of one channel's software and hardware state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStatus {
    /// Lifecycle state
    pub state: ChannelState,
    /// Hardware requests enabled (ERQ)
    pub request_enabled: bool,
    /// Live CSR.DONE
    pub done: bool,
    /// Live CSR.ACTIVE
    pub active: bool,
    /// Error latched by the hardware or the dispatcher
    pub error: bool,
    /// Descriptors holding the current chain
    pub descriptors_in_use: usize,
}

// =============================================================================
// Dispatcher
// =============================================================================

struct ChannelSlot<E> {
    event: Option<E>,
    error_event: Option<E>,
    fault: bool,
}

impl<E> ChannelSlot<E> {
    const fn empty() -> Self {
        Self {
            event: None,
            error_event: None,
            fault: false,
        }
    }
}

/// Per-channel notification table shared with interrupt handlers.
pub(crate) struct InterruptDispatcher<E> {
    slots: CriticalSectionCell<Vec<ChannelSlot<E>>>,
    /// Table index of each controller's channel 0 and its channel count
    controllers: Vec<(usize, u8)>,
}

impl<E: Clone> InterruptDispatcher<E> {
    /// Table with room for every channel of controllers with the given widths
    pub fn new(channels: impl IntoIterator<Item = u8>) -> Self {
        let mut controllers = Vec::new();
        let mut total = 0;
        for count in channels {
            controllers.push((total, count));
            total += count as usize;
        }
        let slots = (0..total).map(|_| ChannelSlot::empty()).collect();
        Self {
            slots: CriticalSectionCell::new(slots),
            controllers,
        }
    }

    /// Table entry of a channel; `None` past the controller's last channel
    fn index(&self, controller: ControllerId, channel: ChannelId) -> Option<usize> {
        let (offset, count) = *self.controllers.get(controller.index())?;
        (channel.0 < count).then_some(offset + channel.0 as usize)
    }

    fn with_slot<R>(
        &self,
        controller: ControllerId,
        channel: ChannelId,
        f: impl FnOnce(&mut ChannelSlot<E>) -> R,
    ) -> Option<R> {
        let index = self.index(controller, channel)?;
        self.slots.with(|slots| slots.get_mut(index).map(f))
    }

    /// Install a channel's notifications and clear any stale fault
    pub fn bind(
        &self,
        controller: ControllerId,
        channel: ChannelId,
        event: Option<E>,
        error_event: Option<E>,
    ) {
        self.with_slot(controller, channel, |slot| {
            *slot = ChannelSlot {
                event,
                error_event,
                fault: false,
            };
        });
    }

    /// Drop a channel's notifications
    pub fn unbind(&self, controller: ControllerId, channel: ChannelId) {
        self.with_slot(controller, channel, |slot| *slot = ChannelSlot::empty());
    }

    /// Whether a completion notification is installed
    pub fn has_event(&self, controller: ControllerId, channel: ChannelId) -> bool {
        self.with_slot(controller, channel, |slot| slot.event.is_some())
            .unwrap_or(false)
    }

    /// Whether an error was dispatched and not yet cleared
    pub fn fault(&self, controller: ControllerId, channel: ChannelId) -> bool {
        self.with_slot(controller, channel, |slot| slot.fault)
            .unwrap_or(false)
    }

    /// Forget a dispatched error
    pub fn clear_fault(&self, controller: ControllerId, channel: ChannelId) {
        self.with_slot(controller, channel, |slot| slot.fault = false);
    }

    /// Service a completion line.
    ///
    /// Only the lowest pending channel is acknowledged. Any other pending
    /// channel keeps its INT bit and is picked up on the next invocation.
    pub fn on_completion<W: RegisterIo + ?Sized>(
        &self,
        controller: ControllerId,
        regs: &EdmaRegs<'_, W>,
    ) -> Option<E> {
        let pending = regs.int();
        if pending == 0 {
            return None;
        }
        let channel = pending.trailing_zeros() as u8;
        regs.clear_interrupt(channel);
        trace!("eDMA{} channel {} complete", controller.0, channel);
        self.with_slot(controller, ChannelId(channel), |slot| slot.event.clone())
            .flatten()
    }

    /// Service an error line.
    ///
    /// Every flagged channel has its error cleared, its requests disabled and
    /// its fault latched. The first flagged channel with an error
    /// notification gets it delivered.
    pub fn on_error<W: RegisterIo + ?Sized>(
        &self,
        controller: ControllerId,
        regs: &EdmaRegs<'_, W>,
    ) -> Option<E> {
        let flagged = regs.err();
        if flagged == 0 {
            return None;
        }
        let status = regs.es();
        warn!(
            "eDMA{} error: ERR={:#010x} ES={:#010x} (channel {})",
            controller.0,
            flagged,
            status,
            (status & ES_ERRCHN_MASK) >> ES_ERRCHN_SHIFT
        );

        let mut delivered = None;
        let mut bits = flagged;
        while bits != 0 {
            let channel = bits.trailing_zeros() as u8;
            bits &= bits - 1;

            regs.clear_error(channel);
            regs.disable_request(channel);
            let event = self
                .with_slot(controller, ChannelId(channel), |slot| {
                    slot.fault = true;
                    slot.error_event.clone()
                })
                .flatten();
            if delivered.is_none() {
                delivered = event;
            }
        }
        delivered
    }
}

// =============================================================================
// Tests
// =============================================================================

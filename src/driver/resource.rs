//! Channel resource management
//!
//! Clients name a peripheral by its global mux slot. Slots are numbered
//! across every mux of every controller in configuration order, so the slot
//! alone decides which controller serves the request and which of that
//! controller's channels are eligible. The channel itself is claimed from
//! the system-wide [`ResourceRegistry`], which is what keeps two processes
//! from driving the same channel.

use core::ops::Range;

use super::config::{ControllerDesc, MuxDesc};
use super::error::{ConfigError, ConfigResult, ResourceError, Result};
use crate::hal::{ResourceHandle, ResourceRegistry};

/// Index of an eDMA controller in the engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerId(pub u8);

impl ControllerId {
    #[inline(always)]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Controller-local channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u8);

/// Where a slot's requests enter the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotRoute {
    pub controller: usize,
    pub mux: usize,
    /// Mux-local source number programmed into CHCFG
    pub source: u8,
}

/// Find the controller and mux that own global `slot`.
pub(crate) fn resolve_slot(controllers: &[ControllerDesc], slot: u32) -> ConfigResult<SlotRoute> {
    let mut base = 0u32;
    for (controller, desc) in controllers.iter().enumerate() {
        for (mux, mux_desc) in desc.muxes.iter().enumerate() {
            if slot < base + mux_desc.slots {
                return Ok(SlotRoute {
                    controller,
                    mux,
                    source: (slot - base) as u8,
                });
            }
            base += mux_desc.slots;
        }
    }
    Err(ConfigError::SlotOutOfRange)
}

/// Registry numbers of the channels a mux feeds
pub(crate) fn channel_range(desc: &ControllerDesc, mux: &MuxDesc) -> Range<u32> {
    let first = desc.channel_base + u32::from(mux.first_channel);
    first..first + u32::from(mux.channels)
}

/// A channel claimed for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRoute {
    /// Controller serving the channel
    pub controller: ControllerId,
    /// Controller-local channel number
    pub channel: ChannelId,
    /// Global slot the channel was claimed for
    pub slot: u32,
    pub(crate) mux: usize,
    pub(crate) mux_channel: u8,
    pub(crate) source: u8,
    pub(crate) handle: ResourceHandle,
}

impl ChannelRoute {
    /// Resolve `slot` and reserve one free channel behind its mux.
    pub(crate) fn claim<R: ResourceRegistry + ?Sized>(
        registry: &R,
        controllers: &[ControllerDesc],
        slot: u32,
    ) -> Result<Self> {
        let route = resolve_slot(controllers, slot)?;
        let desc = &controllers[route.controller];
        let mux = &desc.muxes[route.mux];
        let range = channel_range(desc, mux);

        let handle = registry.reserve(range.clone(), 1)?;
        if handle.count != 1 || !range.contains(&handle.start) {
            error!("registry returned {} outside {}..{}", handle.start, range.start, range.end);
            registry.release(handle);
            return Err(ResourceError::NoFreeChannel.into());
        }

        let channel = (handle.start - desc.channel_base) as u8;
        debug!(
            "slot {} -> eDMA{} channel {} (mux {} source {})",
            slot, route.controller, channel, route.mux, route.source
        );
        Ok(Self {
            controller: ControllerId(route.controller as u8),
            channel: ChannelId(channel),
            slot,
            mux: route.mux,
            mux_channel: channel - mux.first_channel,
            source: route.source,
            handle,
        })
    }

    /// Hand the channel back to the registry
    pub(crate) fn release<R: ResourceRegistry + ?Sized>(&self, registry: &R) {
        registry.release(self.handle);
    }
}

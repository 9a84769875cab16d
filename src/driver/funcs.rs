//! Outward function table
//!
//! Peripheral drivers written against a generic DMA interface see the engine
//! through [`DmaFunctions`]: attach a channel from an option string, set up
//! and run transfers, poll progress. [`Engine`] implements it by forwarding
//! to its own methods and those of [`Channel`].

use bitflags::bitflags;

use super::channel::Channel;
use super::config::{ChannelConfig, TransferRequest};
use super::engine::Engine;
use super::error::Result;
use super::interrupt::ChannelStatus;
use super::resource::{ChannelId, ControllerId};
use crate::hal::{DmaRegion, Platform};
use crate::internal::constants::{MAX_MAJOR_ITERATIONS, UNIT_SIZES};

bitflags! {
    /// Transfer kinds and features the engine supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Memory to memory copies
        const MEM_TO_MEM = 1 << 0;
        /// Memory to peripheral transfers
        const MEM_TO_DEVICE = 1 << 1;
        /// Peripheral to memory transfers
        const DEVICE_TO_MEM = 1 << 2;
        /// Multi-fragment scatter-gather chains
        const SCATTER_GATHER = 1 << 3;
        /// Chains that loop back to their start
        const REPEAT = 1 << 4;
        /// Appending to a running chain
        const APPEND = 1 << 5;
        /// Notification on channel errors
        const ERROR_EVENT = 1 << 6;
    }
}

/// Engine-wide description returned by [`DmaFunctions::driver_info`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    /// Crate version
    pub version: &'static str,
    /// Controllers managed
    pub controllers: usize,
    /// Channels across every controller
    pub channels: u32,
    /// Mux slots across every controller
    pub slots: u32,
    /// Accepted transfer unit sizes in bytes
    pub unit_sizes: &'static [u32],
    /// Largest unit count of one segment
    pub max_units_per_segment: u32,
    /// Supported features
    pub capabilities: Capabilities,
}

/// Per-channel description returned by [`DmaFunctions::channel_info`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Controller serving the channel
    pub controller: ControllerId,
    /// Controller-local channel number
    pub channel: ChannelId,
    /// Mux slot the channel serves
    pub slot: u32,
    /// Descriptor pool capacity (maximum segments per chain)
    pub descriptors: usize,
    /// Required fragment address alignment in bytes
    pub alignment: u32,
}

/// Generic DMA driver interface.
pub trait DmaFunctions {
    /// Notification type delivered on completion and error
    type Event;

    /// Attached channel handle
    type Channel<'a>
    where
        Self: 'a;

    /// Describe the engine
    fn driver_info(&self) -> DriverInfo;

    /// Describe an attached channel
    fn channel_info(&self, channel: &Self::Channel<'_>) -> ChannelInfo;

    /// Attach a channel from an option string such as `"slot=12,tcds=32"`
    fn channel_attach(
        &self,
        options: &str,
        event: Option<Self::Event>,
        error_event: Option<Self::Event>,
    ) -> Result<Self::Channel<'_>>;

    /// Release an attached channel
    fn channel_release(&self, channel: Self::Channel<'_>);

    /// Compile a transfer onto the channel
    fn setup_transfer(&self, channel: &mut Self::Channel<'_>, request: &TransferRequest<'_>)
    -> Result<()>;

    /// Start the compiled transfer
    fn xfer_start(&self, channel: &mut Self::Channel<'_>) -> Result<()>;

    /// Stop the channel
    fn xfer_abort(&self, channel: &mut Self::Channel<'_>) -> Result<()>;

    /// Acknowledge a completion notification
    fn xfer_complete(&self, channel: &mut Self::Channel<'_>) -> Result<()>;

    /// Bytes not yet transferred
    fn bytes_left(&self, channel: &Self::Channel<'_>) -> u32;

    /// Allocate a DMA-visible buffer
    fn alloc_buffer(&self, len: usize) -> Result<DmaRegion>;

    /// Free a buffer from [`alloc_buffer`](Self::alloc_buffer)
    fn free_buffer(&self, region: DmaRegion);

    /// Channel state and hardware flags
    fn query_channel(&self, channel: &Self::Channel<'_>) -> ChannelStatus;
}

impl<P: Platform> DmaFunctions for Engine<P> {
    type Event = P::Event;
    type Channel<'a>
        = Channel<'a, P>
    where
        Self: 'a;

    fn driver_info(&self) -> DriverInfo {
        let controllers = &self.config().controllers;
        DriverInfo {
            version: env!("CARGO_PKG_VERSION"),
            controllers: controllers.len(),
            channels: controllers.iter().map(|c| u32::from(c.channels)).sum(),
            slots: self.total_slots(),
            unit_sizes: &UNIT_SIZES,
            max_units_per_segment: MAX_MAJOR_ITERATIONS,
            capabilities: Capabilities::all(),
        }
    }

    fn channel_info(&self, channel: &Channel<'_, P>) -> ChannelInfo {
        ChannelInfo {
            controller: channel.controller(),
            channel: channel.channel(),
            slot: channel.slot(),
            descriptors: channel.descriptors(),
            alignment: 1,
        }
    }

    fn channel_attach(
        &self,
        options: &str,
        event: Option<P::Event>,
        error_event: Option<P::Event>,
    ) -> Result<Channel<'_, P>> {
        let mut config = ChannelConfig::parse(options)?;
        config.event = event;
        config.error_event = error_event;
        self.acquire(config)
    }

    fn channel_release(&self, mut channel: Channel<'_, P>) {
        channel.release();
    }

    fn setup_transfer(&self, channel: &mut Channel<'_, P>, request: &TransferRequest<'_>) -> Result<()> {
        channel.compile(request)
    }

    fn xfer_start(&self, channel: &mut Channel<'_, P>) -> Result<()> {
        channel.start()
    }

    fn xfer_abort(&self, channel: &mut Channel<'_, P>) -> Result<()> {
        channel.abort()
    }

    fn xfer_complete(&self, channel: &mut Channel<'_, P>) -> Result<()> {
        channel.complete()
    }

    fn bytes_left(&self, channel: &Channel<'_, P>) -> u32 {
        channel.bytes_remaining()
    }

    fn alloc_buffer(&self, len: usize) -> Result<DmaRegion> {
        Engine::alloc_buffer(self, len)
    }

    fn free_buffer(&self, region: DmaRegion) {
        Engine::free_buffer(self, region);
    }

    fn query_channel(&self, channel: &Channel<'_, P>) -> ChannelStatus {
        channel.status()
    }
}

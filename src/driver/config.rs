//! Configuration types for the eDMA engine

use alloc::vec::Vec;

use bitflags::bitflags;

use super::error::{ConfigError, ConfigResult};
use crate::internal::constants::{
    DEFAULT_DESCRIPTORS, DEFAULT_SHARED_NAME, HALT_TIMEOUT_US, LOCK_TIMEOUT_US,
    MAX_CHANNEL_PRIORITY, MAX_CHANNELS_PER_CONTROLLER, MAX_CONTROLLERS, MAX_MUX_SLOTS,
};
use crate::variants::Variant;

// =============================================================================
// Hardware Description
// =============================================================================

/// One DMAMUX instance feeding a contiguous run of a controller's channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxDesc {
    /// Physical base address of the DMAMUX registers
    pub base: u64,
    /// Peripheral request sources (slots) the mux can route
    pub slots: u32,
    /// First controller channel served by the mux
    pub first_channel: u8,
    /// Number of channels served by the mux
    pub channels: u8,
}

/// One eDMA controller and the multiplexers in front of it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerDesc {
    /// Physical base address of the eDMA registers
    pub base: u64,
    /// Channels implemented by the controller
    pub channels: u8,
    /// Number of the controller's channel 0 in the resource registry
    pub channel_base: u32,
    /// Interrupt lines raised on channel completion
    pub completion_irqs: &'static [u32],
    /// Interrupt line raised on channel errors
    pub error_irq: u32,
    /// Request multiplexers, in slot order
    pub muxes: &'static [MuxDesc],
}

impl ControllerDesc {
    /// Total peripheral slots across all of this controller's muxes
    pub fn slots(&self) -> u32 {
        self.muxes.iter().map(|m| m.slots).sum()
    }

    fn validate(&self) -> ConfigResult<()> {
        let channels = self.channels as usize;
        if channels == 0 || channels > MAX_CHANNELS_PER_CONTROLLER || self.muxes.is_empty() {
            return Err(ConfigError::InvalidController);
        }
        let fits = self.muxes.iter().all(|m| {
            m.channels > 0
                && m.slots > 0
                && m.slots <= MAX_MUX_SLOTS
                && m.first_channel as usize + m.channels as usize <= channels
        });
        if !fits {
            return Err(ConfigError::InvalidController);
        }
        Ok(())
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Process-wide engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Controllers managed by the engine, in slot order
    pub controllers: Vec<ControllerDesc>,
    /// Name of the process-shared coordination region
    pub shared_name: &'static str,
    /// Descriptors allocated per channel when the channel does not say
    pub descriptors: usize,
    /// Budget for a channel to go inactive after a halt
    pub halt_timeout_us: u32,
    /// Budget for acquiring a cross-process lock
    pub lock_timeout_us: u32,
    /// Stop every channel of a controller on any error (CR.HOE)
    pub halt_on_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a configuration with defaults and no controllers
    #[must_use]
    pub const fn new() -> Self {
        Self {
            controllers: Vec::new(),
            shared_name: DEFAULT_SHARED_NAME,
            descriptors: DEFAULT_DESCRIPTORS,
            halt_timeout_us: HALT_TIMEOUT_US,
            lock_timeout_us: LOCK_TIMEOUT_US,
            halt_on_error: false,
        }
    }

    /// Create a configuration for a known hardware variant
    #[must_use]
    pub fn for_variant(variant: Variant) -> Self {
        Self::new().with_controllers(variant.controllers())
    }

    /// Create a configuration from a machine identifier string
    pub fn for_machine(machine: &str) -> ConfigResult<Self> {
        Ok(Self::for_variant(Variant::from_machine(machine)?))
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Append a controller
    #[must_use]
    pub fn with_controller(mut self, controller: ControllerDesc) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Append several controllers
    #[must_use]
    pub fn with_controllers(mut self, controllers: &[ControllerDesc]) -> Self {
        self.controllers.extend_from_slice(controllers);
        self
    }

    /// Set the coordination region name
    #[must_use]
    pub const fn with_shared_name(mut self, name: &'static str) -> Self {
        self.shared_name = name;
        self
    }

    /// Set the default descriptors per channel
    #[must_use]
    pub const fn with_descriptors(mut self, descriptors: usize) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Set the halt timeout
    #[must_use]
    pub const fn with_halt_timeout_us(mut self, timeout_us: u32) -> Self {
        self.halt_timeout_us = timeout_us;
        self
    }

    /// Set the cross-process lock timeout
    #[must_use]
    pub const fn with_lock_timeout_us(mut self, timeout_us: u32) -> Self {
        self.lock_timeout_us = timeout_us;
        self
    }

    /// Enable or disable halt-on-error
    #[must_use]
    pub const fn with_halt_on_error(mut self, enabled: bool) -> Self {
        self.halt_on_error = enabled;
        self
    }

    /// Total mux slots across every controller
    pub fn total_slots(&self) -> u32 {
        self.controllers.iter().map(ControllerDesc::slots).sum()
    }

    /// Check the configuration before the engine touches any hardware
    pub fn validate(&self) -> ConfigResult<()> {
        if self.controllers.is_empty() || self.controllers.len() > MAX_CONTROLLERS {
            return Err(ConfigError::InvalidController);
        }
        if self.descriptors == 0 {
            return Err(ConfigError::InvalidDescriptorCount);
        }
        self.controllers.iter().try_for_each(ControllerDesc::validate)
    }
}

// =============================================================================
// Channel Configuration
// =============================================================================

/// Per-channel attach options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig<E = ()> {
    /// Global mux slot (peripheral request line) to serve
    pub slot: u32,
    /// Descriptor pool capacity; the engine default when `None`
    pub descriptors: Option<usize>,
    /// Arbitration priority (DCHPRI); left as is when `None`
    pub priority: Option<u8>,
    /// Notification delivered on transfer completion
    pub event: Option<E>,
    /// Notification delivered on a channel error
    pub error_event: Option<E>,
}

impl<E> ChannelConfig<E> {
    /// Options for `slot` with engine defaults
    #[must_use]
    pub const fn new(slot: u32) -> Self {
        Self {
            slot,
            descriptors: None,
            priority: None,
            event: None,
            error_event: None,
        }
    }

    /// Set the descriptor pool capacity
    #[must_use]
    pub fn with_descriptors(mut self, descriptors: usize) -> Self {
        self.descriptors = Some(descriptors);
        self
    }

    /// Set the arbitration priority
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attach a completion notification
    #[must_use]
    pub fn with_event(mut self, event: E) -> Self {
        self.event = Some(event);
        self
    }

    /// Attach an error notification
    #[must_use]
    pub fn with_error_event(mut self, event: E) -> Self {
        self.error_event = Some(event);
        self
    }

    /// Parse a driver option string such as `"slot=12,tcds=32,prio=3"`.
    ///
    /// Keys: `slot` (required), `tcds`/`descriptors`, `prio`/`priority`.
    /// Values are decimal or `0x`-prefixed hex.
    pub fn parse(options: &str) -> ConfigResult<Self> {
        let mut slot = None;
        let mut config = Self::new(0);

        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = option.split_once('=').ok_or(ConfigError::InvalidOption)?;
            let value = parse_number(value.trim())?;
            match key.trim() {
                "slot" => slot = Some(value),
                "tcds" | "descriptors" => {
                    if value == 0 {
                        return Err(ConfigError::InvalidDescriptorCount);
                    }
                    config.descriptors = Some(value as usize);
                }
                "prio" | "priority" => {
                    if value > u32::from(MAX_CHANNEL_PRIORITY) {
                        return Err(ConfigError::InvalidOption);
                    }
                    config.priority = Some(value as u8);
                }
                _ => return Err(ConfigError::InvalidOption),
            }
        }

        config.slot = slot.ok_or(ConfigError::InvalidOption)?;
        Ok(config)
    }
}

fn parse_number(value: &str) -> ConfigResult<u32> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ConfigError::InvalidOption)
}

// =============================================================================
// Transfer Requests
// =============================================================================

/// Who paces the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Memory to memory, self-started
    #[default]
    MemToMem,
    /// Memory to a peripheral, paced by its request line
    MemToDevice,
    /// Peripheral to memory, paced by its request line
    DeviceToMem,
}

impl Direction {
    /// True if the peripheral's request line paces the transfer
    #[inline(always)]
    pub const fn is_device_paced(self) -> bool {
        !matches!(self, Direction::MemToMem)
    }
}

/// How an address moves across a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddrStep {
    /// Address grows by one unit per access
    #[default]
    Increment,
    /// Address shrinks by one unit per access
    Decrement,
    /// Address never moves (a peripheral FIFO register)
    Fixed,
}

bitflags! {
    /// Transfer request options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransferFlags: u32 {
        /// Source address stays fixed
        const SRC_NO_INCREMENT = 1 << 0;
        /// Source address decrements
        const SRC_DECREMENT = 1 << 1;
        /// Destination address stays fixed
        const DST_NO_INCREMENT = 1 << 2;
        /// Destination address decrements
        const DST_DECREMENT = 1 << 3;
        /// Each source fragment is its own segment
        const SRC_SEGMENTED = 1 << 4;
        /// Each destination fragment is its own segment
        const DST_SEGMENTED = 1 << 5;
        /// Chain loops back to its first descriptor
        const REPEAT = 1 << 6;
        /// Interrupt at the end of every segment
        const NOTIFY_EACH_SEGMENT = 1 << 7;
        /// Interrupt at the end of the chain
        const NOTIFY_ON_COMPLETE = 1 << 8;
    }
}

impl TransferFlags {
    /// Source address movement
    pub fn src_step(self) -> AddrStep {
        Self::step(
            self.contains(Self::SRC_NO_INCREMENT),
            self.contains(Self::SRC_DECREMENT),
        )
    }

    /// Destination address movement
    pub fn dst_step(self) -> AddrStep {
        Self::step(
            self.contains(Self::DST_NO_INCREMENT),
            self.contains(Self::DST_DECREMENT),
        )
    }

    fn step(fixed: bool, decrement: bool) -> AddrStep {
        match (fixed, decrement) {
            (true, _) => AddrStep::Fixed,
            (false, true) => AddrStep::Decrement,
            (false, false) => AddrStep::Increment,
        }
    }
}

/// One physically contiguous piece of a transfer buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fragment {
    /// Bus address
    pub paddr: u32,
    /// Length in bytes, if the caller knows it
    pub len: Option<u32>,
}

impl Fragment {
    /// Fragment at `paddr` of unspecified length
    #[must_use]
    pub const fn new(paddr: u32) -> Self {
        Self { paddr, len: None }
    }

    /// Fragment at `paddr` of `len` bytes
    #[must_use]
    pub const fn with_len(paddr: u32, len: u32) -> Self {
        Self {
            paddr,
            len: Some(len),
        }
    }
}

/// A transfer to compile onto a channel
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    /// Source fragments
    pub src: &'a [Fragment],
    /// Destination fragments
    pub dst: &'a [Fragment],
    /// Bytes moved per hardware access
    pub unit_size: u32,
    /// Bytes moved by the whole request
    pub total: u32,
    /// Pacing
    pub direction: Direction,
    /// Options
    pub flags: TransferFlags,
}

impl<'a> TransferRequest<'a> {
    /// Request of `total` bytes with 4-byte units and no flags
    #[must_use]
    pub const fn new(
        direction: Direction,
        src: &'a [Fragment],
        dst: &'a [Fragment],
        total: u32,
    ) -> Self {
        Self {
            src,
            dst,
            unit_size: 4,
            total,
            direction,
            flags: TransferFlags::empty(),
        }
    }

    /// Set the unit size
    #[must_use]
    pub const fn with_unit_size(mut self, unit_size: u32) -> Self {
        self.unit_size = unit_size;
        self
    }

    /// Set the option flags
    #[must_use]
    pub const fn with_flags(mut self, flags: TransferFlags) -> Self {
        self.flags = flags;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Core engine components.
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error types and result aliases
//! - [`engine`] - Process-wide engine: bring-up, channel acquisition, interrupt entry
//! - [`channel`] - Channel handle: start/abort/complete, state, progress, release
//! - [`compiler`] - Transfer request to descriptor chain compilation
//! - [`resource`] - Slot resolution and channel claiming
//! - [`interrupt`] - Interrupt decoding and channel status
//! - [`funcs`] - Generic DMA function table
//!
//! # Example
//!
//! ```ignore
//! use ph_edma::driver::{ChannelConfig, Direction, Engine, EngineConfig, Fragment, TransferRequest};
//!
//! let engine = Engine::new(platform, EngineConfig::for_machine("vf610")?)?;
//! let mut channel = engine.acquire(ChannelConfig::parse("slot=12,tcds=8")?)?;
//!
//! let src = [Fragment::new(buffer_phys)];
//! let dst = [Fragment::new(UART_DATA)];
//! channel.compile(&TransferRequest::new(Direction::MemToDevice, &src, &dst, 256)
//!     .with_unit_size(1)
//!     .with_flags(TransferFlags::DST_NO_INCREMENT))?;
//! channel.start()?;
//! ```

// Submodules
pub mod channel;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod funcs;
pub mod interrupt;
pub mod resource;

// Re-exports for convenience
pub use channel::{Channel, ChannelState};
pub use config::{
    AddrStep, ChannelConfig, ControllerDesc, Direction, EngineConfig, Fragment, MuxDesc,
    TransferFlags, TransferRequest,
};
pub use engine::Engine;
pub use error::{
    ConfigError, ConfigResult, Error, ResourceError, ResourceResult, Result, TransferError,
};
pub use funcs::{Capabilities, ChannelInfo, DmaFunctions, DriverInfo};
pub use interrupt::{ChannelStatus, IrqKind};
pub use resource::{ChannelId, ChannelRoute, ControllerId};

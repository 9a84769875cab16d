//! Shared eDMA Transfer Engine
//!
//! A `no_std` engine for the NXP enhanced DMA (eDMA) controller and its
//! DMAMUX request routers, shared by several processes on one machine.
//!
//! Peripheral drivers acquire a channel for a DMAMUX slot, compile a transfer
//! request into a chain of hardware transfer control descriptors (TCDs) and
//! start it. Completion and error interrupts come back as client-defined
//! notifications; progress is read from the live descriptor registers.
//!
//! # Architecture
//!
//! 1. **Driver Layer** ([`driver`]): engine bring-up, channels, the transfer
//!    compiler, interrupt dispatch and the [`DmaFunctions`] table
//! 2. **Sync Layer** ([`sync`]): in-process cells and the cross-process
//!    coordination region (reference count and per-controller locks)
//! 3. **HAL Layer** ([`hal`]): traits for the host services the engine needs
//!    (register mapping, DMA memory, resource registry, interrupts, shared memory)
//!
//! Controller topology comes either from a [`variants::Variant`] table or
//! from an explicit [`EngineConfig`].
//!
//! # Features
//!
//! - `defmt`: log through defmt and derive `defmt::Format` on public types
//! - `log`: log through the `log` facade
//!
//! # Example
//!
//! ```ignore
//! use ph_edma::{ChannelConfig, Direction, Engine, EngineConfig, Fragment, TransferFlags, TransferRequest};
//!
//! let engine = Engine::new(platform, EngineConfig::for_machine("vf610")?)?;
//! let mut channel = engine.acquire(ChannelConfig::new(12).with_event(rx_done))?;
//!
//! let src = [Fragment::new(UART_DATA)];
//! let dst = [Fragment::new(buffer.phys() as u32)];
//! let request = TransferRequest::new(Direction::DeviceToMem, &src, &dst, 256)
//!     .with_flags(TransferFlags::SRC_NO_INCREMENT | TransferFlags::REPEAT);
//! channel.compile(&request)?;
//! channel.start()?;
//!
//! // Interrupt thread
//! if let Some(event) = engine.handle_interrupt(irq) {
//!     deliver(event);
//! }
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels mirror the [lints] table in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

extern crate alloc;

// This must go FIRST so that all the other modules see its macros.
mod fmt;

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod hal;
pub mod sync;
pub mod variants;

// Internal implementation details (pub(crate) only)
mod internal;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::channel::{Channel, ChannelState};
pub use driver::config::{
    AddrStep, ChannelConfig, ControllerDesc, Direction, EngineConfig, Fragment, MuxDesc,
    TransferFlags, TransferRequest,
};
pub use driver::engine::Engine;
pub use driver::error::{
    ConfigError, ConfigResult, Error, ResourceError, ResourceResult, Result, TransferError,
};
pub use driver::funcs::{Capabilities, ChannelInfo, DmaFunctions, DriverInfo};
pub use driver::interrupt::{ChannelStatus, IrqKind};
pub use driver::resource::{ChannelId, ControllerId};
pub use hal::Platform;
pub use variants::Variant;

/// Low-level register access for host integrations.
///
/// A host maps the controller windows itself and wraps them in
/// [`MmioWindow`](unsafe_registers::MmioWindow) to implement
/// [`PhysMapper`](hal::PhysMapper).
///
/// # Safety
///
/// Touching the registers directly bypasses the engine's locking and channel
/// ownership. Only the window type is exported.
pub mod unsafe_registers {
    pub use crate::internal::register::MmioWindow;
}

/// Hardware limits and engine defaults.
pub mod constants {
    pub use crate::internal::constants::{
        DEFAULT_DESCRIPTORS, DEFAULT_SHARED_NAME, HALT_TIMEOUT_US, LOCK_TIMEOUT_US,
        MAX_CHANNEL_PRIORITY, MAX_CHANNELS_PER_CONTROLLER, MAX_CONTROLLERS, MAX_MAJOR_ITERATIONS,
        MAX_MUX_SLOTS, TCD_ALIGN, TCD_SIZE, UNIT_SIZES,
    };
}

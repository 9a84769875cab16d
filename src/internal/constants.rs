//! Centralized Constants
//!
//! This module provides a single source of truth for the magic numbers and
//! default configuration values used throughout the engine.
//!
//! # Organization
//!
//! - **Descriptor geometry**: TCD size and alignment
//! - **Hardware limits**: iteration counter widths, channel counts
//! - **Timing**: halt and lock timeouts, poll intervals
//! - **Defaults**: descriptors per channel, shared region name
//!
//! Register offsets and bit definitions live with their register blocks
//! (`register/edma.rs`, `register/dmamux.rs`, `dma/descriptor/bits.rs`).

// =============================================================================
// Descriptor Geometry
// =============================================================================

/// Size of one hardware transfer control descriptor in bytes
pub const TCD_SIZE: usize = 32;

/// Required alignment of a TCD used as a scatter-gather target
pub const TCD_ALIGN: usize = 32;

// =============================================================================
// Hardware Limits
// =============================================================================

/// Maximum CITER/BITER value when channel linking is disabled (15 bits)
pub const MAX_MAJOR_ITERATIONS: u32 = 0x7FFF;

/// Maximum channels a single eDMA instance can expose
pub const MAX_CHANNELS_PER_CONTROLLER: usize = 32;

/// Maximum controllers tracked in the process-shared coordination state
pub const MAX_CONTROLLERS: usize = 4;

/// Highest programmable channel priority (DCHPRI.CHPRI is 4 bits)
pub const MAX_CHANNEL_PRIORITY: u8 = 15;

/// Supported transfer unit widths in bytes
pub const UNIT_SIZES: [u32; 6] = [1, 2, 4, 8, 16, 32];

// =============================================================================
// Timing Constants
// =============================================================================

/// Default budget for a channel to drop its ACTIVE bit after a halt
pub const HALT_TIMEOUT_US: u32 = 1_000;

/// Poll interval used while waiting on hardware or the shared lock
pub const POLL_INTERVAL_US: u32 = 10;

/// Default budget for acquiring the cross-process lock
pub const LOCK_TIMEOUT_US: u32 = 100_000;

// =============================================================================
// Defaults
// =============================================================================

/// Default number of descriptors allocated per channel
pub const DEFAULT_DESCRIPTORS: usize = 16;

/// Default name of the process-shared coordination region
pub const DEFAULT_SHARED_NAME: &str = "/ph-edma-coordination";

/// Magic value marking an initialized coordination region ("EDMA")
pub const SHARED_MAGIC: u32 = 0x4544_4D41;

/// Request sources a DMAMUX channel configuration register can select
pub const MAX_MUX_SLOTS: u32 = 64;

//! Platform Abstraction Layer
//!
//! The engine never talks to the host OS directly. Every OS service it
//! depends on is expressed as a small trait here, and a host integration
//! implements them once:
//!
//! - [`memory`]: register window mapping and DMA-visible memory
//! - [`registry`]: system-wide exclusive integer range reservation
//! - [`irq`]: interrupt line attachment
//! - [`shmem`]: named process-shared memory
//!
//! [`Platform`] bundles them together with the notification type delivered
//! to clients and a delay provider used for bounded hardware waits.
//!
//! # Delay Integration
//!
//! Bounded waits use `embedded_hal::delay::DelayNs`. Pass any delay
//! implementation from your HAL through [`Platform::delay`].

pub mod irq;
pub mod memory;
pub mod registry;
pub mod shmem;

use embedded_hal::delay::DelayNs;

pub use irq::{InterruptAttach, IrqHandle};
pub use memory::{DmaRegion, PhysMapper, RegisterIo};
pub use registry::{ResourceHandle, ResourceRegistry};
pub use shmem::{SharedMemory, SharedRegion};

/// Everything the engine needs from its host.
///
/// # Example
///
/// ```ignore
/// struct QnxPlatform { /* ... */ }
///
/// impl Platform for QnxPlatform {
///     type Event = SigEvent;
///     type Delay = NanosleepDelay;
///
///     fn delay(&self) -> NanosleepDelay {
///         NanosleepDelay
///     }
/// }
/// ```
pub trait Platform: PhysMapper + ResourceRegistry + InterruptAttach + SharedMemory {
    /// Notification handed back from interrupt dispatch for delivery
    type Event: Clone;

    /// Delay provider for bounded busy-waits
    type Delay: DelayNs;

    /// Create a delay provider
    fn delay(&self) -> Self::Delay;
}

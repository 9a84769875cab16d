//! Synchronization and Concurrency Support
//!
//! - **Primitives** (`primitives`): in-process synchronization
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!   - [`wait_for`] - delay-paced bounded polling
//!
//! - **Coordination** (`coordination`): cross-process state in named shared memory
//!   - [`ProcessLease`] - first-process reset / last-process teardown
//!   - [`SharedLock`] - RAII guard for the per-controller locks

mod coordination;
mod primitives;

pub use coordination::{ProcessLease, SharedLock, SharedState};
pub use primitives::{CriticalSectionCell, wait_for};

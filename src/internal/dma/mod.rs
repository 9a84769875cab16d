//! DMA descriptor memory
//!
//! - [`descriptor`]: in-memory TCD layout and bit encodings
//! - [`pool`]: per-channel descriptor pool and its logical ring

pub mod descriptor;
pub mod pool;

pub use pool::{DescriptorPool, Segment};

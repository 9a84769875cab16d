//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions.
//!
//! # Contents
//!
//! - [`register`]: eDMA and DMAMUX register definitions over mapped windows
//! - [`dma`]: transfer control descriptors and the per-channel pool
//! - [`constants`]: hardware limits and defaults

pub(crate) mod constants;
pub(crate) mod dma;
pub(crate) mod register;

//! Error types for the eDMA engine
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Invalid requests and configuration, detected synchronously
//! - [`ResourceError`]: Exhausted channels, descriptors, memory or OS resources
//! - [`TransferError`]: Channel state machine violations and hardware faults
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most engine methods.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and request validation errors
///
/// Reported by the call that detected them. No partial state is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Transfer unit size is not a supported power-of-two width
    InvalidUnitSize,
    /// Total byte count is not a multiple of the segment count
    SegmentMismatch,
    /// Multiplexer slot index beyond the slots of all controllers
    SlotOutOfRange,
    /// Segment size is zero, not unit aligned, or exceeds the iteration counter
    InvalidLength,
    /// Source or destination fragment list is empty
    NoFragments,
    /// A fragment with an explicit length is shorter than its segment
    FragmentTooShort,
    /// Descriptor pool capacity of zero
    InvalidDescriptorCount,
    /// Malformed channel option string or out-of-range option value
    InvalidOption,
    /// Machine identifier does not match a known hardware variant
    UnknownVariant,
    /// Controller table is empty or exceeds the supported controller count
    InvalidController,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::InvalidUnitSize => "invalid transfer unit size",
            ConfigError::SegmentMismatch => "byte count not a multiple of segment count",
            ConfigError::SlotOutOfRange => "multiplexer slot out of range",
            ConfigError::InvalidLength => "invalid segment length",
            ConfigError::NoFragments => "empty fragment list",
            ConfigError::FragmentTooShort => "fragment shorter than segment",
            ConfigError::InvalidDescriptorCount => "invalid descriptor count",
            ConfigError::InvalidOption => "invalid channel option",
            ConfigError::UnknownVariant => "unknown hardware variant",
            ConfigError::InvalidController => "invalid controller table",
        }
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Resource exhaustion and OS collaborator failures
///
/// Always recoverable: the caller may retry later or reduce demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceError {
    /// Not enough free descriptors for the requested segment count
    OutOfDescriptors,
    /// Every channel served by the requested multiplexer is taken
    NoFreeChannel,
    /// DMA-visible memory could not be allocated
    AllocFailed,
    /// Register window could not be mapped
    MapFailed,
    /// Interrupt handler could not be attached
    IrqAttachFailed,
    /// Process-shared coordination region unavailable
    SharedMemoryFailed,
    /// Cross-process lock not acquired within its budget
    LockTimeout,
}

impl core::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResourceError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceError::OutOfDescriptors => "out of descriptors",
            ResourceError::NoFreeChannel => "no free channel",
            ResourceError::AllocFailed => "DMA memory allocation failed",
            ResourceError::MapFailed => "register mapping failed",
            ResourceError::IrqAttachFailed => "interrupt attach failed",
            ResourceError::SharedMemoryFailed => "shared memory unavailable",
            ResourceError::LockTimeout => "coordination lock timed out",
        }
    }
}

// =============================================================================
// Transfer Errors
// =============================================================================

/// Channel state and hardware transfer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Channel was started twice without an intervening abort or complete
    AlreadyRunning,
    /// No descriptor chain has been compiled for the channel
    NotConfigured,
    /// Operation requires a running channel
    NotRunning,
    /// Channel has already been released
    Released,
    /// Hardware reported a bus or descriptor error
    BusError,
}

impl core::fmt::Display for TransferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransferError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransferError::AlreadyRunning => "channel already running",
            TransferError::NotConfigured => "no transfer configured",
            TransferError::NotRunning => "channel not running",
            TransferError::Released => "channel released",
            TransferError::BusError => "DMA bus error",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match channel.compile(&request) {
///     Err(Error::Config(ConfigError::InvalidUnitSize)) => { /* ... */ }
///     Err(Error::Resource(ResourceError::OutOfDescriptors)) => { /* ... */ }
///     Err(Error::Transfer(TransferError::Released)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// Resource error
    Resource(ResourceError),
    /// Transfer error
    Transfer(TransferError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Resource(e) => write!(f, "resource: {}", e.as_str()),
            Error::Transfer(e) => write!(f, "transfer: {}", e.as_str()),
        }
    }
}

impl core::error::Error for Error {}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ResourceError> for Error {
    fn from(e: ResourceError) -> Self {
        Error::Resource(e)
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Error::Transfer(e)
    }
}

/// Result type alias for engine operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for resource operations
pub type ResourceResult<T> = core::result::Result<T, ResourceError>;

// =============================================================================
// Unit Tests
// =============================================================================

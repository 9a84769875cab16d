//! Hardware variant tables
//!
//! Static controller descriptions for the SoCs the engine knows about, and the
//! lookup from a machine identifier string (as reported by the boot loader or
//! the system page) to a variant.

use crate::driver::config::{ControllerDesc, MuxDesc};
use crate::driver::error::{ConfigError, ConfigResult};

// =============================================================================
// Vybrid VF6xx
// =============================================================================

static VF6XX_MUX0: [MuxDesc; 2] = [
    MuxDesc {
        base: 0x4002_4000,
        slots: 64,
        first_channel: 0,
        channels: 16,
    },
    MuxDesc {
        base: 0x4002_5000,
        slots: 64,
        first_channel: 16,
        channels: 16,
    },
];

static VF6XX_MUX1: [MuxDesc; 2] = [
    MuxDesc {
        base: 0x400A_1000,
        slots: 64,
        first_channel: 0,
        channels: 16,
    },
    MuxDesc {
        base: 0x400A_2000,
        slots: 64,
        first_channel: 16,
        channels: 16,
    },
];

static VF6XX: [ControllerDesc; 2] = [
    ControllerDesc {
        base: 0x4001_8000,
        channels: 32,
        channel_base: 0,
        completion_irqs: &[40],
        error_irq: 41,
        muxes: &VF6XX_MUX0,
    },
    ControllerDesc {
        base: 0x4009_8000,
        channels: 32,
        channel_base: 32,
        completion_irqs: &[42],
        error_irq: 43,
        muxes: &VF6XX_MUX1,
    },
];

// =============================================================================
// Kinetis K66
// =============================================================================

static K66_MUX: [MuxDesc; 1] = [MuxDesc {
    base: 0x4002_1000,
    slots: 64,
    first_channel: 0,
    channels: 32,
}];

// One line per channel pair (n and n + 16)
static K66_IRQS: [u32; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

static K66: [ControllerDesc; 1] = [ControllerDesc {
    base: 0x4000_8000,
    channels: 32,
    channel_base: 0,
    completion_irqs: &K66_IRQS,
    error_irq: 16,
    muxes: &K66_MUX,
}];

// =============================================================================
// Variant Lookup
// =============================================================================

/// Known hardware variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// NXP Vybrid VF5xx/VF6xx: two 32-channel eDMAs, four DMAMUXes
    Vf6xx,
    /// NXP Kinetis K66: one 32-channel eDMA, one DMAMUX
    K66,
}

impl Variant {
    /// Controller table for the variant
    pub fn controllers(self) -> &'static [ControllerDesc] {
        match self {
            Variant::Vf6xx => &VF6XX,
            Variant::K66 => &K66,
        }
    }

    /// Select a variant from a machine identifier such as `"vf610-twr"`.
    ///
    /// Matching is case-insensitive on the SoC part of the string.
    pub fn from_machine(machine: &str) -> ConfigResult<Self> {
        const TABLE: [(&str, Variant); 5] = [
            ("vf500", Variant::Vf6xx),
            ("vf600", Variant::Vf6xx),
            ("vf610", Variant::Vf6xx),
            ("mk66", Variant::K66),
            ("k66f", Variant::K66),
        ];

        TABLE
            .iter()
            .find(|(id, _)| contains_ignore_case(machine, id))
            .map(|&(_, variant)| variant)
            .ok_or(ConfigError::UnknownVariant)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

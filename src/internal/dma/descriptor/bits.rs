//! TCD bit field constants.
//!
//! Layout per the NXP eDMA reference manual (TCD word 7 CSR, word 1 ATTR).

// =============================================================================
// CSR (Control and Status)
// =============================================================================

/// TCD Control and Status bit field constants
pub mod csr {
    /// Channel Start - software request, cleared by hardware when the channel begins
    pub const START: u16 = 1 << 0;
    /// Enable an interrupt when the major iteration count completes
    pub const INTMAJOR: u16 = 1 << 1;
    /// Disable Request - clear ERQ when the major loop completes
    pub const DREQ: u16 = 1 << 3;
    /// Enable Scatter/Gather - DLAST_SGA holds the next TCD's address
    pub const ESG: u16 = 1 << 4;
    /// Channel Active - channel is executing (read-only)
    pub const ACTIVE: u16 = 1 << 6;
    /// Channel Done - major loop complete
    pub const DONE: u16 = 1 << 7;

    /// Status bits owned by hardware
    #[cfg(test)]
    pub const STATUS: u16 = ACTIVE | DONE;
}

// =============================================================================
// ATTR (Transfer Attributes)
// =============================================================================

/// TCD Transfer Attributes bit field constants
pub mod attr {
    /// Destination data transfer size shift
    pub const DSIZE_SHIFT: u16 = 0;
    /// Source data transfer size shift
    pub const SSIZE_SHIFT: u16 = 8;
    /// Source data transfer size mask
    #[cfg(test)]
    pub const SSIZE_MASK: u16 = 0x7 << 8;

    /// Encode a transfer width in bytes as an SSIZE/DSIZE code.
    ///
    /// Returns `None` for widths the engine cannot move in one beat.
    pub const fn size_code(bytes: u32) -> Option<u16> {
        match bytes {
            1 => Some(0),
            2 => Some(1),
            4 => Some(2),
            8 => Some(3),
            16 => Some(4),
            32 => Some(5),
            _ => None,
        }
    }

    /// Width in bytes for an SSIZE/DSIZE code
    #[cfg(test)]
    pub const fn size_bytes(code: u16) -> u32 {
        1 << (code & 0x7)
    }

    /// ATTR value moving `code`-sized units on both sides, no modulo
    pub const fn same_size(code: u16) -> u16 {
        (code << SSIZE_SHIFT) | (code << DSIZE_SHIFT)
    }
}

// =============================================================================
// CITER / BITER
// =============================================================================

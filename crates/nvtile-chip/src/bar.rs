// SPDX-License-Identifier: AGPL-3.0-only

//! PCI BAR layout for NV10-family boards.
//!
//! ```text
//! BAR  Size           Type                  Purpose
//! ──── ────────────── ───────────────────── ──────────────────────────────
//!  0   16 MB          32-bit non-prefetch   MMIO registers (PMC, PFB, ...)
//!  1   VRAM size      32-bit prefetchable   Linear VRAM aperture
//! ```
//!
//! Accesses through BAR1 go through the PFB tile regions: an address inside
//! an enabled region is remapped to its tiled physical location.

/// BAR0, MMIO register space.
pub mod bar0 {
    /// Size in bytes.
    pub const SIZE: u64 = 16 * 1024 * 1024;
    /// sysfs resource index.
    pub const RESOURCE_INDEX: usize = 0;
}

/// BAR1, VRAM aperture.
pub mod bar1 {
    /// sysfs resource index.
    pub const RESOURCE_INDEX: usize = 1;
    /// Smallest aperture the tile test can run against: the marker fill
    /// covers the first 2 MB of VRAM.
    pub const MIN_TEST_SIZE: u64 = 0x20_0000;
}

/// BAR index enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Bar {
    /// BAR0, registers.
    Mmio = bar0::RESOURCE_INDEX,
    /// BAR1, VRAM aperture.
    Vram = bar1::RESOURCE_INDEX,
}

impl Bar {
    /// sysfs `resourceN` index of this BAR.
    #[must_use]
    pub const fn resource_index(self) -> usize {
        self as usize
    }
}

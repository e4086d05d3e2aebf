// SPDX-License-Identifier: AGPL-3.0-only

//! PCI identifiers and chipset decoding.

/// NVIDIA vendor ID (PCI-SIG assigned).
pub const NVIDIA_VENDOR_ID: u16 = 0x10DE;

/// NVIDIA/SGS-Thomson joint vendor ID used by NV03-era parts.
pub const NVIDIA_SGS_VENDOR_ID: u16 = 0x12D2;

/// All vendor IDs scanned during discovery.
pub const ALL_VENDOR_IDS: &[u16] = &[NVIDIA_VENDOR_ID, NVIDIA_SGS_VENDOR_ID];

/// PCI base class for display controllers (`class >> 16`).
pub const DISPLAY_CLASS: u32 = 0x03;

/// Chipsets of the NV10 family.
pub mod chipset {
    /// NV10 (GeForce 256).
    pub const NV10: u32 = 0x10;
    /// NV11 (GeForce2 MX).
    pub const NV11: u32 = 0x11;
    /// NV15 (GeForce2 GTS).
    pub const NV15: u32 = 0x15;
    /// NV17 (GeForce4 MX).
    pub const NV17: u32 = 0x17;
    /// NV18 (GeForce4 MX AGP 8x).
    pub const NV18: u32 = 0x18;
    /// NV1A (nForce IGP), first chipset past the family's memory controller.
    pub const NV1A: u32 = 0x1a;
}

/// Chipsets whose PFB carries the NV10-style tile regions.
pub const TILE_CHIPSETS: std::ops::Range<u32> = chipset::NV10..chipset::NV1A;

/// Whether the tile-region tests apply to `chipset`.
#[must_use]
pub fn is_tile_chipset(chipset: u32) -> bool {
    TILE_CHIPSETS.contains(&chipset)
}

/// Decode the chipset number from `PMC_BOOT_0`.
///
/// NV10 and later carry the chipset in bits 20..28. Earlier parts use a
/// different layout; they are decoded to `0x04`/`0x05` or the NV1..NV3
/// architecture number so that callers can reject them.
#[must_use]
pub const fn chipset_from_boot0(boot0: u32) -> u32 {
    let chipset = boot0 >> 20 & 0x1ff;
    if chipset >= 0x10 {
        return chipset;
    }
    if boot0 & 0xf000 != 0 {
        if boot0 & 0xf0_0000 != 0 {
            0x05
        } else {
            0x04
        }
    } else {
        boot0 >> 16 & 0xf
    }
}

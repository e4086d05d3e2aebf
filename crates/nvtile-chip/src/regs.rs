// SPDX-License-Identifier: AGPL-3.0-only

//! BAR0 register map for the NV10-family PMC and PFB blocks.
//!
//! Only the registers the tile-region test touches are listed. Writable-bit
//! masks were established with all-ones / all-zeros bit scans.
//!
//! ```text
//! 0x000000: PMC_BOOT_0        — chipset / stepping identification
//! 0x000200: PMC_ENABLE        — engine enables, bit 20 = PFB
//! 0x100200: PFB_CFG0          — column bits [27:24], partition config [5:4]
//! 0x100240: PFB_TILE_CTRL(i)  — enable [31], base [26:14]
//! 0x100244: PFB_TILE_LIMIT(i) — limit [26:14]
//! 0x100248: PFB_TILE_PITCH(i) — pitch [15:8]
//! 0x10024c: PFB_TILE_STATUS(i)— derived, read-only
//! ```

// ── PMC ──────────────────────────────────────────────────────────────────────

/// Chipset identification register.
pub const PMC_BOOT_0: u32 = 0x00_0000;

/// Engine enable register.
pub const PMC_ENABLE: u32 = 0x00_0200;

/// PMC_ENABLE bit definitions.
pub mod pmc_enable {
    /// Memory controller (PFB) is powered and out of reset.
    pub const PFB: u32 = 1 << 20;
}

// ── PFB global configuration ─────────────────────────────────────────────────

/// Global memory geometry configuration.
pub const PFB_CFG0: u32 = 0x10_0200;

/// PFB_CFG0 field layout.
pub mod cfg0 {
    /// Column bits field shift.
    pub const COL_BITS_SHIFT: u32 = 24;
    /// Column bits field mask (after shifting).
    pub const COL_BITS_MASK: u32 = 0xf;
    /// Partition config field shift.
    pub const PART_CFG_SHIFT: u32 = 4;
    /// Partition config field mask (after shifting).
    pub const PART_CFG_MASK: u32 = 0x3;
}

// ── PFB tile regions ─────────────────────────────────────────────────────────

/// Number of tile regions.
pub const TILE_REGION_COUNT: u32 = 8;

/// Stride between tile region register groups.
pub const TILE_REGION_STRIDE: u32 = 0x10;

/// Tile region 0 control register.
pub const PFB_TILE_CTRL: u32 = 0x10_0240;
/// Tile region 0 limit register.
pub const PFB_TILE_LIMIT: u32 = 0x10_0244;
/// Tile region 0 pitch register.
pub const PFB_TILE_PITCH: u32 = 0x10_0248;
/// Tile region 0 status register (read-only).
pub const PFB_TILE_STATUS: u32 = 0x10_024c;

/// Tile region control bit definitions.
pub mod tile_ctrl {
    /// Region enable.
    pub const ENABLE: u32 = 1 << 31;
    /// Base address field (bits 26:14), in bytes.
    pub const BASE_MASK: u32 = 0x07ff_c000;
}

/// Writable bits of the control register.
pub const TILE_CTRL_WRITABLE: u32 = 0x87ff_c000;
/// Writable bits of the limit register.
pub const TILE_LIMIT_WRITABLE: u32 = 0x07ff_c000;
/// Writable bits of the pitch register.
pub const TILE_PITCH_WRITABLE: u32 = 0x0000_ff00;

/// Low bits of the limit register that are implicitly set: a region ends at
/// `limit | TILE_LIMIT_GRANULE_MASK` inclusive.
pub const TILE_LIMIT_GRANULE_MASK: u32 = 0x3fff;

/// Register group of one tile region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRegion {
    index: u32,
}

impl TileRegion {
    /// Tile region by index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= TILE_REGION_COUNT`.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        assert!(index < TILE_REGION_COUNT, "tile region index out of range");
        Self { index }
    }

    /// All tile regions in register order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..TILE_REGION_COUNT).map(Self::new)
    }

    /// Region index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    const fn base(&self) -> u32 {
        self.index * TILE_REGION_STRIDE
    }

    /// Control register address.
    #[must_use]
    pub const fn ctrl(&self) -> u32 {
        PFB_TILE_CTRL + self.base()
    }

    /// Limit register address.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        PFB_TILE_LIMIT + self.base()
    }

    /// Pitch register address.
    #[must_use]
    pub const fn pitch(&self) -> u32 {
        PFB_TILE_PITCH + self.base()
    }

    /// Status register address.
    #[must_use]
    pub const fn status(&self) -> u32 {
        PFB_TILE_STATUS + self.base()
    }

    /// Register of this group containing `addr`, if any.
    #[must_use]
    pub fn decode(addr: u32) -> Option<(Self, TileRegister)> {
        let rel = addr.checked_sub(PFB_TILE_CTRL)?;
        let index = rel / TILE_REGION_STRIDE;
        if index >= TILE_REGION_COUNT || addr % 4 != 0 {
            return None;
        }
        let reg = match rel % TILE_REGION_STRIDE {
            0x0 => TileRegister::Ctrl,
            0x4 => TileRegister::Limit,
            0x8 => TileRegister::Pitch,
            _ => TileRegister::Status,
        };
        Some((Self::new(index), reg))
    }
}

/// The four registers of a tile region group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileRegister {
    /// Enable + base.
    Ctrl,
    /// Limit.
    Limit,
    /// Pitch.
    Pitch,
    /// Derived status.
    Status,
}

impl TileRegister {
    /// Writable-bit mask; zero for the read-only status register.
    #[must_use]
    pub const fn writable_mask(self) -> u32 {
        match self {
            Self::Ctrl => TILE_CTRL_WRITABLE,
            Self::Limit => TILE_LIMIT_WRITABLE,
            Self::Pitch => TILE_PITCH_WRITABLE,
            Self::Status => 0,
        }
    }
}

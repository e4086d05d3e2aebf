// SPDX-License-Identifier: AGPL-3.0-only

//! Bank geometry decoded from `PFB_CFG0`.
//!
//! The bank shift (log2 of the bytes per partition interleave unit) is the
//! column bit count plus a cell bit count selected by the partition config:
//!
//! ```text
//! partition config   cell bits
//! ────────────────   ─────────
//!        0               3
//!        1               4
//!        2               2
//!        3           (reserved, 0)
//! ```

use crate::pcie::chipset;
use crate::regs::cfg0;

/// Partition configuration field of `PFB_CFG0` (bits 5:4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionConfig {
    /// Encoding 0.
    Wide = 0,
    /// Encoding 1.
    Narrow = 1,
    /// Encoding 2. Not available on NV10.
    Narrowest = 2,
    /// Encoding 3, never programmed by the VBIOS.
    Reserved = 3,
}

impl PartitionConfig {
    const CELL_BITS: [u32; 4] = [3, 4, 2, 0];

    /// Decode the 2-bit field value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & cfg0::PART_CFG_MASK {
            0 => Self::Wide,
            1 => Self::Narrow,
            2 => Self::Narrowest,
            _ => Self::Reserved,
        }
    }

    /// Raw field value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Cell bits contributed to the bank shift.
    #[must_use]
    pub const fn cell_bits(self) -> u32 {
        Self::CELL_BITS[self as usize]
    }
}

/// Geometry fields of one `PFB_CFG0` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankGeometry {
    /// Column bits (bits 27:24).
    pub col_bits: u32,
    /// Partition config (bits 5:4).
    pub partition: PartitionConfig,
}

impl BankGeometry {
    /// Smallest bank shift the tiling arithmetic is defined for.
    pub const MIN_BANK_SHIFT: u32 = 8;

    /// Decode from a `PFB_CFG0` value.
    #[must_use]
    pub const fn from_config(cfg: u32) -> Self {
        Self {
            col_bits: cfg >> cfg0::COL_BITS_SHIFT & cfg0::COL_BITS_MASK,
            partition: PartitionConfig::from_bits(cfg >> cfg0::PART_CFG_SHIFT),
        }
    }

    /// Replace the geometry fields of `cfg`, leaving the other bits alone.
    #[must_use]
    pub const fn apply_to(&self, cfg: u32) -> u32 {
        let cleared = cfg
            & !(cfg0::COL_BITS_MASK << cfg0::COL_BITS_SHIFT)
            & !(cfg0::PART_CFG_MASK << cfg0::PART_CFG_SHIFT);
        cleared
            | (self.col_bits & cfg0::COL_BITS_MASK) << cfg0::COL_BITS_SHIFT
            | self.partition.bits() << cfg0::PART_CFG_SHIFT
    }

    /// `col_bits + cell_bits(partition)`.
    #[must_use]
    pub const fn bank_shift(&self) -> u32 {
        self.col_bits + self.partition.cell_bits()
    }

    /// Whether the tiling math is defined for this geometry.
    #[must_use]
    pub const fn is_tileable(&self) -> bool {
        self.bank_shift() >= Self::MIN_BANK_SHIFT
    }

    /// NV15 with partition config 1 swaps address bit 4 on every odd
    /// 256-byte block.
    #[must_use]
    pub fn partition_flip(&self, chipset: u32) -> bool {
        chipset == chipset::NV15 && self.partition == PartitionConfig::Narrow
    }
}

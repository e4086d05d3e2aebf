// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the NV10-family memory controller (PFB) tile regions.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the silicon: register addresses, BAR layout, chipset
//! identification, bank geometry and the linear → tiled address mapping.
//!
//! Everything here was established by probing real NV10..NV19 boards; the
//! `nvtile-driver` crate replays that probing and compares each observed
//! word against this model.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor IDs, `PMC_BOOT_0` chipset decoding, applicable chipsets |
//! | [`bar`] | BAR layout (BAR0 16 MB MMIO, BAR1 VRAM aperture) |
//! | [`regs`] | PMC / PFB register map and writable-bit masks |
//! | [`geometry`] | Bank geometry from `PFB_CFG0` (column bits, partition config) |
//! | [`tiling`] | Pitch → status word encoding, linear → tiled address translation |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bar;
pub mod geometry;
pub mod pcie;
pub mod regs;
pub mod tiling;

pub use geometry::{BankGeometry, PartitionConfig};
pub use tiling::{
    compute_status, expected_status_readback, legal_pitches, tiled_window_end,
    translate_address, try_compute_status, PitchError, PitchFactor, StatusWord,
};

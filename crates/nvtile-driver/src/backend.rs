// SPDX-License-Identifier: AGPL-3.0-only

//! Backend abstraction for card access
//!
//! The verification driver only needs 32-bit register and VRAM accesses plus
//! the chipset number. Every backend provides exactly that.

use crate::backends::software::{SoftwareBackend, SoftwareConfig};
use crate::backends::sysfs::SysfsBackend;
use crate::discovery::DeviceManager;
use crate::error::{Result, TileError};
use std::fmt::Debug;

/// Register and VRAM access to one card
///
/// Accesses are blocking and complete before returning; there is no
/// posting or asynchronous completion to wait for.
pub trait TileBackend: Debug {
    /// Read a 32-bit MMIO register
    ///
    /// # Errors
    ///
    /// Returns error if `addr` is outside the register space.
    fn read_reg(&self, addr: u32) -> Result<u32>;

    /// Write a 32-bit MMIO register
    ///
    /// # Errors
    ///
    /// Returns error if `addr` is outside the register space.
    fn write_reg(&mut self, addr: u32, value: u32) -> Result<()>;

    /// Read a 32-bit word through the VRAM aperture
    ///
    /// # Errors
    ///
    /// Returns error if `offset` is outside the aperture.
    fn read_vram(&self, offset: u32) -> Result<u32>;

    /// Write a 32-bit word through the VRAM aperture
    ///
    /// # Errors
    ///
    /// Returns error if `offset` is outside the aperture.
    fn write_vram(&mut self, offset: u32, value: u32) -> Result<()>;

    /// Chipset number decoded from `PMC_BOOT_0`
    fn chipset(&self) -> u32;

    /// Size of the VRAM aperture in bytes
    fn aperture_size(&self) -> u64;

    /// Get backend type for diagnostics
    fn backend_type(&self) -> BackendType;
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// sysfs `resourceN` mmap of a real card
    Sysfs,

    /// Simulated memory controller, no hardware required
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sysfs => write!(f, "sysfs"),
            Self::Software => write!(f, "Software (simulated PFB)"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelection {
    /// Map a real card through sysfs
    Sysfs,

    /// Simulate a card with the given configuration
    Software(SoftwareConfig),
}

/// Open card number `card` with the selected backend
///
/// Cards are numbered in PCI address order. The software backend models a
/// single card.
///
/// # Errors
///
/// Returns `TileError::NoCardsFound` or `TileError::InvalidIndex` if there
/// is no such card, or a mapping error if the card cannot be opened.
pub fn open_card(selection: BackendSelection, card: usize) -> Result<Box<dyn TileBackend>> {
    match selection {
        BackendSelection::Sysfs => {
            let mgr = DeviceManager::discover()?;
            let info = mgr.device(card)?;
            tracing::info!("Using sysfs backend for card {card} @ {}", info.pcie_address());
            SysfsBackend::open(mgr.sysfs_root(), info.pcie_address())
                .map(|b| Box::new(b) as Box<dyn TileBackend>)
        }

        BackendSelection::Software(config) => {
            if card != 0 {
                return Err(TileError::InvalidIndex { index: card, count: 1 });
            }
            tracing::info!("Using software backend (chipset {:#04x})", config.chipset);
            Ok(Box::new(SoftwareBackend::new(config)))
        }
    }
}

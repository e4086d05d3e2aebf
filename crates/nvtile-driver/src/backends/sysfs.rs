// SPDX-License-Identifier: AGPL-3.0-only

//! sysfs backend for real cards
//!
//! Maps BAR0 (registers) and BAR1 (VRAM aperture) through
//! `<root>/<pci-address>/resourceN`. Needs root, and no other driver may be
//! touching the card while the tests run.

use crate::backend::{BackendType, TileBackend};
use crate::backends::mmap::MmapRegion;
use crate::error::{Result, Space, TileError};
use nvtile_chip::bar::Bar;
use nvtile_chip::pcie::chipset_from_boot0;
use nvtile_chip::regs::{PFB_TILE_STATUS, PMC_BOOT_0};
use std::path::Path;

/// Card accessed through mmapped sysfs resource files
#[derive(Debug)]
pub struct SysfsBackend {
    pcie_address: String,
    mmio: MmapRegion,
    vram: MmapRegion,
    boot0: u32,
    chipset: u32,
}

impl SysfsBackend {
    /// Map the BARs of the card at `pcie_address` under `root`
    ///
    /// # Errors
    ///
    /// Returns error if a BAR cannot be mapped or BAR0 is too small to hold
    /// the PFB register block.
    pub fn open(root: &Path, pcie_address: &str) -> Result<Self> {
        tracing::info!("Initializing sysfs backend for {pcie_address}");

        let dir = root.join(pcie_address);
        if !dir.is_dir() {
            return Err(TileError::device_not_found(dir));
        }

        let resource = |bar: Bar| dir.join(format!("resource{}", bar.resource_index()));
        let mmio = MmapRegion::new(&resource(Bar::Mmio), Space::Mmio)?;
        let vram = MmapRegion::new(&resource(Bar::Vram), Space::Vram)?;

        // The highest register touched is the last tile region's status.
        if (mmio.size() as u64) < u64::from(PFB_TILE_STATUS) + 0x80 {
            return Err(TileError::map_failed(format!(
                "BAR0 of {pcie_address} is only {:#x} bytes",
                mmio.size()
            )));
        }

        let boot0 = mmio.read_u32(PMC_BOOT_0)?;
        let chipset = chipset_from_boot0(boot0);

        tracing::info!(
            "Initialized {pcie_address}: boot0 {boot0:#010x}, chipset NV{chipset:02X}, {} KB aperture",
            vram.size() / 1024
        );

        Ok(Self {
            pcie_address: pcie_address.to_string(),
            mmio,
            vram,
            boot0,
            chipset,
        })
    }

    /// Get PCI address
    #[must_use]
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }

    /// Raw `PMC_BOOT_0` value read at open time
    #[must_use]
    pub const fn boot0(&self) -> u32 {
        self.boot0
    }
}

impl TileBackend for SysfsBackend {
    fn read_reg(&self, addr: u32) -> Result<u32> {
        self.mmio.read_u32(addr)
    }

    fn write_reg(&mut self, addr: u32, value: u32) -> Result<()> {
        self.mmio.write_u32(addr, value)
    }

    fn read_vram(&self, offset: u32) -> Result<u32> {
        self.vram.read_u32(offset)
    }

    fn write_vram(&mut self, offset: u32, value: u32) -> Result<()> {
        self.vram.write_u32(offset, value)
    }

    fn chipset(&self) -> u32 {
        self.chipset
    }

    fn aperture_size(&self) -> u64 {
        self.vram.size() as u64
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Sysfs
    }
}

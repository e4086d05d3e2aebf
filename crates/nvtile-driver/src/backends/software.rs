// SPDX-License-Identifier: AGPL-3.0-only

//! Software (simulated PFB) backend
//!
//! Implements [`TileBackend`] with an in-process model of an NV10-family
//! memory controller: a register file with the measured writable-bit masks,
//! the derived tile status register, `PFB_CFG0` geometry, and a VRAM array
//! accessed through tile region remapping. This enables:
//!
//! 1. **CI without hardware**: the full suite runs against it and must pass
//!    for every chipset of the family.
//!
//! 2. **Exercising failure paths**: [`Fault`] injection makes the simulated
//!    card misbehave in the ways a broken board (or a wrong model) would.
//!
//! The remapping itself comes from `nvtile_chip::tiling`, so this backend
//! checks the driver, not the model. Only real hardware checks the model.

use crate::backend::{BackendType, TileBackend};
use crate::error::{Result, Space, TileError};
use nvtile_chip::bar::bar0;
use nvtile_chip::pcie::chipset;
use nvtile_chip::regs::{
    pmc_enable, tile_ctrl, TileRegion, TileRegister, PFB_CFG0, PMC_BOOT_0, PMC_ENABLE,
    TILE_LIMIT_GRANULE_MASK, TILE_REGION_COUNT,
};
use nvtile_chip::{compute_status, expected_status_readback, translate_address, BankGeometry};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Power-on state of the simulated card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareConfig {
    /// Chipset reported through `PMC_BOOT_0`
    pub chipset: u32,
    /// Initial `PFB_CFG0`
    pub cfg0: u32,
    /// VRAM size in bytes; also the aperture size
    pub vram_size: u32,
    /// Whether `PMC_ENABLE` reports the memory controller as up
    pub pfb_enabled: bool,
}

impl Default for SoftwareConfig {
    /// NV11 with 10 column bits and partition config 1 (bank shift 14), so
    /// every bank shift from 10 to 13 is reachable.
    fn default() -> Self {
        Self {
            chipset: chipset::NV11,
            cfg0: 0x0a00_0010,
            vram_size: 4 * 1024 * 1024,
            pfb_enabled: true,
        }
    }
}

/// Misbehaviour injected into the simulated card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The VRAM word at this physical offset always reads `value`.
    StuckWord {
        /// Physical byte offset
        offset: u32,
        /// Value read back
        value: u32,
    },
    /// Tile status reads are XORed with this mask.
    StatusXor(u32),
    /// These bits of the register at `addr` never latch.
    DeadBits {
        /// Register address
        addr: u32,
        /// Bits that read as zero
        mask: u32,
    },
    /// Writes to `PFB_CFG0` are dropped.
    ConfigReadOnly,
    /// Writes to the register at `addr` fail with an I/O error.
    WriteFails {
        /// Register address
        addr: u32,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct RegionState {
    ctrl: u32,
    limit: u32,
    pitch: u32,
}

impl RegionState {
    fn enabled(&self) -> bool {
        self.ctrl & tile_ctrl::ENABLE != 0
    }

    fn base(&self) -> u32 {
        self.ctrl & tile_ctrl::BASE_MASK
    }

    fn contains(&self, linear: u32) -> bool {
        self.enabled() && (self.base()..=self.limit | TILE_LIMIT_GRANULE_MASK).contains(&linear)
    }
}

/// Simulated NV10-family card
#[derive(Debug)]
pub struct SoftwareBackend {
    config: SoftwareConfig,
    regs: HashMap<u32, u32>,
    regions: [RegionState; TILE_REGION_COUNT as usize],
    vram: Vec<u32>,
    faults: Vec<Fault>,
    reg_writes: Vec<(u32, u32)>,
}

impl SoftwareBackend {
    /// Create a card in its power-on state
    ///
    /// # Panics
    ///
    /// Panics if `config.vram_size` is not a non-zero multiple of 4.
    #[must_use]
    pub fn new(config: SoftwareConfig) -> Self {
        assert!(
            config.vram_size != 0 && config.vram_size % 4 == 0,
            "VRAM size must be a non-zero multiple of 4"
        );

        let mut regs = HashMap::new();
        regs.insert(PMC_BOOT_0, config.chipset << 20 | 0xa1);
        let enable = if config.pfb_enabled { 0x1 | pmc_enable::PFB } else { 0x1 };
        regs.insert(PMC_ENABLE, enable);
        regs.insert(PFB_CFG0, config.cfg0);

        debug!(
            "Simulated NV{:02X}: cfg0 {:#010x}, {} KB VRAM",
            config.chipset,
            config.cfg0,
            config.vram_size / 1024
        );

        Self {
            config,
            regs,
            regions: [RegionState::default(); TILE_REGION_COUNT as usize],
            vram: vec![0; (config.vram_size / 4) as usize],
            faults: Vec::new(),
            reg_writes: Vec::new(),
        }
    }

    /// Add a fault to the simulated card
    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Power-on configuration
    #[must_use]
    pub const fn config(&self) -> &SoftwareConfig {
        &self.config
    }

    /// Every register write so far, in order
    #[must_use]
    pub fn register_writes(&self) -> &[(u32, u32)] {
        &self.reg_writes
    }

    /// Number of writes to the register at `addr`
    #[must_use]
    pub fn writes_to(&self, addr: u32) -> usize {
        self.reg_writes.iter().filter(|(a, _)| *a == addr).count()
    }

    fn dead_bits(&self, addr: u32) -> u32 {
        self.faults
            .iter()
            .filter_map(|f| match *f {
                Fault::DeadBits { addr: a, mask } if a == addr => Some(mask),
                _ => None,
            })
            .fold(0, |acc, mask| acc | mask)
    }

    fn status_xor(&self) -> u32 {
        self.faults
            .iter()
            .filter_map(|f| match *f {
                Fault::StatusXor(mask) => Some(mask),
                _ => None,
            })
            .fold(0, |acc, mask| acc ^ mask)
    }

    fn geometry(&self) -> BankGeometry {
        BankGeometry::from_config(self.regs.get(&PFB_CFG0).copied().unwrap_or(0))
    }

    /// Physical VRAM offset the controller accesses for an aperture offset
    fn physical(&self, linear: u32) -> u32 {
        let Some(region) = self.regions.iter().find(|r| r.contains(linear)) else {
            return linear;
        };
        // An untileable pitch or geometry leaves the region linear.
        let geo = self.geometry();
        if compute_status(region.pitch).is_none() || !geo.is_tileable() {
            return linear;
        }
        let base = region.base();
        let flip = geo.partition_flip(self.config.chipset);
        base.wrapping_add(translate_address(region.pitch, linear - base, geo.bank_shift(), flip))
    }

    fn vram_index(&self, linear: u32) -> Result<(u32, usize)> {
        if linear % 4 != 0 || linear >= self.config.vram_size {
            return Err(TileError::out_of_bounds(Space::Vram, linear, self.config.vram_size));
        }
        // Physical offsets past the end alias back into VRAM.
        let phys = self.physical(linear) % self.config.vram_size;
        Ok((phys, (phys / 4) as usize))
    }

    fn check_reg(addr: u32) -> Result<()> {
        if addr % 4 != 0 || u64::from(addr) + 4 > bar0::SIZE {
            return Err(TileError::out_of_bounds(Space::Mmio, addr, bar0::SIZE));
        }
        Ok(())
    }
}

impl TileBackend for SoftwareBackend {
    fn read_reg(&self, addr: u32) -> Result<u32> {
        Self::check_reg(addr)?;
        let value = match TileRegion::decode(addr) {
            Some((region, reg)) => {
                let state = &self.regions[region.index() as usize];
                match reg {
                    TileRegister::Ctrl => state.ctrl,
                    TileRegister::Limit => state.limit,
                    TileRegister::Pitch => state.pitch,
                    TileRegister::Status => {
                        expected_status_readback(state.pitch, state.enabled()) ^ self.status_xor()
                    }
                }
            }
            None => self.regs.get(&addr).copied().unwrap_or(0),
        };
        trace!("SW read {addr:#08x} = {value:#010x}");
        Ok(value)
    }

    fn write_reg(&mut self, addr: u32, value: u32) -> Result<()> {
        Self::check_reg(addr)?;
        if self.faults.contains(&Fault::WriteFails { addr }) {
            return Err(std::io::Error::other(format!("write to {addr:#08x} failed")).into());
        }
        trace!("SW write {addr:#08x} = {value:#010x}");
        self.reg_writes.push((addr, value));

        let dead = self.dead_bits(addr);
        if let Some((region, reg)) = TileRegion::decode(addr) {
            let latched = value & reg.writable_mask() & !dead;
            let state = &mut self.regions[region.index() as usize];
            match reg {
                TileRegister::Ctrl => state.ctrl = latched,
                TileRegister::Limit => state.limit = latched,
                TileRegister::Pitch => state.pitch = latched,
                TileRegister::Status => {}
            }
            return Ok(());
        }

        match addr {
            PMC_BOOT_0 => {}
            PFB_CFG0 if self.faults.contains(&Fault::ConfigReadOnly) => {}
            _ => {
                self.regs.insert(addr, value & !dead);
            }
        }
        Ok(())
    }

    fn read_vram(&self, offset: u32) -> Result<u32> {
        let (phys, index) = self.vram_index(offset)?;
        for fault in &self.faults {
            if let Fault::StuckWord { offset, value } = *fault {
                if offset == phys {
                    return Ok(value);
                }
            }
        }
        Ok(self.vram[index])
    }

    fn write_vram(&mut self, offset: u32, value: u32) -> Result<()> {
        let (_, index) = self.vram_index(offset)?;
        self.vram[index] = value;
        Ok(())
    }

    fn chipset(&self) -> u32 {
        self.config.chipset
    }

    fn aperture_size(&self) -> u64 {
        u64::from(self.config.vram_size)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvtile_chip::regs::{PFB_TILE_CTRL, PFB_TILE_LIMIT, PFB_TILE_PITCH, PFB_TILE_STATUS};

    fn card() -> SoftwareBackend {
        SoftwareBackend::new(SoftwareConfig::default())
    }

    #[test]
    fn boot0_decodes_to_configured_chipset() {
        let sw = card();
        let boot0 = sw.read_reg(PMC_BOOT_0).unwrap();
        assert_eq!(nvtile_chip::pcie::chipset_from_boot0(boot0), chipset::NV11);
        assert_ne!(sw.read_reg(PMC_ENABLE).unwrap() & pmc_enable::PFB, 0);
    }

    #[test]
    fn tile_registers_latch_only_writable_bits() {
        let mut sw = card();
        sw.write_reg(PFB_TILE_CTRL, 0xffff_ffff).unwrap();
        sw.write_reg(PFB_TILE_LIMIT, 0xffff_ffff).unwrap();
        sw.write_reg(PFB_TILE_PITCH, 0xffff_ffff).unwrap();
        assert_eq!(sw.read_reg(PFB_TILE_CTRL).unwrap(), 0x87ff_c000);
        assert_eq!(sw.read_reg(PFB_TILE_LIMIT).unwrap(), 0x07ff_c000);
        assert_eq!(sw.read_reg(PFB_TILE_PITCH).unwrap(), 0x0000_ff00);
        sw.write_reg(PFB_TILE_STATUS, 0x1234).unwrap();
        // 0xff00 has no status word.
        assert_eq!(sw.read_reg(PFB_TILE_STATUS).unwrap(), 0);
    }

    #[test]
    fn status_tracks_pitch_and_enable() {
        let mut sw = card();
        sw.write_reg(PFB_TILE_PITCH, 0x600).unwrap();
        assert_eq!(sw.read_reg(PFB_TILE_STATUS).unwrap(), 0x11);
        sw.write_reg(PFB_TILE_CTRL, tile_ctrl::ENABLE).unwrap();
        assert_eq!(sw.read_reg(PFB_TILE_STATUS).unwrap(), 0x8000_0011);
    }

    #[test]
    fn enabled_region_remaps_aperture() {
        let mut sw = card();
        for offset in (0..0x1_0000).step_by(4) {
            sw.write_vram(offset, 0xc000_0000 | offset).unwrap();
        }
        sw.write_reg(PFB_TILE_PITCH, 0x200).unwrap();
        sw.write_reg(PFB_TILE_LIMIT, 0x0000_c000).unwrap();
        sw.write_reg(PFB_TILE_CTRL, tile_ctrl::ENABLE).unwrap();

        let geo = BankGeometry::from_config(sw.config().cfg0);
        let expected = translate_address(0x200, 0x200, geo.bank_shift(), false);
        assert_eq!(sw.read_vram(0x200).unwrap(), 0xc000_0000 | expected);
        // Past the limit the aperture is linear again.
        assert_eq!(sw.read_vram(0x1_0000).unwrap(), 0);
        sw.write_reg(PFB_TILE_CTRL, 0).unwrap();
        assert_eq!(sw.read_vram(0x200).unwrap(), 0xc000_0200);
    }

    #[test]
    fn faults_corrupt_reads() {
        let mut sw = card()
            .with_fault(Fault::StuckWord { offset: 0x40, value: 0 })
            .with_fault(Fault::StatusXor(0x1))
            .with_fault(Fault::ConfigReadOnly);
        sw.write_vram(0x40, 0x1234).unwrap();
        assert_eq!(sw.read_vram(0x40).unwrap(), 0);
        assert_eq!(sw.read_reg(PFB_TILE_STATUS).unwrap(), 0x1);
        sw.write_reg(PFB_CFG0, 0).unwrap();
        assert_eq!(sw.read_reg(PFB_CFG0).unwrap(), 0x0a00_0010);
        assert_eq!(sw.writes_to(PFB_CFG0), 1);

        let mut failing = SoftwareBackend::new(SoftwareConfig::default())
            .with_fault(Fault::WriteFails { addr: PFB_CFG0 });
        assert!(matches!(failing.write_reg(PFB_CFG0, 0), Err(TileError::Io { .. })));
        assert_eq!(failing.read_reg(PFB_CFG0).unwrap(), 0x0a00_0010);
        assert_eq!(failing.writes_to(PFB_CFG0), 0);
    }

    #[test]
    fn accesses_are_bounds_checked() {
        let mut sw = card();
        assert!(sw.read_vram(4 * 1024 * 1024).is_err());
        assert!(sw.write_vram(0x3, 0).is_err());
        assert!(sw.read_reg(0x0100_0000).is_err());
    }
}

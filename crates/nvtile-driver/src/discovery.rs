// SPDX-License-Identifier: AGPL-3.0-only

//! Runtime card discovery
//!
//! Scans the PCI sysfs tree for NVIDIA display adapters. Cards are numbered
//! in PCI address order, which is the numbering `-c` selects from.

use crate::error::{Result, TileError};
use nvtile_chip::pcie::{ALL_VENDOR_IDS, DISPLAY_CLASS};
use std::path::{Path, PathBuf};

/// Default location of the PCI device tree
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/pci/devices";

/// Environment variable overriding [`DEFAULT_SYSFS_ROOT`]
pub const SYSFS_ROOT_ENV: &str = "NVTILE_SYSFS_ROOT";

/// Card manager for runtime discovery
#[derive(Debug)]
pub struct DeviceManager {
    root: PathBuf,
    devices: Vec<DeviceInfo>,
}

/// Information about a discovered card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Card index (0, 1, 2, ...)
    pub index: usize,

    /// PCI bus address (0000:01:00.0, etc.)
    pub pcie_address: String,

    /// PCI vendor ID
    pub vendor_id: u16,

    /// PCI device ID
    pub device_id: u16,
}

impl DeviceManager {
    /// Discover all cards under the configured sysfs root
    ///
    /// The root is [`DEFAULT_SYSFS_ROOT`] unless `NVTILE_SYSFS_ROOT` is set.
    ///
    /// # Errors
    ///
    /// Returns `TileError::NoCardsFound` if no cards are detected.
    pub fn discover() -> Result<Self> {
        let root = std::env::var_os(SYSFS_ROOT_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_SYSFS_ROOT), PathBuf::from);
        Self::discover_in(root)
    }

    /// Discover all cards under `root`
    ///
    /// # Errors
    ///
    /// Returns `TileError::NoCardsFound` if no cards are detected, or an I/O
    /// error if `root` cannot be listed.
    pub fn discover_in(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tracing::info!("Discovering cards under {}", root.display());

        let entries = std::fs::read_dir(&root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TileError::device_not_found(&root)
            } else {
                TileError::from(e)
            }
        })?;

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();

            let Ok(vendor) = read_hex_sysfs(&path.join("vendor")) else {
                continue;
            };
            let Ok(class) = read_hex_sysfs(&path.join("class")) else {
                continue;
            };
            if !ALL_VENDOR_IDS.iter().any(|&v| u32::from(v) == vendor)
                || class >> 16 != DISPLAY_CLASS
            {
                continue;
            }
            let device = read_hex_sysfs(&path.join("device")).unwrap_or(0);

            let pcie_address = entry.file_name().to_string_lossy().to_string();
            tracing::debug!("Found card {pcie_address} ({vendor:04x}:{device:04x})");
            #[allow(clippy::cast_possible_truncation)]
            found.push((pcie_address, vendor as u16, device as u16));
        }

        if found.is_empty() {
            tracing::error!("No cards found");
            return Err(TileError::NoCardsFound);
        }

        // Sort to ensure consistent ordering
        found.sort();

        let devices = found
            .into_iter()
            .enumerate()
            .map(|(index, (pcie_address, vendor_id, device_id))| DeviceInfo {
                index,
                pcie_address,
                vendor_id,
                device_id,
            })
            .collect::<Vec<_>>();

        tracing::info!("Discovered {} card(s)", devices.len());
        Ok(Self { root, devices })
    }

    /// sysfs root the cards were found under
    #[must_use]
    pub fn sysfs_root(&self) -> &Path {
        &self.root
    }

    /// Get number of discovered cards
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Get slice of all cards
    #[must_use]
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Get card info by index
    ///
    /// # Errors
    ///
    /// Returns `TileError::InvalidIndex` if the index is out of bounds.
    pub fn device(&self, index: usize) -> Result<&DeviceInfo> {
        self.devices.get(index).ok_or(TileError::InvalidIndex {
            index,
            count: self.devices.len(),
        })
    }
}

impl DeviceInfo {
    /// Get card index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Get PCI address
    #[must_use]
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }
}

/// Read a hexadecimal value from sysfs
fn read_hex_sysfs(path: &Path) -> Result<u32> {
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim().trim_start_matches("0x");
    u32::from_str_radix(trimmed, 16).map_err(|e| {
        TileError::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid hex value in {}: {e}", path.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_device(root: &Path, addr: &str, vendor: &str, device: &str, class: &str) {
        let dir = root.join(addr);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vendor"), format!("{vendor}\n")).unwrap();
        fs::write(dir.join("device"), format!("{device}\n")).unwrap();
        fs::write(dir.join("class"), format!("{class}\n")).unwrap();
    }

    #[test]
    fn finds_nvidia_display_adapters_in_address_order() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "0000:02:00.0", "0x10de", "0x0150", "0x030000");
        fake_device(tmp.path(), "0000:01:00.0", "0x10de", "0x0110", "0x030000");
        // Audio function of an NVIDIA card, and a non-NVIDIA GPU.
        fake_device(tmp.path(), "0000:01:00.1", "0x10de", "0x0e0b", "0x040300");
        fake_device(tmp.path(), "0000:03:00.0", "0x1002", "0x5159", "0x030000");

        let mgr = DeviceManager::discover_in(tmp.path()).unwrap();
        assert_eq!(mgr.device_count(), 2);
        assert_eq!(mgr.device(0).unwrap().pcie_address(), "0000:01:00.0");
        assert_eq!(mgr.device(0).unwrap().device_id, 0x0110);
        assert_eq!(mgr.device(1).unwrap().pcie_address(), "0000:02:00.0");
        assert_eq!(mgr.device(1).unwrap().index(), 1);
    }

    #[test]
    fn out_of_range_card() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "0000:01:00.0", "0x10de", "0x0100", "0x030000");
        let mgr = DeviceManager::discover_in(tmp.path()).unwrap();
        assert!(matches!(
            mgr.device(1),
            Err(TileError::InvalidIndex { index: 1, count: 1 })
        ));
    }

    #[test]
    fn empty_tree_has_no_cards() {
        let tmp = tempfile::tempdir().unwrap();
        fake_device(tmp.path(), "0000:00:1f.0", "0x8086", "0x2918", "0x060100");
        assert!(matches!(
            DeviceManager::discover_in(tmp.path()),
            Err(TileError::NoCardsFound)
        ));
    }

    #[test]
    fn missing_root_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            DeviceManager::discover_in(tmp.path().join("nope")),
            Err(TileError::DeviceNotFound { .. })
        ));
    }
}

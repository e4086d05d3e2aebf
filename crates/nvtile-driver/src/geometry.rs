// SPDX-License-Identifier: AGPL-3.0-only

//! Bank geometry resolver
//!
//! Reads the bank geometry from `PFB_CFG0` and walks it down to a narrower
//! bank shift so the tiled layout can be checked at every width the card
//! supports. The original register value is held by a [`ConfigGuard`] and
//! written back when the guard goes out of scope.

use crate::backend::TileBackend;
use crate::error::Result;
use nvtile_chip::pcie::chipset;
use nvtile_chip::regs::{cfg0, PFB_CFG0};
use nvtile_chip::{BankGeometry, PartitionConfig};
use thiserror::Error;
use tracing::{debug, error, info};

/// Current bank geometry of the card
///
/// # Errors
///
/// Returns error if `PFB_CFG0` cannot be read.
pub fn current_geometry<B: TileBackend + ?Sized>(backend: &B) -> Result<BankGeometry> {
    Ok(BankGeometry::from_config(backend.read_reg(PFB_CFG0)?))
}

/// Current bank shift of the card
///
/// # Errors
///
/// Returns error if `PFB_CFG0` cannot be read.
pub fn get_bank_shift<B: TileBackend + ?Sized>(backend: &B) -> Result<u32> {
    current_geometry(backend).map(|geo| geo.bank_shift())
}

/// `cfg` with its bank shift lowered by one, if the chipset allows it.
///
/// Column bits go first, down to 8. Then partition config 1 becomes 0, and
/// 0 becomes 2 on everything but NV10.
#[must_use]
pub fn narrower_config(cfg: u32, chipset: u32) -> Option<u32> {
    let geo = BankGeometry::from_config(cfg);
    if geo.col_bits > 8 {
        return Some(cfg - (1 << cfg0::COL_BITS_SHIFT));
    }
    let partition = match geo.partition {
        PartitionConfig::Narrow => PartitionConfig::Wide,
        PartitionConfig::Wide if chipset != chipset::NV10 => PartitionConfig::Narrowest,
        _ => return None,
    };
    Some(BankGeometry { partition, ..geo }.apply_to(cfg))
}

/// Why a bank shift cannot be configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotApplicable {
    /// The card is already narrower than the target
    #[error("bank shift {target} is wider than the configured {current}")]
    Wider {
        /// Requested bank shift
        target: u32,
        /// Bank shift the card runs at
        current: u32,
    },

    /// No configuration step gets below `stuck`
    #[error("cannot lower bank shift below {stuck} (wanted {target})")]
    NoLegalStep {
        /// Requested bank shift
        target: u32,
        /// Narrowest bank shift reached
        stuck: u32,
    },
}

/// Result of [`lower_bank_shift_to`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// The card now runs at the requested bank shift
    Reconfigured {
        /// `PFB_CFG0` writes it took
        steps: u32,
    },
    /// The bank shift is out of reach; the original config is back in place
    NotApplicable(NotApplicable),
}

/// Holds the original `PFB_CFG0` and writes it back on drop
///
/// Nothing is written back unless the guard itself wrote the register.
pub struct ConfigGuard<'a, B: TileBackend + ?Sized> {
    backend: &'a mut B,
    original: u32,
    written: bool,
}

impl<'a, B: TileBackend + ?Sized> ConfigGuard<'a, B> {
    /// Save the current `PFB_CFG0`
    ///
    /// # Errors
    ///
    /// Returns error if `PFB_CFG0` cannot be read.
    pub fn new(backend: &'a mut B) -> Result<Self> {
        let original = backend.read_reg(PFB_CFG0)?;
        Ok(Self {
            backend,
            original,
            written: false,
        })
    }

    /// Saved `PFB_CFG0` value
    #[must_use]
    pub const fn original(&self) -> u32 {
        self.original
    }

    /// Backend the guard borrows
    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Write a new `PFB_CFG0`
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails.
    pub fn write(&mut self, cfg: u32) -> Result<()> {
        self.written = true;
        self.backend.write_reg(PFB_CFG0, cfg)
    }

    /// Write the saved value back now instead of on drop
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails.
    pub fn restore(&mut self) -> Result<()> {
        if !self.written {
            return Ok(());
        }
        self.written = false;
        debug!("Restoring PFB_CFG0 = {:#010x}", self.original);
        self.backend.write_reg(PFB_CFG0, self.original)
    }
}

impl<B: TileBackend + ?Sized> Drop for ConfigGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!("Failed to restore PFB_CFG0 = {:#010x}: {e}", self.original);
        }
    }
}

impl<B: TileBackend + ?Sized> std::fmt::Debug for ConfigGuard<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigGuard")
            .field("original", &format_args!("{:#010x}", self.original))
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

/// Lower the card's bank shift to `target`, one step at a time
///
/// Does not write anything when the card is already at `target`.
///
/// # Errors
///
/// Returns error on register access failure. An unreachable target is not an
/// error but [`Walk::NotApplicable`].
pub fn lower_bank_shift_to<B: TileBackend + ?Sized>(
    guard: &mut ConfigGuard<'_, B>,
    target: u32,
) -> Result<Walk> {
    let chipset = guard.backend().chipset();
    let mut cfg = guard.backend().read_reg(PFB_CFG0)?;
    let mut bank_shift = BankGeometry::from_config(cfg).bank_shift();

    if target > bank_shift {
        return Ok(Walk::NotApplicable(NotApplicable::Wider {
            target,
            current: bank_shift,
        }));
    }

    let mut steps = 0;
    while bank_shift > target {
        let stuck = NotApplicable::NoLegalStep {
            target,
            stuck: bank_shift,
        };
        let Some(next) = narrower_config(cfg, chipset) else {
            guard.restore()?;
            return Ok(Walk::NotApplicable(stuck));
        };

        guard.write(next)?;
        steps += 1;
        cfg = next;

        let reached = get_bank_shift(guard.backend())?;
        debug!("PFB_CFG0 = {cfg:#010x}: bank shift {bank_shift} -> {reached}");
        if reached >= bank_shift {
            guard.restore()?;
            return Ok(Walk::NotApplicable(stuck));
        }
        bank_shift = reached;
    }

    if steps > 0 {
        info!("Bank shift lowered to {bank_shift} in {steps} step(s)");
    }
    Ok(Walk::Reconfigured { steps })
}

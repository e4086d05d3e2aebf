// SPDX-License-Identifier: AGPL-3.0-only

//! Tile-region conformance driver for NV10-family GPUs.
//!
//! Programs the PFB tile regions of a card across its configuration space and
//! compares every observed register and VRAM word against the silicon model
//! in `nvtile-chip`.
//!
//! # Backends
//!
//! ```text
//! Hardware:
//!   SysfsBackend    — BAR0/BAR1 mmap through /sys/bus/pci/devices/*/resourceN
//!
//! Development / CI:
//!   SoftwareBackend — simulated memory controller with fault injection
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use nvtile_driver::prelude::*;
//!
//! # fn main() -> nvtile_driver::Result<()> {
//! let mut card = open_card(BackendSelection::Sysfs, 0)?;
//! if check_preconditions(card.as_ref())? == Readiness::Ready {
//!     let report = run_suite(card.as_mut(), NV10_TILE_TESTS, |name, outcome| {
//!         println!("{name}: {outcome}");
//!     });
//!     std::process::exit(i32::from(report.exit_code()));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
mod discovery;
mod error;
pub mod geometry;
pub mod hwtest;

pub use backend::{open_card, BackendSelection, BackendType, TileBackend};
pub use backends::software::{Fault, SoftwareBackend, SoftwareConfig};
pub use backends::SysfsBackend;
pub use discovery::{DeviceInfo, DeviceManager, DEFAULT_SYSFS_ROOT, SYSFS_ROOT_ENV};
pub use error::{Result, Space, TileError};
pub use geometry::{get_bank_shift, lower_bank_shift_to, ConfigGuard, NotApplicable, Walk};
pub use hwtest::{run_suite, SuiteReport, TestOutcome, TileTest};
pub use tile_tests::{check_preconditions, Readiness, NV10_TILE_TESTS};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        check_preconditions, open_card, run_suite, BackendSelection, DeviceManager,
        Readiness, Result, SoftwareBackend, SoftwareConfig, SuiteReport, TestOutcome,
        TileBackend, TileError, NV10_TILE_TESTS,
    };
}

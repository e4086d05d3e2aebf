// SPDX-License-Identifier: AGPL-3.0-only

//! Card access backends
//!
//! Two backends available:
//! - **sysfs**: mmaps BAR0/BAR1 of a real card through `resourceN` files
//! - **Software**: simulated memory controller for CI and fault injection

pub mod mmap;
pub mod software;
pub mod sysfs;

pub use software::{Fault, SoftwareBackend, SoftwareConfig};
pub use sysfs::SysfsBackend;

// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for device access

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, TileError>;

/// Address space an access was aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// BAR0 register space
    Mmio,
    /// BAR1 VRAM aperture
    Vram,
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Vram => write!(f, "VRAM"),
        }
    }
}

/// Errors that can occur while talking to a card
#[derive(Debug, Error)]
pub enum TileError {
    /// sysfs entry for the device is missing
    #[error("Device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// No NVIDIA display adapters detected on the system
    #[error("No cards found")]
    NoCardsFound,

    /// Card index out of range
    #[error("No such card: {index} (have {count} cards)")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of available cards
        count: usize,
    },

    /// I/O error during device access
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// A BAR could not be mapped
    #[error("Failed to map BAR: {reason}")]
    MapFailed {
        /// Reason for failure
        reason: String,
    },

    /// Access outside a mapped BAR
    #[error("Out of bounds {space} access: offset={offset:#x}, limit={limit:#x}")]
    OutOfBounds {
        /// Address space
        space: Space,
        /// Requested offset
        offset: u64,
        /// Size of the space
        limit: u64,
    },
}

impl TileError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a map failed error
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Self::MapFailed {
            reason: reason.into(),
        }
    }

    /// Create an out of bounds error for a 4-byte access
    pub fn out_of_bounds(space: Space, offset: impl Into<u64>, limit: impl Into<u64>) -> Self {
        Self::OutOfBounds {
            space,
            offset: offset.into(),
            limit: limit.into(),
        }
    }
}

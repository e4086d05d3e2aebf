// SPDX-License-Identifier: AGPL-3.0-only

//! Tile-region pitch encoding and linear → tiled address translation.
//!
//! A tile region's pitch may only use bits 15:8. The hardware reduces it to a
//! factor and a shift:
//!
//! ```text
//! pitch = base(factor) << shift     base = 0x100, 0x300, 0x500, 0x700
//! status = factor | shift << 4      shift >= 1
//! ```
//!
//! Any other pitch (including `0x100` itself, which needs no shift) has no
//! status word and leaves the region untiled; the status register then
//! reads 0.
//!
//! Addresses inside an enabled region are split into 256-byte wide tiles
//! `1 << (bank_shift - 8)` rows high. Two hardware facts are kept verbatim
//! and must not be "simplified":
//!
//! - the intra-tile row `iy` is taken straight from the linear address bits
//!   above `shift + 8`, not from `linear / pitch`;
//! - odd tile rows swap bit `bank_shift`, and on NV15 with partition
//!   config 1 bit 4 is swapped whenever bit 8 is set.

use std::fmt;

/// Bits of a pitch value the hardware latches.
pub const PITCH_MASK: u32 = 0xff00;

/// Bit the normalized pitch is aligned to.
const PITCH_ALIGN_BIT: u32 = 0x100;

/// Tile width in bytes, as a shift.
const TILE_WIDTH_SHIFT: u32 = 8;

/// Address bit swapped by the NV15 partition quirk.
const PARTITION_FLIP_BIT: u32 = 0x10;

/// Address bit that triggers the NV15 partition quirk.
const PARTITION_FLIP_TRIGGER: u32 = 0x100;

/// Normalized pitch shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchFactor {
    /// `0x100 << shift`
    One = 0,
    /// `0x300 << shift`
    Three = 1,
    /// `0x500 << shift`
    Five = 2,
    /// `0x700 << shift`
    Seven = 3,
}

impl PitchFactor {
    /// All factors, in encoding order.
    pub const ALL: [Self; 4] = [Self::One, Self::Three, Self::Five, Self::Seven];

    const BASES: [u32; 4] = [0x100, 0x300, 0x500, 0x700];

    /// Normalized pitch for this factor.
    #[must_use]
    pub const fn base(self) -> u32 {
        Self::BASES[self as usize]
    }

    /// 2-bit status encoding.
    #[must_use]
    pub const fn encoding(self) -> u32 {
        self as u32
    }

    /// Factor whose base equals `normalized`.
    #[must_use]
    pub fn from_base(normalized: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.base() == normalized)
    }

    fn from_encoding(bits: u32) -> Self {
        Self::ALL[(bits & 3) as usize]
    }
}

/// Pitch with bits outside [`PITCH_MASK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchError {
    /// Offending pitch.
    pub pitch: u32,
}

impl fmt::Display for PitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pitch {:#x} has bits outside {PITCH_MASK:#06x} set",
            self.pitch
        )
    }
}

impl std::error::Error for PitchError {}

/// Tile region status word: `factor | shift << 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(u32);

impl StatusWord {
    /// Status register bit set while the region is enabled.
    pub const ENABLED: u32 = 1 << 31;

    fn new(factor: PitchFactor, shift: u32) -> Self {
        Self(factor.encoding() | shift << 4)
    }

    /// Encoded value as the model computes it.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Shift applied to the factor base.
    #[must_use]
    pub const fn shift(self) -> u32 {
        self.0 >> 4
    }

    /// Factor of the normalized pitch.
    #[must_use]
    pub fn factor(self) -> PitchFactor {
        PitchFactor::from_encoding(self.0)
    }

    /// Pitch this status word was derived from.
    #[must_use]
    pub fn pitch(self) -> u32 {
        self.factor().base() << self.shift()
    }

    /// Value the status register reports for this pitch.
    #[must_use]
    pub const fn readback(self, enabled: bool) -> u32 {
        if enabled {
            self.0 | Self::ENABLED
        } else {
            self.0
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Status register value expected for `pitch`: invalid pitches read 0 whether
/// or not the region is enabled.
#[must_use]
pub fn expected_status_readback(pitch: u32, enabled: bool) -> u32 {
    compute_status(pitch).map_or(0, |status| status.readback(enabled))
}

/// Status word for `pitch`, or `None` if the hardware cannot tile with it.
///
/// # Errors
///
/// Returns [`PitchError`] if `pitch` has bits outside [`PITCH_MASK`].
pub fn try_compute_status(pitch: u32) -> Result<Option<StatusWord>, PitchError> {
    if pitch & !PITCH_MASK != 0 {
        return Err(PitchError { pitch });
    }
    if pitch == 0 {
        return Ok(None);
    }
    let shift = pitch.trailing_zeros().saturating_sub(TILE_WIDTH_SHIFT);
    if shift == 0 {
        return Ok(None);
    }
    let normalized = pitch >> shift;
    debug_assert_ne!(normalized & PITCH_ALIGN_BIT, 0);
    Ok(PitchFactor::from_base(normalized).map(|factor| StatusWord::new(factor, shift)))
}

/// Status word for `pitch`, or `None` if the hardware cannot tile with it.
///
/// # Panics
///
/// Panics if `pitch` has bits outside [`PITCH_MASK`]. Pitches come from the
/// register layout, so this is a caller bug.
#[must_use]
pub fn compute_status(pitch: u32) -> Option<StatusWord> {
    match try_compute_status(pitch) {
        Ok(status) => status,
        Err(e) => panic!("{e}"),
    }
}

/// Every pitch value the pitch register can hold that has a status word,
/// in ascending order.
pub fn legal_pitches() -> impl Iterator<Item = (u32, StatusWord)> {
    (0..=PITCH_MASK >> TILE_WIDTH_SHIFT)
        .map(|i| i << TILE_WIDTH_SHIFT)
        .filter_map(|pitch| compute_status(pitch).map(|status| (pitch, status)))
}

/// Physical VRAM offset the controller accesses for `linear` inside a tile
/// region programmed with `pitch`.
///
/// # Panics
///
/// Panics if `pitch` has no status word or `bank_shift` is below 8; both are
/// preconditions of the tiled layout.
#[must_use]
pub fn translate_address(pitch: u32, linear: u32, bank_shift: u32, partition_flip: bool) -> u32 {
    let status = compute_status(pitch)
        .unwrap_or_else(|| panic!("pitch {pitch:#x} cannot be tiled"));
    assert!(
        bank_shift >= TILE_WIDTH_SHIFT,
        "bank shift {bank_shift} below tile width"
    );

    let row_shift = bank_shift - TILE_WIDTH_SHIFT;
    let x = linear % pitch;
    let y = linear / pitch;
    let ix = x & 0xff;
    let iy = linear >> (status.shift() + TILE_WIDTH_SHIFT) & ((1 << row_shift) - 1);
    let tx = x >> TILE_WIDTH_SHIFT;
    let ty = y >> row_shift;

    let mut addr = ix
        .wrapping_add(iy << TILE_WIDTH_SHIFT)
        .wrapping_add(tx << bank_shift)
        .wrapping_add(ty.wrapping_mul(pitch << row_shift));
    if ty & 1 != 0 {
        addr ^= 1 << bank_shift;
    }
    if partition_flip && addr & PARTITION_FLIP_TRIGGER != 0 {
        addr ^= PARTITION_FLIP_BIT;
    }
    addr
}

/// End of the physical range that linear offsets `0..window` reach through a
/// region with `pitch`, rounded up to whole 256-byte lines.
///
/// # Panics
///
/// Panics under the same conditions as [`translate_address`].
#[must_use]
pub fn tiled_window_end(pitch: u32, window: u32, bank_shift: u32, partition_flip: bool) -> u32 {
    let line = 1 << TILE_WIDTH_SHIFT;
    (0..window)
        .step_by(line as usize)
        .map(|linear| {
            let phys = translate_address(pitch, linear, bank_shift, partition_flip);
            (phys & !(line - 1)).saturating_add(line)
        })
        .max()
        .unwrap_or(0)
}

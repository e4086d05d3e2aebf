// SPDX-License-Identifier: AGPL-3.0-only

//! Property tests for the pitch encoding and the tiled address layout.

use nvtile_chip::tiling::PITCH_MASK;
use nvtile_chip::{compute_status, legal_pitches, translate_address, try_compute_status};
use proptest::prelude::*;

fn legal_pitch() -> impl Strategy<Value = u32> {
    let pitches: Vec<u32> = legal_pitches().map(|(p, _)| p).collect();
    proptest::sample::select(pitches)
}

proptest! {
    #[test]
    fn bits_outside_mask_are_rejected(pitch in any::<u32>().prop_filter("outside mask", |p| p & !PITCH_MASK != 0)) {
        prop_assert!(try_compute_status(pitch).is_err());
    }

    #[test]
    fn status_round_trips_to_pitch(i in 0u32..0x100) {
        let pitch = i << 8;
        if let Some(status) = compute_status(pitch) {
            prop_assert!(status.shift() >= 1);
            prop_assert_eq!(status.raw() & 0xf, status.factor().encoding());
            prop_assert_eq!(status.factor().base() << status.shift(), pitch);
            prop_assert_eq!(status.pitch(), pitch);
        }
    }

    #[test]
    fn first_tile_row_group_stays_in_place(
        pitch in legal_pitch(),
        bank_shift in 10u32..=13,
        flip in any::<bool>(),
        offset in any::<u32>(),
    ) {
        // A tile row group spans `pitch << (bank_shift - 8)` bytes.
        let group = pitch << (bank_shift - 8);
        let linear = offset % group;
        prop_assert!(translate_address(pitch, linear, bank_shift, flip) < group);
    }

    #[test]
    fn first_window_lands_below_marker_fill(
        pitch in legal_pitch(),
        bank_shift in 10u32..=13,
        flip in any::<bool>(),
        word in 0u32..0x4_0000,
    ) {
        let phys = translate_address(pitch, word * 4, bank_shift, flip);
        prop_assert_eq!(phys % 4, 0);
        prop_assert!(phys < 0x20_0000 + (1 << bank_shift));
    }

    #[test]
    fn tiling_keeps_byte_lane(
        pitch in legal_pitch(),
        bank_shift in 8u32..=15,
        flip in any::<bool>(),
        linear in 0u32..0x10_0000,
    ) {
        let phys = translate_address(pitch, linear, bank_shift, flip);
        prop_assert_eq!(phys & 0xf, linear & 0xf);
    }
}

#[test]
fn zero_and_unshifted_pitches_have_no_status() {
    assert_eq!(compute_status(0), None);
    for factor_base in [0x100, 0x300, 0x500, 0x700] {
        assert_eq!(compute_status(factor_base), None);
    }
}

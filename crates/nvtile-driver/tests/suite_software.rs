// SPDX-License-Identifier: AGPL-3.0-only

//! Full suite against the simulated memory controller
//!
//! The simulated card decodes tiled VRAM with the same model the suite
//! checks against, so every applicable test must pass, and every exit path
//! must leave `PFB_CFG0` as it was and the tile regions disabled.

use nvtile_chip::pcie::chipset;
use nvtile_chip::regs::{TileRegion, PFB_CFG0, PFB_TILE_STATUS};
use nvtile_driver::hwtest::find_test;
use nvtile_driver::prelude::*;
use nvtile_driver::Fault;

fn run(sw: &mut SoftwareBackend) -> SuiteReport {
    assert_eq!(check_preconditions(sw).unwrap(), Readiness::Ready);
    run_suite(sw, NV10_TILE_TESTS, |_, _| {})
}

fn enabled_regions(sw: &SoftwareBackend) -> usize {
    TileRegion::all()
        .filter(|r| sw.read_reg(r.ctrl()).unwrap() != 0)
        .count()
}

#[test]
fn nv11_passes_everything() {
    let mut sw = SoftwareBackend::new(SoftwareConfig::default());
    let report = run(&mut sw);

    for (name, outcome) in report.results() {
        assert_eq!(*outcome, TestOutcome::Pass, "{name}");
    }
    assert_eq!(report.results().len(), 6);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(sw.read_reg(PFB_CFG0).unwrap(), 0x0a00_0010);
    assert_eq!(enabled_regions(&sw), 0);
}

#[test]
fn nv10_skips_narrowest_partition() {
    let mut sw = SoftwareBackend::new(SoftwareConfig {
        chipset: chipset::NV10,
        ..SoftwareConfig::default()
    });

    let report = run(&mut sw);

    assert_eq!(report.outcome("test_format_bs10"), Some(TestOutcome::NotApplicable));
    assert_eq!(report.outcome("test_format_bs11"), Some(TestOutcome::Pass));
    assert_eq!(report.worst(), TestOutcome::NotApplicable);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(sw.read_reg(PFB_CFG0).unwrap(), 0x0a00_0010);
}

#[test]
fn nv15_partition_flip_matches() {
    let mut sw = SoftwareBackend::new(SoftwareConfig {
        chipset: chipset::NV15,
        ..SoftwareConfig::default()
    });
    let format = ["test_format_bs13", "test_format_bs11"];
    for name in format {
        let test = find_test(NV10_TILE_TESTS, name).unwrap();
        assert_eq!(test.execute(&mut sw), TestOutcome::Pass, "{name}");
    }
    assert_eq!(sw.read_reg(PFB_CFG0).unwrap(), 0x0a00_0010);
}

#[test]
fn narrow_card_reports_wider_shifts_not_applicable() {
    // 8 column bits, partition config 0: bank shift 11
    let mut sw = SoftwareBackend::new(SoftwareConfig {
        cfg0: 0x0800_0000,
        ..SoftwareConfig::default()
    });
    let bs13 = find_test(NV10_TILE_TESTS, "test_format_bs13").unwrap();
    assert_eq!(bs13.execute(&mut sw), TestOutcome::NotApplicable);
    assert_eq!(sw.writes_to(PFB_CFG0), 0);
}

#[test]
fn status_fault_fails_suite() {
    let mut sw = SoftwareBackend::new(SoftwareConfig::default()).with_fault(Fault::StatusXor(0x10));
    let status = find_test(NV10_TILE_TESTS, "test_status").unwrap();
    assert_eq!(status.execute(&mut sw), TestOutcome::Fail);
    assert_eq!(TestOutcome::Fail.exit_code(), 4);
    // Region 0 is left disabled.
    assert_eq!(sw.read_reg(PFB_TILE_STATUS).unwrap() & 0x8000_0000, 0);
}

#[test]
fn stuck_marker_fails_format() {
    let mut sw = SoftwareBackend::new(SoftwareConfig::default())
        .with_fault(Fault::StuckWord { offset: 0x15_0000, value: 0xdead_beef });
    let bs12 = find_test(NV10_TILE_TESTS, "test_format_bs12").unwrap();
    assert_eq!(bs12.execute(&mut sw), TestOutcome::Fail);
    assert_eq!(sw.read_reg(PFB_CFG0).unwrap(), 0x0a00_0010);
}

#[test]
fn controller_down_is_unprepared() {
    let sw = SoftwareBackend::new(SoftwareConfig {
        pfb_enabled: false,
        ..SoftwareConfig::default()
    });
    let readiness = check_preconditions(&sw).unwrap();
    assert_eq!(readiness, Readiness::ControllerDown);
    assert_eq!(readiness.outcome().exit_code(), 3);
}

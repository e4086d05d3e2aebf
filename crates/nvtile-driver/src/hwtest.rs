// SPDX-License-Identifier: AGPL-3.0-only

//! Hardware test harness
//!
//! A test is a named function over a [`TileBackend`] that yields a
//! [`TestOutcome`]. The suite runs every test once, in order, and the worst
//! outcome decides the process exit status.

use crate::backend::TileBackend;
use crate::error::Result;
use std::fmt;
use tracing::{error, info};

/// Outcome of one hardware test, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestOutcome {
    /// Hardware matched the model
    Pass,
    /// The test does not apply to this card or configuration
    NotApplicable,
    /// The card was not in a state the test can run in
    Unprepared,
    /// Hardware disagreed with the model
    Fail,
}

impl TestOutcome {
    /// Severity rank, 0 for [`TestOutcome::Pass`]
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::NotApplicable => 1,
            Self::Unprepared => 2,
            Self::Fail => 3,
        }
    }

    /// Process exit status for a run whose worst outcome is `self`
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Pass => 0,
            _ => self.rank() + 1,
        }
    }

    /// Result label as printed after the test name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "passed",
            Self::NotApplicable => "n/a",
            Self::Unprepared => "hw not prepared",
            Self::Fail => "FAILED",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Test entry point
pub type TestFn = fn(&mut dyn TileBackend) -> Result<TestOutcome>;

/// A named hardware test
#[derive(Clone, Copy)]
pub struct TileTest {
    /// Name printed in the report and accepted by `--test`
    pub name: &'static str,
    /// Entry point
    pub run: TestFn,
}

impl TileTest {
    /// Create a named test
    #[must_use]
    pub const fn new(name: &'static str, run: TestFn) -> Self {
        Self { name, run }
    }

    /// Run the test
    ///
    /// An access error means the card could not be driven as the test
    /// needs, so it is reported as [`TestOutcome::Unprepared`].
    pub fn execute(&self, backend: &mut dyn TileBackend) -> TestOutcome {
        info!("Running {}", self.name);
        match (self.run)(backend) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{}: {e}", self.name);
                TestOutcome::Unprepared
            }
        }
    }
}

impl fmt::Debug for TileTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TileTest").field(&self.name).finish()
    }
}

/// Look a test up by name
#[must_use]
pub fn find_test<'a>(tests: &'a [TileTest], name: &str) -> Option<&'a TileTest> {
    tests.iter().find(|t| t.name == name)
}

/// Outcomes of a suite run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    results: Vec<(&'static str, TestOutcome)>,
}

impl SuiteReport {
    /// Empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome
    pub fn record(&mut self, name: &'static str, outcome: TestOutcome) {
        self.results.push((name, outcome));
    }

    /// `(name, outcome)` pairs in execution order
    #[must_use]
    pub fn results(&self) -> &[(&'static str, TestOutcome)] {
        &self.results
    }

    /// Outcome of the named test, if it ran
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<TestOutcome> {
        self.results
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, outcome)| outcome)
    }

    /// Most severe outcome, [`TestOutcome::Pass`] for an empty run
    #[must_use]
    pub fn worst(&self) -> TestOutcome {
        self.results
            .iter()
            .map(|&(_, outcome)| outcome)
            .max()
            .unwrap_or(TestOutcome::Pass)
    }

    /// Process exit status of the run
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.worst().exit_code()
    }
}

/// Run `tests` in order, calling `on_result` after each one
pub fn run_suite(
    backend: &mut dyn TileBackend,
    tests: &[TileTest],
    mut on_result: impl FnMut(&'static str, TestOutcome),
) -> SuiteReport {
    let mut report = SuiteReport::new();
    for test in tests {
        let outcome = test.execute(backend);
        on_result(test.name, outcome);
        report.record(test.name, outcome);
    }
    report
}

/// Check which bits of a register latch
///
/// Writes all ones, all zeros and then each single bit, expecting
/// `(written & all1) | all0` back every time. The original value is written
/// back afterwards, also after a mismatch.
///
/// # Errors
///
/// Returns error on register access failure.
pub fn bitscan(backend: &mut dyn TileBackend, reg: u32, all1: u32, all0: u32) -> Result<bool> {
    let saved = backend.read_reg(reg)?;
    let patterns = [u32::MAX, 0].into_iter().chain((0..32).map(|bit| 1u32 << bit));

    let mut ok = true;
    for written in patterns {
        backend.write_reg(reg, written)?;
        let real = backend.read_reg(reg)?;
        let exp = written & all1 | all0;
        if real != exp {
            error!(
                "Bitscan mismatch on {reg:#08x} writing {written:#010x}: is {real:#010x}, expected {exp:#010x}"
            );
            ok = false;
            break;
        }
    }

    backend.write_reg(reg, saved)?;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::{Fault, SoftwareBackend, SoftwareConfig};
    use crate::error::TileError;
    use nvtile_chip::regs::{PFB_TILE_LIMIT, PFB_TILE_PITCH};

    #[test]
    fn outcomes_order_by_severity() {
        assert!(TestOutcome::Pass < TestOutcome::NotApplicable);
        assert!(TestOutcome::NotApplicable < TestOutcome::Unprepared);
        assert!(TestOutcome::Unprepared < TestOutcome::Fail);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(TestOutcome::Pass.exit_code(), 0);
        assert_eq!(TestOutcome::NotApplicable.exit_code(), 2);
        assert_eq!(TestOutcome::Unprepared.exit_code(), 3);
        assert_eq!(TestOutcome::Fail.exit_code(), 4);
    }

    #[test]
    fn report_keeps_worst() {
        let mut report = SuiteReport::new();
        assert_eq!(report.worst(), TestOutcome::Pass);
        report.record("a", TestOutcome::NotApplicable);
        report.record("b", TestOutcome::Pass);
        assert_eq!(report.exit_code(), 2);
        report.record("c", TestOutcome::Fail);
        report.record("d", TestOutcome::Unprepared);
        assert_eq!(report.worst(), TestOutcome::Fail);
        assert_eq!(report.outcome("d"), Some(TestOutcome::Unprepared));
        assert_eq!(report.outcome("e"), None);
    }

    fn errors(_: &mut dyn TileBackend) -> Result<TestOutcome> {
        Err(TileError::NoCardsFound)
    }

    fn passes(_: &mut dyn TileBackend) -> Result<TestOutcome> {
        Ok(TestOutcome::Pass)
    }

    #[test]
    fn access_errors_are_unprepared() {
        let mut sw = SoftwareBackend::new(SoftwareConfig::default());
        let tests = [TileTest::new("passes", passes), TileTest::new("errors", errors)];
        let mut seen = Vec::new();
        let report = run_suite(&mut sw, &tests, |name, outcome| seen.push((name, outcome)));
        assert_eq!(seen, report.results());
        assert_eq!(report.worst(), TestOutcome::Unprepared);
        assert!(find_test(&tests, "errors").is_some());
        assert!(find_test(&tests, "missing").is_none());
    }

    #[test]
    fn bitscan_restores_register() {
        let mut sw = SoftwareBackend::new(SoftwareConfig::default());
        sw.write_reg(PFB_TILE_PITCH, 0x0600).unwrap();
        assert!(bitscan(&mut sw, PFB_TILE_PITCH, 0xff00, 0).unwrap());
        assert_eq!(sw.read_reg(PFB_TILE_PITCH).unwrap(), 0x0600);
    }

    #[test]
    fn bitscan_catches_dead_bit() {
        let mut sw = SoftwareBackend::new(SoftwareConfig::default()).with_fault(Fault::DeadBits {
            addr: PFB_TILE_LIMIT,
            mask: 1 << 20,
        });
        assert!(!bitscan(&mut sw, PFB_TILE_LIMIT, 0x07ff_c000, 0).unwrap());
        assert!(bitscan(&mut sw, PFB_TILE_PITCH, 0xff00, 0).unwrap());
    }
}

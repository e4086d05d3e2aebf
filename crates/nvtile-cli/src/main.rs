// SPDX-License-Identifier: AGPL-3.0-only

//! `nv10-tile`: tile-region conformance suite for NV10-family cards.
//!
//! ```text
//! USAGE:
//!   nv10-tile [-c <card>] [-n]             Run the suite on a card (root)
//!   nv10-tile --test test_status           Run one test
//!   nv10-tile --backend software           Run against the simulated card
//!   nv10-tile --list                       List test names
//! ```
//!
//! Prints `<name>: <result>` per test. Exit status is 0 when everything
//! passed, otherwise 2 (n/a), 3 (hw not prepared) or 4 (FAILED) for the worst
//! result, and 1 if there is no such card.

use anyhow::{bail, Context, Result};
use clap::builder::styling::{AnsiColor, Style};
use clap::{Parser, ValueEnum};
use nvtile_driver::hwtest::find_test;
use nvtile_driver::{
    check_preconditions, open_card, run_suite, BackendSelection, Readiness, SoftwareConfig,
    TestOutcome, TileError, TileTest, NV10_TILE_TESTS,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nv10-tile",
    about = "NV10-family PFB tile region conformance tests",
    version
)]
struct Cli {
    /// Card number, in PCI address order.
    #[arg(short, long, default_value_t = 0)]
    card: usize,

    /// Print results without colors.
    #[arg(short = 'n', long)]
    no_colors: bool,

    /// How to reach the card.
    #[arg(long, value_enum, default_value_t = Backend::Sysfs)]
    backend: Backend,

    /// Chipset of the simulated card (hex).
    #[arg(long, value_parser = parse_hex, default_value = "0x11")]
    sw_chipset: u32,

    /// Initial PFB_CFG0 of the simulated card (hex).
    #[arg(long, value_parser = parse_hex, default_value = "0x0a000010")]
    sw_config: u32,

    /// Run only the named test.
    #[arg(long, value_name = "NAME")]
    test: Option<String>,

    /// List the tests and exit.
    #[arg(long)]
    list: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// mmap BAR0/BAR1 through sysfs (root).
    Sysfs,
    /// Simulated memory controller.
    Software,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value {s:?}: {e}"))
}

impl Cli {
    fn selection(&self) -> BackendSelection {
        match self.backend {
            Backend::Sysfs => BackendSelection::Sysfs,
            Backend::Software => BackendSelection::Software(SoftwareConfig {
                chipset: self.sw_chipset,
                cfg0: self.sw_config,
                ..SoftwareConfig::default()
            }),
        }
    }

    fn tests(&self) -> Result<Vec<TileTest>> {
        let Some(name) = &self.test else {
            return Ok(NV10_TILE_TESTS.to_vec());
        };
        match find_test(NV10_TILE_TESTS, name) {
            Some(test) => Ok(vec![*test]),
            None => bail!("Unknown test {name:?}; see --list"),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Exit status of the run
fn run(cli: &Cli) -> Result<u8> {
    if cli.list {
        for test in NV10_TILE_TESTS {
            println!("{}", test.name);
        }
        return Ok(0);
    }

    let tests = cli.tests()?;

    let mut card = match open_card(cli.selection(), cli.card) {
        Ok(card) => card,
        Err(TileError::NoCardsFound) => {
            eprintln!("No cards found.");
            return Ok(1);
        }
        Err(TileError::InvalidIndex { .. }) => {
            eprintln!("No such card.");
            return Ok(1);
        }
        Err(e) => return Err(e).context(format!("Cannot open card {}", cli.card)),
    };
    tracing::info!(
        "Card {} on {} backend, chipset NV{:02X}",
        cli.card,
        card.backend_type(),
        card.chipset()
    );

    let readiness = check_preconditions(card.as_ref())
        .with_context(|| format!("Cannot read PMC_ENABLE of card {}", cli.card))?;
    match readiness {
        Readiness::Ready => {}
        Readiness::UnsupportedChipset(_) => {
            eprintln!("Test not applicable for this chipset.");
            return Ok(readiness.outcome().exit_code());
        }
        Readiness::ControllerDown => {
            eprintln!("Mem controller not up.");
            return Ok(readiness.outcome().exit_code());
        }
    }

    let report = run_suite(card.as_mut(), &tests, |name, outcome| {
        println!("{name}: {}", label(outcome, !cli.no_colors));
    });

    Ok(report.exit_code())
}

fn label_style(outcome: TestOutcome) -> Option<Style> {
    match outcome {
        TestOutcome::Pass => Some(AnsiColor::Green.on_default()),
        TestOutcome::NotApplicable => None,
        TestOutcome::Unprepared => Some(AnsiColor::Yellow.on_default()),
        TestOutcome::Fail => Some(AnsiColor::Red.on_default()),
    }
}

/// Result label, optionally wrapped in ANSI color codes
fn label(outcome: TestOutcome, colors: bool) -> String {
    match label_style(outcome).filter(|_| colors) {
        Some(style) => format!(
            "{}{}{}",
            style.render(),
            outcome.label(),
            style.render_reset()
        ),
        None => outcome.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_card_and_color_flags() {
        let cli = Cli::try_parse_from(["nv10-tile", "-c", "1", "-n"]).unwrap();
        assert_eq!(cli.card, 1);
        assert!(cli.no_colors);
        assert!(cli.backend == Backend::Sysfs);
        assert_eq!(cli.tests().unwrap().len(), 6);
    }

    #[test]
    fn software_backend_options() {
        let cli = Cli::try_parse_from([
            "nv10-tile",
            "--backend",
            "software",
            "--sw-chipset",
            "15",
            "--sw-config",
            "0x09000000",
            "--test",
            "test_status",
        ])
        .unwrap();
        match cli.selection() {
            BackendSelection::Software(config) => {
                assert_eq!(config.chipset, 0x15);
                assert_eq!(config.cfg0, 0x0900_0000);
            }
            BackendSelection::Sysfs => panic!("expected software backend"),
        }
        assert_eq!(cli.tests().unwrap()[0].name, "test_status");
    }

    #[test]
    fn unknown_test_is_rejected() {
        let cli = Cli::try_parse_from(["nv10-tile", "--test", "test_bogus"]).unwrap();
        assert!(cli.tests().is_err());
    }

    #[test]
    fn hex_parser() {
        assert_eq!(parse_hex("0x1a"), Ok(0x1a));
        assert_eq!(parse_hex("FF"), Ok(0xff));
        assert!(parse_hex("0xzz").is_err());
    }

    #[test]
    fn labels() {
        assert_eq!(label(TestOutcome::Pass, false), "passed");
        assert_eq!(label(TestOutcome::Pass, true), "\x1b[32mpassed\x1b[0m");
        assert_eq!(label(TestOutcome::NotApplicable, true), "n/a");
        assert_eq!(label(TestOutcome::Unprepared, true), "\x1b[33mhw not prepared\x1b[0m");
        assert_eq!(label(TestOutcome::Fail, true), "\x1b[31mFAILED\x1b[0m");
    }

    #[test]
    fn simulated_card_exit_status() {
        let cli = Cli::try_parse_from([
            "nv10-tile",
            "--backend",
            "software",
            "--test",
            "test_scan",
        ])
        .unwrap();
        assert_eq!(run(&cli).unwrap(), 0);

        let nv20 = Cli::try_parse_from(["nv10-tile", "--backend", "software", "--sw-chipset", "20"])
            .unwrap();
        assert_eq!(run(&nv20).unwrap(), 2);

        let second = Cli::try_parse_from(["nv10-tile", "--backend", "software", "-c", "1"]).unwrap();
        assert_eq!(run(&second).unwrap(), 1);
    }
}

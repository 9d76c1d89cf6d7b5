use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};

use twitb::bus::SDA_MASK;
use twitb::config::{AddressPattern, ScenarioConfig};
use twitb::model::{ModelSim, StatusTarget};
use twitb::scenario::Scenario;
use twitb::test::TbTests;
use twitb::utils;

/// TWITB - status reads over a bit-banged two-wire bus
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to transmit: structured, alternating, random, or a 0x/0b/decimal byte
    #[arg(short, long, default_value = "alternating")]
    pattern: String,

    /// Address the model target responds to (defaults to the transmitted one)
    #[arg(long)]
    target_address: Option<String>,

    /// Status byte held by the model target
    #[arg(long, default_value_t = 0x80)]
    status: u8,

    /// System clock period in microseconds
    #[arg(long, default_value_t = 10)]
    period_us: u32,

    /// Reset hold cycles of the cold-reset scenario
    #[arg(long, default_value_t = 3)]
    cold_reset_cycles: u32,

    /// Reset hold cycles of the warm-reset scenario
    #[arg(long, default_value_t = 1)]
    warm_reset_cycles: u32,

    /// Write a JUnit XML report to this file
    #[arg(long)]
    junit: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_pattern(s: &str) -> Result<AddressPattern> {
    if s.eq_ignore_ascii_case("random") {
        return Ok(AddressPattern::Custom(utils::rand_byte()));
    }
    Ok(s.parse::<AddressPattern>()?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let address = parse_pattern(&cli.pattern)?;
    let target = match &cli.target_address {
        Some(s) => parse_pattern(s)?,
        None => address,
    };
    let expected_status = if cli.status & 0x80 != 0 { SDA_MASK } else { 0 };
    let config = ScenarioConfig::default()
        .with_clock(cli.period_us, "us")
        .with_address(address)
        .with_reset_cycles(cli.cold_reset_cycles, cli.warm_reset_cycles)
        .with_expected_status(expected_status);
    config.validate()?;
    info!("Transmitting address {}, target listens on {}", address, target);

    let mut tests = TbTests::new();
    tests.push_scenario(Scenario::status_read(config.clone()));
    tests.push_scenario(Scenario::start_then_status_read(config));

    let sim = Rc::new(ModelSim::new(
        StatusTarget::new(target.byte()).with_status(cli.status),
    ));
    let report = twitb::run_tests(sim, tests);

    if let Some(path) = &cli.junit {
        let file = File::create(path)
            .with_context(|| format!("Failed to create JUnit report {:?}", path))?;
        report.write_junit("twitb", file)?;
        info!("JUnit report written to {:?}", path);
    }

    if !report.passed() {
        for t in report.failures() {
            warn!("{} failed", t.name);
        }
        anyhow::bail!("{} of {} tests failed", report.failures().count(), report.tests.len());
    }
    Ok(())
}

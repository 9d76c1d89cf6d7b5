use futures::FutureExt;
use proptest::prelude::*;
use rstest::rstest;
use std::rc::Rc;

use twitb::bus::{PinBus, ENA, RST_N, SDA_MASK, UIO_IN};
use twitb::config::{AddressPattern, ScenarioConfig};
use twitb::engine::{BusDriver, Checkpoint};
use twitb::model::{ModelSim, StatusTarget};
use twitb::phase::Phase;
use twitb::scenario::{Scenario, CHECK_RESET, CHECK_STATUS};
use twitb::sequencer::{self, Reset};
use twitb::test::{TbTests, Test};
use twitb::{run_tests, SimReport, TbError, Val};

const US: u64 = 1_000_000; // ps

fn run(sim: &Rc<ModelSim>, scenarios: Vec<Scenario>) -> SimReport {
    let mut tests = TbTests::new();
    for scenario in scenarios {
        tests.push_scenario(scenario);
    }
    run_tests(sim.clone(), tests)
}

fn target_for(config: &ScenarioConfig) -> Rc<ModelSim> {
    Rc::new(ModelSim::new(StatusTarget::new(config.address.byte())))
}

#[rstest]
#[case(AddressPattern::Structured)]
#[case(AddressPattern::Alternating)]
fn status_read_returns_the_status_bit(#[case] pattern: AddressPattern) {
    let config = ScenarioConfig::default().with_address(pattern);
    let sim = target_for(&config);
    let report = run(&sim, vec![Scenario::status_read(config)]);
    let test = report.test("status_read").expect("test was run");
    assert_eq!(test.result, Ok(Val::String("2 checkpoints passed".to_string())));
    assert_eq!(sim.value(UIO_IN), Some(0));
}

#[rstest]
#[case(AddressPattern::Structured)]
#[case(AddressPattern::Alternating)]
fn start_condition_does_not_change_the_status(#[case] pattern: AddressPattern) {
    let config = ScenarioConfig::default().with_address(pattern);
    let sim = target_for(&config);
    let report = run(
        &sim,
        vec![
            Scenario::status_read(config.clone()),
            Scenario::start_then_status_read(config),
        ],
    );
    assert!(report.passed(), "{:?}", report);
    let names: Vec<&str> = report.tests.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["status_read", "start_then_status_read"]);
}

#[rstest]
fn any_reset_hold_gives_an_idle_bus(#[values(1, 2, 3, 5)] hold: u32) {
    let config = ScenarioConfig::default().with_reset_cycles(hold, hold);
    let sim = target_for(&config);
    let report = run(
        &sim,
        vec![
            Scenario::status_read(config.clone()),
            Scenario::start_then_status_read(config),
        ],
    );
    assert!(report.passed(), "{:?}", report);
}

#[test]
fn warm_reset_releases_after_the_hold() {
    let config = ScenarioConfig::default();
    let sim = target_for(&config);
    let scenario = Scenario::new("warm", config)
        .with_reset(Reset::warm(1))
        .check(CHECK_RESET, 0);
    let report = run(&sim, vec![scenario]);
    assert!(report.passed(), "{:?}", report);
    // live cycle ending on the edge at 5 us, one held cycle ending at 15 us
    assert_eq!(sim.changes(RST_N), vec![(0, 1), (5 * US, 0), (15 * US, 1)]);
    assert_eq!(sim.changes(ENA), vec![(0, 1)]);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(5)]
fn reset_is_held_for_exactly_the_hold_cycles(#[case] hold: u64) {
    let hold_cycles = u32::try_from(hold).expect("small hold");
    let cold_sim = target_for(&ScenarioConfig::default());
    let cold = Scenario::new("cold", ScenarioConfig::default())
        .with_reset(Reset::cold(hold_cycles))
        .check(CHECK_RESET, 0);
    assert!(run(&cold_sim, vec![cold]).passed());
    // asserted from t=0, released on the hold-th rising edge (5 us, 15 us, ...)
    assert_eq!(cold_sim.changes(RST_N), vec![((10 * hold - 5) * US, 1)]);

    let warm_sim = target_for(&ScenarioConfig::default());
    let warm = Scenario::new("warm", ScenarioConfig::default())
        .with_reset(Reset::warm(hold_cycles))
        .check(CHECK_RESET, 0);
    assert!(run(&warm_sim, vec![warm]).passed());
    assert_eq!(
        warm_sim.changes(RST_N),
        vec![(0, 1), (5 * US, 0), ((10 * hold + 5) * US, 1)]
    );
}

#[test]
fn reference_cold_reset_releases_at_25_us() {
    let config = ScenarioConfig::default();
    let sim = target_for(&config);
    assert!(run(&sim, vec![Scenario::status_read(config)]).passed());
    assert_eq!(sim.changes(RST_N), vec![(25 * US, 1)]);
}

#[test]
fn wrong_expected_status_names_the_checkpoint() {
    let config = ScenarioConfig::default().with_expected_status(0);
    let sim = target_for(&config);
    let report = run(&sim, vec![Scenario::status_read(config)]);
    assert_eq!(
        report.tests[0].result,
        Err(TbError::Mismatch {
            checkpoint: CHECK_STATUS.to_string(),
            expected: 0,
            actual: u32::from(SDA_MASK),
        })
    );
}

#[test]
fn target_with_another_address_stays_silent() {
    let config = ScenarioConfig::default().with_address(AddressPattern::Alternating);
    let sim = Rc::new(ModelSim::new(StatusTarget::new(0x72)));
    let report = run(
        &sim,
        vec![
            Scenario::status_read(config.clone()),
            Scenario::start_then_status_read(config),
        ],
    );
    assert_eq!(report.failures().count(), 2);
    for t in &report.tests {
        assert!(matches!(
            &t.result,
            Err(TbError::Mismatch { checkpoint, actual: 0, .. }) if checkpoint == CHECK_STATUS
        ));
    }
}

#[test]
fn bit_steps_land_on_rising_edges() {
    let config = ScenarioConfig::default();
    let sim = target_for(&config);
    let scenario = Scenario::new("bit", config).phase(Phase::Bit(true));
    let report = run(&sim, vec![scenario]);
    assert!(report.passed(), "{:?}", report);
    assert_eq!(
        sim.changes(UIO_IN),
        vec![(25 * US, 0b1000), (35 * US, 0b1100), (45 * US, 0)]
    );
    assert_eq!(report.sim_time_ns, 55_000.0);
}

#[test]
fn data_line_is_released_between_bits() {
    let config = ScenarioConfig::default();
    let sim = target_for(&config);
    let scenario = Scenario::new("bits", config)
        .phase(Phase::Bit(true))
        .phase(Phase::Bit(false));
    assert!(run(&sim, vec![scenario]).passed());
    let values: Vec<u32> = sim.changes(UIO_IN).into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec![0b1000, 0b1100, 0, 0b0100, 0]);
}

#[test]
fn whole_scenario_only_writes_on_rising_edges() {
    let config = ScenarioConfig::default();
    let sim = target_for(&config);
    assert!(run(&sim, vec![Scenario::status_read(config)]).passed());
    let changes = sim.changes(UIO_IN);
    assert!(!changes.is_empty());
    assert!(changes.iter().all(|(t, _)| t % (10 * US) == 5 * US), "{:?}", changes);
    assert!(changes.iter().all(|(_, v)| v & !0b1100 == 0));
}

#[test]
fn hand_written_test_drives_the_bus_directly() {
    let sim = Rc::new(ModelSim::new(StatusTarget::new(0x72)));
    let mut tests = TbTests::new();
    tests.push(Test::new("hand_written", |dut| {
        async move {
            let mut bus = PinBus::from_dut(dut)?;
            sequencer::start_clock(&bus, 10, "us")?;
            sequencer::reset(&mut bus, Reset::cold(3)).await?;
            let mut driver = BusDriver::new(&mut bus);
            driver.idle().await?;
            driver.sample_and_assert(&Checkpoint::new("idle", 0))?;
            driver.start_condition().await?;
            driver.transmit_pattern(&AddressPattern::Structured.bits()).await?;
            driver.trailing_pulse().await?;
            let status = driver.sample_and_assert(&Checkpoint::new("status", SDA_MASK))?;
            Ok::<Val, TbError>(Val::Int(i64::from(status)))
        }
        .boxed()
    }));
    let report = run_tests(sim, tests);
    assert_eq!(report.tests[0].result, Ok(Val::Int(8)));
}

#[test]
fn invalid_clock_fails_the_test() {
    let config = ScenarioConfig::default().with_clock(1, "us");
    let sim = target_for(&config);
    let report = run(&sim, vec![Scenario::status_read(config)]);
    assert!(matches!(report.tests[0].result, Err(TbError::Config(_))));
}

#[test]
fn time_limit_leaves_the_test_incomplete() {
    let config = ScenarioConfig::default();
    let sim = Rc::new(
        ModelSim::new(StatusTarget::new(config.address.byte())).with_time_limit(30 * US),
    );
    let report = run(&sim, vec![Scenario::status_read(config)]);
    assert_eq!(report.tests[0].result, Err(TbError::Incomplete));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_address_reads_the_status(address in any::<u8>()) {
        let config = ScenarioConfig::default().with_address(AddressPattern::Custom(address));
        let sim = target_for(&config);
        let report = run(
            &sim,
            vec![
                Scenario::status_read(config.clone()),
                Scenario::start_then_status_read(config),
            ],
        );
        prop_assert!(report.passed(), "{:?}", report);
    }
}

//! Two-wire bus testbenches for HDL peripherals.
//!
//! Tests are async functions driving a device through a simulator interface
//! ([`sim_if::SimIf`]). The stimulus engine bit-bangs an I2C-like bus over the
//! device's bidirectional pins and checks the bus response at checkpoints.

pub mod bus;
pub mod config;
pub mod engine;
mod error;
mod executor;
mod junit;
pub mod model;
pub mod phase;
pub mod prelude;
mod report;
pub mod scenario;
pub mod sequencer;
mod shared;
mod signal;
pub mod sim_if;
mod trigger;
pub mod utils;
mod value;

pub use error::TbError;
pub use executor::{JoinHandle, Task};
pub use report::{SimReport, TestReport};
pub use signal::{ObjectKind, SimObject};
pub use trigger::{EdgeKind, Trigger};
pub use value::Val;

use shared::Shared;
use sim_if::{sim_if, SimIf, SimRunner};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time;
use test::{TbTests, Test};

pub type SimpleResult<T> = Result<T, TbError>;
pub type TbResult = Result<Val, TbError>;

thread_local! {
    static CURRENT_TEST: RefCell<Option<(Arc<Task>, Shared<Test>)>> = const { RefCell::new(None) };
}

/// Logs through the active simulator interface.
pub fn sim_log(msg: &str) {
    sim_if().log(msg);
}

/// Passes the running test, unless it already passed or failed.
pub fn pass_test(val: Val) {
    if let Some((task, test)) = CURRENT_TEST.with(|c| c.borrow_mut().take()) {
        test.with_mut(|t| t.set_result(Ok(val)));
        tear_down_test(&task);
    }
}

/// Fails the running test, unless it already passed or failed.
pub fn fail_test(err: TbError) {
    if let Some((task, test)) = CURRENT_TEST.with(|c| c.borrow_mut().take()) {
        sim_log(&format!("FAILED: {}", err));
        test.with_mut(|t| t.set_result(Err(err)));
        tear_down_test(&task);
    }
}

fn tear_down_test(test: &Task) {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    test.cancel();
}

/// Runs `tests` one after another on `sim` and collects their results.
pub fn run_tests<S>(sim: Rc<S>, tests: TbTests) -> SimReport
where
    S: SimIf + SimRunner + 'static,
{
    let dyn_sim: Rc<dyn SimIf> = sim.clone();
    sim_if::install(dyn_sim);
    let start = time::Instant::now();

    start_of_simulation(&tests);
    sim.run();
    let report = end_of_simulation(&tests, start);

    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    CURRENT_TEST.with(|c| c.replace(None));
    sim_if::uninstall();
    report
}

fn start_of_simulation(tests: &TbTests) {
    let sim_root = match SimObject::get_root() {
        Ok(root) => root,
        Err(e) => {
            for test in tests.iter() {
                test.with_mut(|t| t.set_result(Err(e.clone())));
            }
            return;
        }
    };

    // All tests are scheduled in a chain at simulation start up by awaiting the previous test completion.
    // Wrapping logic handles test results, timers, etc.
    let mut join_handle: Option<JoinHandle> = None;
    for test in tests.iter().cloned() {
        let previous = join_handle.take();
        join_handle = Some(Task::spawn_from_future(
            async move {
                // await previous test, if there is one
                if let Some(handle) = previous {
                    let _ = handle.await;
                }
                let name = test.get().name.clone();
                let running = test.clone();
                let test_handle = Task::spawn_from_future(
                    async move {
                        let time_start = time::Instant::now();
                        let sim_time_start = sim_if().get_sim_time("ns");
                        let generator = running.get().generator.clone();
                        sim_log(&format!("Running test {}", running.get().name));
                        // await test execution
                        let result = (generator)(sim_root).await;

                        let sim_time = sim_if().get_sim_time("ns") - sim_time_start;
                        running.with_mut(|t| {
                            t.time_secs = time_start.elapsed().as_secs_f64();
                            t.sim_time_ns = sim_time;
                        });
                        match result {
                            Ok(val) => pass_test(val),
                            Err(e) => fail_test(e),
                        }
                        Ok(Val::None)
                    },
                    &name,
                );
                if let Some(task) = test_handle.task() {
                    CURRENT_TEST.with(|c| c.replace(Some((task, test.clone()))));
                }
                // await test execution
                let _ = test_handle.await;
                Ok(Val::None)
            },
            "chain",
        ));
    }

    // execute first simulation tick
    executor::run_once();
}

fn end_of_simulation(tests: &TbTests, start: time::Instant) -> SimReport {
    let real_time_secs = start.elapsed().as_secs_f64();
    let sim_time_ns = sim_if().get_sim_time("ns");
    let tests = tests
        .iter()
        .map(|test| {
            test.with_mut(|t| TestReport {
                name: t.name.clone(),
                result: t.result.take().unwrap_or(Err(TbError::Incomplete)),
                time_secs: t.time_secs,
                sim_time_ns: t.sim_time_ns,
            })
        })
        .collect();
    let report = SimReport {
        tests,
        sim_time_ns,
        real_time_secs,
    };
    for line in report.summary_lines() {
        sim_log(&line);
    }
    report
}

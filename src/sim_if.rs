use std::cell::RefCell;
use std::rc::Rc;

use crate::signal::SimObject;
use crate::trigger::EdgeKind;
use crate::{SimpleResult, TbError};

thread_local! {
    static SIM_IF: RefCell<Option<Rc<dyn SimIf>>> = const { RefCell::new(None) };
}

/// Installs `sim` as the simulator interface of the current thread.
pub fn install(sim: Rc<dyn SimIf>) {
    SIM_IF.with(|s| s.replace(Some(sim)));
}

pub fn uninstall() {
    SIM_IF.with(|s| s.replace(None));
}

/// The simulator interface of the current thread.
///
/// Panics when called outside of a simulation run.
pub fn sim_if() -> Rc<dyn SimIf> {
    SIM_IF.with(|s| match s.borrow().as_ref() {
        Some(sim) => sim.clone(),
        None => panic!("No simulator interface installed on this thread."),
    })
}

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Relative time when registering, absolute time when reacting.
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

pub trait SimIf {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimpleResult<()>;
    fn get_value(&self, obj: &SimObject) -> SimpleResult<u32>;
    fn get_object_by_name(&self, name: &str) -> SimpleResult<SimObject>;
    fn get_root_object(&self) -> SimpleResult<SimObject>;
    fn get_full_name(&self, obj: &SimObject) -> SimpleResult<String>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log(&self, msg: &str);
    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()>;

    fn get_sim_time(&self, unit: &str) -> f64 {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        match time_scale(unit) {
            Ok(scale) => ldexp10(t, self.get_sim_precision() - scale),
            Err(_) => t,
        }
    }

    fn get_sim_steps(&self, time: f64, unit: &str) -> SimpleResult<u64> {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit)? - precision);
        if steps >= 0.0 && steps % 1.0 == 0.0 {
            Ok(steps as u64)
        } else {
            Err(TbError::TimeConversion(format!(
                "{} {} (sim precision: {})",
                time,
                unit,
                scale_time(precision).unwrap_or_else(|_| format!("1e{}", precision))
            )))
        }
    }
}

/// Drives the simulator event loop until no more events are pending.
pub trait SimRunner {
    fn run(&self);
}

/// Classifies a value change of a watched signal by its least significant bit.
pub fn edge_kind(old: u32, new: u32) -> EdgeKind {
    match (old & 1, new & 1) {
        (0, 1) => EdgeKind::Rising,
        (1, 0) => EdgeKind::Falling,
        _ => EdgeKind::Any,
    }
}

pub(crate) fn time_scale(unit: &str) -> SimpleResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(TbError::TimeUnit(unit.to_string())),
    }
}

fn scale_time(unit: i8) -> SimpleResult<String> {
    match unit {
        -15 => Ok("fs".to_string()),
        -12 => Ok("ps".to_string()),
        -9 => Ok("ns".to_string()),
        -6 => Ok("us".to_string()),
        -3 => Ok("ms".to_string()),
        0 => Ok("sec".to_string()),
        _ => Err(TbError::TimeUnit(format!("1e{}", unit))),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_between_units() {
        assert_eq!(ldexp10(5.0, 6), 5_000_000.0);
        assert_eq!(ldexp10(5_000.0, -3), 5.0);
        assert_eq!(time_scale("us"), Ok(-6));
        assert!(matches!(time_scale("parsec"), Err(TbError::TimeUnit(_))));
    }

    #[test]
    fn classifies_edges() {
        assert_eq!(edge_kind(0, 1), EdgeKind::Rising);
        assert_eq!(edge_kind(1, 0), EdgeKind::Falling);
        assert_eq!(edge_kind(0b10, 0b100), EdgeKind::Any);
    }
}

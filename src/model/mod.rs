//! In-process event-driven simulator for a single peripheral model.
//!
//! The design under test is a [`Device`] sampled on every rising edge of `clk`. Pins
//! are exposed under the root scope `dut` with the same names and widths as the
//! top-level ports of an HDL peripheral, so tests run unchanged against either backend.

mod device;
mod status_target;

pub use device::{Device, DeviceInputs, DeviceOutputs};
pub use status_target::{StatusTarget, TargetState};

use intmap::IntMap;
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::bus::{CLK, ENA, RST_N, UIO_IN, UIO_OE, UIO_OUT, UI_IN, UO_OUT};
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::{edge_kind, SimCallback, SimIf, SimRunner};
use crate::trigger::{self, EdgeKind};
use crate::{SimpleResult, TbError};

pub const ROOT: &str = "dut";

// (name, width); the handle of a port is its index + 1, handle 0 is the root scope
const PORTS: [(&str, u32); 8] = [
    (CLK, 1),
    (RST_N, 1),
    (ENA, 1),
    (UI_IN, 8),
    (UIO_IN, 8),
    (UO_OUT, 8),
    (UIO_OUT, 8),
    (UIO_OE, 8),
];

// indices into PORTS
const CLK_IDX: usize = 0;
const RST_N_IDX: usize = 1;
const ENA_IDX: usize = 2;
const UI_IN_IDX: usize = 3;
const UIO_IN_IDX: usize = 4;
const UO_OUT_IDX: usize = 5;
const UIO_OUT_IDX: usize = 6;
const UIO_OE_IDX: usize = 7;

const MAX_DELTAS: usize = 1000;
const DEFAULT_TIME_LIMIT: u64 = 100_000_000_000; // 100 ms

#[derive(Clone, Copy, Debug)]
enum CbKind {
    Time(u64),
    Edge,
    ReadWrite,
    ReadOnly,
}

#[derive(Clone, Copy, Debug)]
struct EdgeWatch {
    sig_hdl: usize,
    last: u32,
}

struct ModelState {
    time: u64,
    time_limit: u64,
    values: [u32; PORTS.len()],
    last_clk: u32,
    next_cb: usize,
    callbacks: IntMap<CbKind>,
    timers: BTreeMap<u64, Vec<usize>>,
    edges: BTreeMap<usize, EdgeWatch>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    trace: Vec<(u64, usize, u32)>,
    device: Box<dyn Device>,
}

impl ModelState {
    fn write(&mut self, idx: usize, value: u32) {
        if self.values[idx] != value {
            self.values[idx] = value;
            self.trace.push((self.time, idx, value));
        }
    }

    fn new_cb(&mut self, kind: CbKind) -> usize {
        let cb_hdl = self.next_cb;
        self.next_cb += 1;
        self.callbacks.insert(cb_hdl as u64, kind);
        cb_hdl
    }

    /// Clocks the device if `clk` rose since the last evaluation.
    fn evaluate(&mut self) {
        let clk = self.values[CLK_IDX];
        let rose = self.last_clk & 1 == 0 && clk & 1 == 1;
        self.last_clk = clk;
        if !rose {
            return;
        }
        let inputs = DeviceInputs {
            rst_n: self.values[RST_N_IDX] & 1 == 1,
            ena: self.values[ENA_IDX] & 1 == 1,
            ui_in: self.values[UI_IN_IDX] as u8,
            uio_in: self.values[UIO_IN_IDX] as u8,
        };
        let out = self.device.rising_edge(inputs);
        self.write(UO_OUT_IDX, u32::from(out.uo_out));
        self.write(UIO_OUT_IDX, u32::from(out.uio_out));
        self.write(UIO_OE_IDX, u32::from(out.uio_oe));
    }

    /// Edge watches whose signal changed since they last fired.
    fn changed_edges(&mut self) -> Vec<(usize, usize, EdgeKind)> {
        let values = self.values;
        self.edges
            .iter_mut()
            .filter_map(|(cb_hdl, watch)| {
                let now = values[watch.sig_hdl - 1];
                if now == watch.last {
                    return None;
                }
                let kind = edge_kind(watch.last, now);
                watch.last = now;
                Some((*cb_hdl, watch.sig_hdl, kind))
            })
            .collect()
    }
}

/// Simulator backend running a [`Device`] model in-process.
pub struct ModelSim {
    state: RefCell<ModelState>,
}

impl ModelSim {
    pub fn new(device: impl Device + 'static) -> Self {
        ModelSim {
            state: RefCell::new(ModelState {
                time: 0,
                time_limit: DEFAULT_TIME_LIMIT,
                values: [0; PORTS.len()],
                last_clk: 0,
                next_cb: 1,
                callbacks: IntMap::new(),
                timers: BTreeMap::new(),
                edges: BTreeMap::new(),
                read_write: None,
                read_only: None,
                trace: Vec::new(),
                device: Box::new(device),
            }),
        }
    }

    /// Stops the run at `steps` (picoseconds) even if timers are still pending.
    pub fn with_time_limit(self, steps: u64) -> Self {
        self.state.borrow_mut().time_limit = steps;
        self
    }

    /// Value changes of pin `port` as `(time in steps, new value)`, oldest first.
    pub fn changes(&self, port: &str) -> Vec<(u64, u32)> {
        let Some(idx) = PORTS.iter().position(|(n, _)| *n == port) else {
            return Vec::new();
        };
        self.state
            .borrow()
            .trace
            .iter()
            .filter(|(_, i, _)| *i == idx)
            .map(|(t, _, v)| (*t, *v))
            .collect()
    }

    /// Current value of pin `port`.
    pub fn value(&self, port: &str) -> Option<u32> {
        let idx = PORTS.iter().position(|(n, _)| *n == port)?;
        Some(self.state.borrow().values[idx])
    }

    fn port(&self, obj: &SimObject) -> SimpleResult<(usize, u32)> {
        match PORTS.get(obj.handle.wrapping_sub(1)) {
            Some((_, width)) => Ok((obj.handle - 1, *width)),
            None => Err(TbError::NotAValue(self.get_full_name(obj)?)),
        }
    }

    fn pending_time(&self) -> Option<(u64, Vec<usize>)> {
        let mut s = self.state.borrow_mut();
        let (&t, _) = s.timers.first_key_value()?;
        if t > s.time_limit {
            return None;
        }
        let handles = s.timers.remove(&t).unwrap_or_default();
        s.time = t;
        Some((t, handles))
    }

    /// Removes `cb_hdl` if it is still registered; one-shot callbacks fire at most once.
    fn consume(&self, cb_hdl: usize) -> bool {
        self.state.borrow_mut().callbacks.remove(cb_hdl as u64).is_some()
    }

    fn take_read_write(&self) -> Option<usize> {
        let cb_hdl = self.state.borrow_mut().read_write.take()?;
        self.consume(cb_hdl).then_some(cb_hdl)
    }

    fn take_read_only(&self) -> Option<usize> {
        let cb_hdl = self.state.borrow_mut().read_only.take()?;
        self.consume(cb_hdl).then_some(cb_hdl)
    }

    /// Runs delta cycles at the current time until nothing changes any more.
    fn settle(&self) {
        let mut deltas = 0;
        loop {
            let edges = {
                let mut s = self.state.borrow_mut();
                s.evaluate();
                s.changed_edges()
            };
            let read_write = if edges.is_empty() { self.take_read_write() } else { None };
            if edges.is_empty() && read_write.is_none() {
                match self.take_read_only() {
                    Some(_) => trigger::react(SimCallback::ReadOnly, None),
                    None => return,
                }
            }
            for (cb_hdl, sig_hdl, kind) in edges {
                // a task woken earlier in this delta may have cancelled the watch
                let registered = self.state.borrow().edges.contains_key(&cb_hdl);
                if registered {
                    trigger::react(SimCallback::Edge(sig_hdl), Some(kind));
                }
            }
            if read_write.is_some() {
                trigger::react(SimCallback::ReadWrite, None);
            }
            deltas += 1;
            if deltas >= MAX_DELTAS {
                tracing::warn!(
                    time = self.get_sim_time_steps(),
                    "no convergence after {} delta cycles",
                    MAX_DELTAS
                );
                return;
            }
        }
    }
}

impl SimRunner for ModelSim {
    fn run(&self) {
        self.settle();
        while let Some((t, handles)) = self.pending_time() {
            for cb_hdl in handles {
                if self.consume(cb_hdl) {
                    trigger::react(SimCallback::Time(t), None);
                }
            }
            self.settle();
        }
        let s = self.state.borrow();
        if !s.timers.is_empty() {
            tracing::warn!(
                time = s.time,
                limit = s.time_limit,
                "simulation stopped at time limit with timers pending"
            );
        }
    }
}

impl SimIf for ModelSim {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimpleResult<()> {
        let (idx, width) = self.port(obj)?;
        if width < 32 && value >> width != 0 {
            return Err(TbError::Width {
                name: self.get_full_name(obj)?,
                value,
                width,
            });
        }
        self.state.borrow_mut().write(idx, value);
        Ok(())
    }

    fn get_value(&self, obj: &SimObject) -> SimpleResult<u32> {
        let (idx, _) = self.port(obj)?;
        Ok(self.state.borrow().values[idx])
    }

    fn get_object_by_name(&self, name: &str) -> SimpleResult<SimObject> {
        if name == ROOT {
            return self.get_root_object();
        }
        name.strip_prefix(ROOT)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|port| PORTS.iter().position(|(n, _)| *n == port))
            .map(|idx| SimObject::new(idx + 1, ObjectKind::Int(PORTS[idx].1)))
            .ok_or_else(|| TbError::NoSuchObject(name.to_string()))
    }

    fn get_root_object(&self) -> SimpleResult<SimObject> {
        Ok(SimObject::new(0, ObjectKind::Hier))
    }

    fn get_full_name(&self, obj: &SimObject) -> SimpleResult<String> {
        match obj.handle {
            0 => Ok(ROOT.to_string()),
            hdl => PORTS
                .get(hdl - 1)
                .map(|(n, _)| format!("{}.{}", ROOT, n))
                .ok_or_else(|| TbError::NoSuchObject(format!("handle {}", hdl))),
        }
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.state.borrow().time
    }

    fn get_sim_precision(&self) -> i8 {
        -12
    }

    fn log(&self, msg: &str) {
        tracing::info!(sim_time_ns = self.get_sim_time("ns"), "{}", msg);
    }

    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize> {
        let mut s = self.state.borrow_mut();
        let cb_hdl = match cb {
            SimCallback::Time(t) => {
                let t_abs = s.time + t;
                let cb_hdl = s.new_cb(CbKind::Time(t_abs));
                s.timers.entry(t_abs).or_default().push(cb_hdl);
                cb_hdl
            }
            SimCallback::Edge(sig_hdl) => {
                let last = match sig_hdl.checked_sub(1).and_then(|i| s.values.get(i)) {
                    Some(v) => *v,
                    None => return Err(TbError::NoSuchObject(format!("handle {}", sig_hdl))),
                };
                let cb_hdl = s.new_cb(CbKind::Edge);
                s.edges.insert(cb_hdl, EdgeWatch { sig_hdl, last });
                cb_hdl
            }
            SimCallback::ReadWrite => match s.read_write {
                Some(cb_hdl) => cb_hdl,
                None => {
                    let cb_hdl = s.new_cb(CbKind::ReadWrite);
                    s.read_write = Some(cb_hdl);
                    cb_hdl
                }
            },
            SimCallback::ReadOnly => match s.read_only {
                Some(cb_hdl) => cb_hdl,
                None => {
                    let cb_hdl = s.new_cb(CbKind::ReadOnly);
                    s.read_only = Some(cb_hdl);
                    cb_hdl
                }
            },
        };
        Ok(cb_hdl)
    }

    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()> {
        let mut s = self.state.borrow_mut();
        match s.callbacks.remove(cb_hdl as u64) {
            Some(CbKind::Time(t_abs)) => {
                if let Some(handles) = s.timers.get_mut(&t_abs) {
                    handles.retain(|h| *h != cb_hdl);
                    if handles.is_empty() {
                        s.timers.remove(&t_abs);
                    }
                }
            }
            Some(CbKind::Edge) => {
                s.edges.remove(&cb_hdl);
            }
            Some(CbKind::ReadWrite) => s.read_write = None,
            Some(CbKind::ReadOnly) => s.read_only = None,
            None => return Err(TbError::Callback(cb_hdl)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Device for Echo {
        fn rising_edge(&mut self, inputs: DeviceInputs) -> DeviceOutputs {
            DeviceOutputs {
                uo_out: inputs.ui_in,
                uio_out: inputs.uio_in,
                uio_oe: 0xff,
            }
        }
    }

    fn pin(sim: &ModelSim, name: &str) -> SimObject {
        sim.get_object_by_name(&format!("dut.{}", name))
            .expect("port exists")
    }

    #[test]
    fn port_indices_match_the_port_table() {
        let named = [
            (CLK_IDX, CLK),
            (RST_N_IDX, RST_N),
            (ENA_IDX, ENA),
            (UI_IN_IDX, UI_IN),
            (UIO_IN_IDX, UIO_IN),
            (UO_OUT_IDX, UO_OUT),
            (UIO_OUT_IDX, UIO_OUT),
            (UIO_OE_IDX, UIO_OE),
        ];
        for (idx, name) in named {
            assert_eq!(PORTS[idx].0, name);
        }
    }

    #[test]
    fn ports_resolve_by_full_name() {
        let sim = ModelSim::new(Echo);
        let uio_in = pin(&sim, UIO_IN);
        assert_eq!(uio_in.kind(), ObjectKind::Int(8));
        assert_eq!(sim.get_full_name(&uio_in), Ok("dut.uio_in".to_string()));
        assert_eq!(sim.get_root_object().map(|r| r.kind()), Ok(ObjectKind::Hier));
        assert!(matches!(
            sim.get_object_by_name("dut.sda"),
            Err(TbError::NoSuchObject(_))
        ));
    }

    #[test]
    fn rejects_values_wider_than_the_port() {
        let sim = ModelSim::new(Echo);
        let clk = pin(&sim, CLK);
        assert!(matches!(sim.set_value(&clk, 2), Err(TbError::Width { width: 1, .. })));
        let root = sim.get_root_object().expect("root");
        assert!(matches!(sim.get_value(&root), Err(TbError::NotAValue(_))));
    }

    #[test]
    fn device_samples_on_rising_clock_only() {
        let sim = ModelSim::new(Echo);
        sim.set_value(&pin(&sim, UI_IN), 0x5a).expect("write");
        sim.settle();
        assert_eq!(sim.value(UO_OUT), Some(0));
        sim.set_value(&pin(&sim, CLK), 1).expect("write");
        sim.settle();
        assert_eq!(sim.value(UO_OUT), Some(0x5a));
        sim.set_value(&pin(&sim, UI_IN), 0x11).expect("write");
        sim.settle();
        assert_eq!(sim.value(UO_OUT), Some(0x5a));
    }

    #[test]
    fn cancelled_timers_are_not_pending() {
        let sim = ModelSim::new(Echo);
        let a = sim.register_callback(SimCallback::Time(10)).expect("timer");
        let b = sim.register_callback(SimCallback::Time(10)).expect("timer");
        sim.cancel_callback(a).expect("cancel");
        assert_eq!(sim.cancel_callback(a), Err(TbError::Callback(a)));
        assert_eq!(sim.pending_time(), Some((10, vec![b])));
        assert_eq!(sim.get_sim_time_steps(), 10);
    }

    #[test]
    fn trace_records_changes_only() {
        let sim = ModelSim::new(Echo);
        let uio_in = pin(&sim, UIO_IN);
        sim.set_value(&uio_in, 0).expect("write");
        sim.set_value(&uio_in, 0b100).expect("write");
        sim.set_value(&uio_in, 0b100).expect("write");
        assert_eq!(sim.changes(UIO_IN), vec![(0, 0b100)]);
        assert!(sim.changes("nope").is_empty());
    }
}

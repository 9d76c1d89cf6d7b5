use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::{
    signal::SimObject,
    sim_if::{sim_if, SimCallback},
    SimpleResult,
};

// IntMap specializes on u64 keys and doesn't actually need to calculate a hash
struct TriggerState {
    // key is signal handle
    edges: IntMap<CallbackHandles>,
    // key is absolute callback time
    timers: IntMap<CallbackHandles>,
    read_only: CallbackHandles,
    read_write: CallbackHandles,
}

thread_local! {
    static TRIGGERS: RefCell<TriggerState> = RefCell::new(TriggerState {
        edges: IntMap::new(),
        timers: IntMap::new(),
        read_only: CallbackHandles::default(),
        read_write: CallbackHandles::default(),
    });
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

impl CallbackHandles {
    fn with(handle: usize, shared: TrigShared) -> Self {
        let mut callbacks = VecDeque::new();
        callbacks.push_back(shared);
        CallbackHandles {
            handle: Some(handle),
            callbacks,
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

/// Drops every pending trigger and cancels its simulator callback.
pub(crate) fn cancel_all_triggers() {
    let handles: Vec<usize> = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let mut handles = Vec::new();
        handles.extend(std::mem::take(&mut t.read_only).handle);
        handles.extend(std::mem::take(&mut t.read_write).handle);
        handles.extend(t.timers.drain().filter_map(|(_, cb)| cb.handle));
        handles.extend(t.edges.drain().filter_map(|(_, cb)| cb.handle));
        handles
    });
    if handles.is_empty() {
        return;
    }
    let sim = sim_if();
    for handle in handles {
        if let Err(e) = sim.cancel_callback(handle) {
            sim.log(&format!("Warning: {}", e));
        }
    }
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    // If trigger is an edge, the react method needs to know if it is a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
}

#[derive(Clone, Copy, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
}

/// A single simulator event to await. Resolves once; errors if the simulator
/// refuses the callback.
#[derive(Clone, Debug)]
pub struct Trigger {
    kind: TrigKind,
    awaited: bool,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger {
            kind,
            awaited: false,
        }
    }
    pub fn timer(time: u64, unit: &str) -> SimpleResult<Self> {
        Ok(Trigger::timer_steps(
            sim_if().get_sim_steps(time as f64, unit)?,
        ))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub async fn timer_ro(time: u64, unit: &str) -> SimpleResult<()> {
        Trigger::timer(time, unit)?.await?;
        Trigger::read_only().await
    }
    pub async fn timer_rw(time: u64, unit: &str) -> SimpleResult<()> {
        Trigger::timer(time, unit)?.await?;
        Trigger::read_write().await
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }
}

impl Future for Trigger {
    type Output = SimpleResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Trigger must only be awaited once, so the second time it is polled it must be because
        // the waker signaled its completion.
        if self.awaited {
            return Poll::Ready(Ok(()));
        }
        self.awaited = true;
        let mut shared = TrigShared {
            waker: cx.waker().clone(),
            edge_kind: EdgeKind::Any,
        };
        let kind = self.kind;
        let registered: SimpleResult<()> = TRIGGERS.with(|t| {
            let mut t = t.borrow_mut();
            match kind {
                TrigKind::ReadWrite => {
                    t.read_write.callbacks.push_back(shared);
                    if t.read_write.handle.is_none() {
                        t.read_write.handle = Some(sim_if().register_callback(SimCallback::ReadWrite)?);
                    }
                }
                TrigKind::ReadOnly => {
                    t.read_only.callbacks.push_back(shared);
                    if t.read_only.handle.is_none() {
                        t.read_only.handle = Some(sim_if().register_callback(SimCallback::ReadOnly)?);
                    }
                }
                TrigKind::Timer(steps) => {
                    // simulator reacts with absolute time, not delta
                    let sim = sim_if();
                    let abs_time = steps + sim.get_sim_time_steps();
                    if let Some(callbacks) = t.timers.get_mut(abs_time) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle = sim.register_callback(SimCallback::Time(steps))?;
                        t.timers.insert(abs_time, CallbackHandles::with(handle, shared));
                    }
                }
                TrigKind::Edge(sig_hdl, edge_kind) => {
                    shared.edge_kind = edge_kind;
                    if let Some(callbacks) = t.edges.get_mut(sig_hdl as u64) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle = sim_if().register_callback(SimCallback::Edge(sig_hdl))?;
                        t.edges.insert(sig_hdl as u64, CallbackHandles::with(handle, shared));
                    }
                }
            }
            Ok(())
        });
        match registered {
            Ok(()) => Poll::Pending,
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

/// Wakes every trigger waiting on `cb` and runs the woken tasks.
///
/// Callbacks nobody waits for any more (e.g. after a test tear-down) are ignored.
#[inline]
pub fn react(cb: SimCallback, edge: Option<EdgeKind>) {
    let (wake, cancel) = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let mut cancel = None;
        let wake = match cb {
            SimCallback::ReadWrite => {
                // handle is consumed, since CB is now done
                std::mem::take(&mut t.read_write).callbacks
            }
            SimCallback::ReadOnly => std::mem::take(&mut t.read_only).callbacks,
            SimCallback::Time(abs_time) => t
                .timers
                .remove(abs_time)
                .map(|cb| cb.callbacks)
                .unwrap_or_default(),
            SimCallback::Edge(sig_hdl) => match t.edges.remove(sig_hdl as u64) {
                Some(mut callbacks) => {
                    let edge = edge.unwrap_or(EdgeKind::Any);
                    let (wake, resched): (VecDeque<TrigShared>, VecDeque<TrigShared>) =
                        callbacks.callbacks.drain(..).partition(|trig| {
                            edge == EdgeKind::Any
                                || trig.edge_kind == EdgeKind::Any
                                || trig.edge_kind == edge
                        });
                    if resched.is_empty() {
                        // no triggers are remaining, cancel the value change callback
                        cancel = callbacks.handle;
                    } else {
                        callbacks.callbacks = resched;
                        t.edges.insert(sig_hdl as u64, callbacks);
                    }
                    wake
                }
                None => VecDeque::new(),
            },
        };
        (wake, cancel)
    });

    if let Some(handle) = cancel {
        let sim = sim_if();
        if let Err(e) = sim.cancel_callback(handle) {
            sim.log(&format!("Warning: {}", e));
        }
    }
    if !wake.is_empty() {
        for shared in wake {
            shared.waker.wake();
        }
        // execute woken tasks
        executor::run_once();
    }
}

use crate::sim_if::sim_if;
use crate::trigger::Trigger;
use crate::SimpleResult;

/// Handle to an object of the simulated design: a scope or a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Integer/bit-vector signal of the given width.
    Int(u32),
    Hier,
}

impl SimObject {
    pub fn new(handle: usize, kind: ObjectKind) -> Self {
        SimObject { handle, kind }
    }

    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> SimpleResult<String> {
        sim_if().get_full_name(self)
    }

    pub fn size(&self) -> Option<u32> {
        match self.kind {
            ObjectKind::Int(size) => Some(size),
            _ => None,
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self.kind, ObjectKind::Int(_))
    }

    pub fn from_name(full_name: &str) -> SimpleResult<Self> {
        sim_if().get_object_by_name(full_name)
    }

    pub fn get_root() -> SimpleResult<Self> {
        sim_if().get_root_object()
    }

    /// Child object `name` of this scope.
    pub fn c(&self, name: &str) -> SimpleResult<Self> {
        let mut child_name = self.name()?;
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    pub fn u32(&self) -> SimpleResult<u32> {
        sim_if().get_value(self)
    }

    pub fn set(&self, val: u32) -> SimpleResult<()> {
        sim_if().set_value(self, val)
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) -> SimpleResult<()> {
        self.rising_edge().await?;
        Trigger::read_only().await
    }
    pub async fn rising_edge_rw(self) -> SimpleResult<()> {
        self.rising_edge().await?;
        Trigger::read_write().await
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::{ObjectKind, SimObject};
pub use crate::sim_if::{sim_if, SimIf};
pub use crate::trigger::{EdgeKind, Trigger};
pub use crate::utils;
pub use crate::value::Val;
pub use crate::{fail_test, pass_test, sim_log, SimpleResult, TbError, TbResult};
pub use futures::future::FutureExt;

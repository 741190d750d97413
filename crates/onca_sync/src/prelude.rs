pub use crate::sync::{Gate, GateTarget, LockOptions, LockState, Once, OnceState, ThreadEvent, UnfairLock};
pub use crate::sys::{get_thread_id, ThreadId};

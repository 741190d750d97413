//! Thread identity, memory barriers and the priority override hook.

mod arch;
mod qos;
mod thread_id;

pub use arch::maximally_synchronizing_barrier;
pub use qos::{set_priority_override, PriorityBoost, PriorityOverride};
pub use thread_id::{get_thread_id, ThreadId};

//! Synchronization primitives built on a single 32-bit word.
//!
//! - [`UnfairLock`], for mutual exclusion.
//! - [`Gate`], to release a group of threads when one thread publishes a value.
//! - [`Once`], for exactly-once initialization.
//! - [`ThreadEvent`], a one-shot signal between two threads.
//!
//! None of these allocate, and none of them return errors: misuse, like locking recursively or unlocking a lock owned by another thread, panics.

mod lock_word;
mod semaphore;
mod thread_event;
mod unfair_lock;
mod gate;
mod once;

pub mod thread_parker;

pub use lock_word::LockState;
pub use semaphore::OsSemaphore;
pub use thread_event::ThreadEvent;
pub use unfair_lock::UnfairLock;
pub use gate::{Gate, GateTarget};
pub use once::{Once, OnceState};
pub use thread_parker::LockOptions;

use static_assertions::{assert_eq_size, assert_impl_all, assert_not_impl_any};

assert_eq_size!(UnfairLock, u32);
assert_eq_size!(Gate, u32);
assert_impl_all!(UnfairLock: Send, Sync);
assert_impl_all!(Gate: Send, Sync);
assert_impl_all!(Once: Send, Sync);
assert_impl_all!(ThreadEvent: Send, Sync);
// Waiters park on the address of the word, so a copy could never be woken
assert_not_impl_any!(UnfairLock: Clone, Copy);
assert_not_impl_any!(Gate: Clone, Copy);
assert_not_impl_any!(ThreadEvent: Clone, Copy);

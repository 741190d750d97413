//! Low-level synchronization primitives for the onca runtime.
//!
//! Everything in this crate is built from a single 32-bit word and the operating system's address-wait facility:
//!
//! - [`sync::UnfairLock`]: a word-sized mutex that boosts its owner while others wait.
//! - [`sync::Gate`]: a word that many threads can wait on until its owner publishes a value, after which all of them are released together.
//! - [`sync::Once`]: exactly-once initialization built on top of a gate.
//! - [`sync::ThreadEvent`]: a one-shot signal between exactly two threads.
//!
//! The backend used to block threads is selected at build time, see [`sync::thread_parker`].

mod crash;
mod os;

pub mod sys;
pub mod sync;

pub mod prelude;

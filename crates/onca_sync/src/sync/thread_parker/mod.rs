//! Blocking a thread on the value of a 32-bit word.
//!
//! # Address parking
//!
//! Every primitive in this crate keeps its whole state in a single [`AtomicU32`] and only needs two operations from the OS:
//!
//! - *Parking* blocks the calling thread for as long as the word still holds an expected value.
//!   The comparison and the decision to sleep happen atomically with respect to wakes, so a wake issued after the value changed is never lost.
//! - *Unparking* wakes one, or all, threads parked on the address of a word.
//!
//! Wakes are only delivered to threads that already entered the wait, and parks may return spuriously,
//! so callers must always re-check their condition in a loop.
//!
//! # Backends
//!
//! The backend is selected when the crate is built, there is no runtime dispatch:
//!
//! | Backend | Targets | Park | Unpark |
//! |---|---|---|---|
//! | [`Backend::Futex`] | linux, android | `FUTEX_WAIT` | `FUTEX_WAKE` |
//! | [`Backend::CompareAndWait`] | apple, windows | `__ulock_wait`, `WaitOnAddress` | `__ulock_wake`, `WakeByAddress*` |
//! | [`Backend::Fallback`] | everything else, or the `fallback_backend` feature | spin, then `thread_switch` polling | no-op |

use core::{
    sync::atomic::AtomicU32,
    time::Duration,
};

use bitflags::bitflags;
use cfg_if::cfg_if;

#[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple", windows))]
mod address;
mod spin_wait;

pub use self::spin_wait::{SpinPark, SpinWait, SwitchBackoff};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::address::FutexPark;
#[cfg(any(target_vendor = "apple", windows))]
pub use self::address::CompareAndWaitPark;

bitflags! {
    /// Options for a blocking operation.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct LockOptions : u32 {
        /// The caller is waiting for data to be produced rather than for a lock to be released.
        ///
        /// Selects a different priority depress policy while backing off, on platforms that have one.
        const DATA_CONTENTION = 0x0001_0000;
    }
}

/// Result of a [`AddressPark::park`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParkResult {
    /// Woken up, the value may have changed, or the park may have been spurious.
    Woken,
    /// Woken up, and the kernel reported that no other thread is parked on the word.
    WokenNoWaiters,
    /// The timeout elapsed.
    TimedOut,
}

impl ParkResult {
    #[inline]
    pub fn is_timed_out(self) -> bool {
        self == ParkResult::TimedOut
    }
}

/// Address park backend.
pub trait AddressPark {
    /// Block the current thread while `word` holds `expected`.
    ///
    /// Returns immediately when the value already differs.
    fn park(word: &AtomicU32, expected: u32, options: LockOptions, timeout: Option<Duration>) -> ParkResult;

    /// Wake at most one thread parked on `word`.
    ///
    /// `word` is only used as a key and is never dereferenced.
    fn unpark_one(word: *const AtomicU32);

    /// Wake all threads parked on `word`.
    ///
    /// `word` is only used as a key and is never dereferenced.
    fn unpark_all(word: *const AtomicU32);
}

/// Address park backend selected at build time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Backend {
    /// Linux futexes.
    Futex,
    /// A kernel compare-and-wait facility: `__ulock_wait` on apple targets, `WaitOnAddress` on windows.
    CompareAndWait,
    /// Spinning and polling, without true blocking.
    Fallback,
}

cfg_if! {
    if #[cfg(all(dlock_backend = "futex", any(target_os = "linux", target_os = "android")))] {
        /// Address park backend used by the primitives in this crate.
        pub type DefaultPark = FutexPark;
        /// Backend used by [`DefaultPark`].
        pub const BACKEND : Backend = Backend::Futex;
    } else if #[cfg(all(dlock_backend = "compare_and_wait", any(target_vendor = "apple", windows)))] {
        /// Address park backend used by the primitives in this crate.
        pub type DefaultPark = CompareAndWaitPark;
        /// Backend used by [`DefaultPark`].
        pub const BACKEND : Backend = Backend::CompareAndWait;
    } else {
        /// Address park backend used by the primitives in this crate.
        pub type DefaultPark = SpinPark;
        /// Backend used by [`DefaultPark`].
        pub const BACKEND : Backend = Backend::Fallback;
    }
}

/// Block while `word` holds `value`.
///
/// This may return spuriously, the caller must re-check the word.
#[inline]
pub fn wait_on_address(word: &AtomicU32, value: u32, options: LockOptions) {
    DefaultPark::park(word, value, options, None);
}

/// Wake all threads blocked in [`wait_on_address`] on `word`.
#[inline]
pub fn wake_by_address(word: &AtomicU32) {
    DefaultPark::unpark_all(word);
}

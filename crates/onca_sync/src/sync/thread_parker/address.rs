//! Kernel address-wait backends.

use core::{
    sync::atomic::AtomicU32,
    time::Duration,
};

use super::{AddressPark, LockOptions, ParkResult};

/// `FUTEX_WAIT`/`FUTEX_WAKE` on the process-private futex hash.
///
/// Linux does not report whether other waiters remain, so a park never returns [`ParkResult::WokenNoWaiters`].
#[cfg(any(target_os = "linux", target_os = "android"))]
pub struct FutexPark;

#[cfg(any(target_os = "linux", target_os = "android"))]
impl AddressPark for FutexPark {
    #[inline]
    fn park(word: &AtomicU32, expected: u32, options: LockOptions, timeout: Option<Duration>) -> ParkResult {
        crate::os::sync::address_wait(word, expected, options, timeout)
    }

    #[inline]
    fn unpark_one(word: *const AtomicU32) {
        crate::os::sync::address_wake(word, false);
    }

    #[inline]
    fn unpark_all(word: *const AtomicU32) {
        crate::os::sync::address_wake(word, true);
    }
}

/// `__ulock_wait(UL_COMPARE_AND_WAIT)` on apple targets, `WaitOnAddress` on windows.
#[cfg(any(target_vendor = "apple", windows))]
pub struct CompareAndWaitPark;

#[cfg(any(target_vendor = "apple", windows))]
impl AddressPark for CompareAndWaitPark {
    #[inline]
    fn park(word: &AtomicU32, expected: u32, options: LockOptions, timeout: Option<Duration>) -> ParkResult {
        crate::os::sync::address_wait(word, expected, options, timeout)
    }

    #[inline]
    fn unpark_one(word: *const AtomicU32) {
        crate::os::sync::address_wake(word, false);
    }

    #[inline]
    fn unpark_all(word: *const AtomicU32) {
        crate::os::sync::address_wake(word, true);
    }
}

use core::{
    mem,
    ptr,
    sync::atomic::AtomicU32,
    time::Duration,
};

use crate::{
    crash,
    os::unix::errno,
    sync::{thread_parker::ParkResult, LockOptions},
};

pub use crate::os::unix::sync::*;

//-----------------------------------------------------------------------------------------------------------------------------

/// Block while `*word == expected`, until woken or until `timeout` elapses.
///
/// Uses `FUTEX_WAIT` on the process-private futex hash, the kernel compares the value under its own lock.
pub fn address_wait(word: &AtomicU32, expected: u32, _options: LockOptions, timeout: Option<Duration>) -> ParkResult {
    let ts = timeout.map(|timeout| {
        let mut ts : libc::timespec = unsafe { mem::zeroed() };
        ts.tv_sec = timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t;
        ts.tv_nsec = timeout.subsec_nanos() as _;
        ts
    });
    let ts_ptr = ts.as_ref().map_or(ptr::null(), |ts| ts as *const libc::timespec);

    loop {
        let res = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word as *const AtomicU32,
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                expected,
                ts_ptr,
            )
        };
        if res == 0 {
            return ParkResult::Woken;
        }

        match errno() {
            libc::EINTR => continue,
            // The value already changed
            libc::EAGAIN => return ParkResult::Woken,
            libc::ETIMEDOUT => return ParkResult::TimedOut,
            err => crash::internal_crash(err as i64, "futex_wait() failed"),
        }
    }
}

/// Wake one, or all, threads blocked in `address_wait` on `word`.
///
/// `word` is only used as a key and is never dereferenced, so it may already be freed.
pub fn address_wake(word: *const AtomicU32, all: bool) {
    let count = if all { i32::MAX } else { 1 };
    loop {
        let res = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word,
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
            )
        };
        if res >= 0 {
            return;
        }

        match errno() {
            libc::EINTR => continue,
            err => crash::internal_crash(err as i64, "futex_wake() failed"),
        }
    }
}

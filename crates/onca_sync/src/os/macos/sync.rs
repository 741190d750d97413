use core::{
    ffi::{c_int, c_uint, c_void},
    sync::atomic::AtomicU32,
    time::Duration,
};
use std::time::Instant;

use crate::{
    crash,
    os::unix::errno,
    sync::{thread_parker::ParkResult, LockOptions},
};

pub use crate::os::unix::sync::thread_yield;

#[allow(non_camel_case_types)]
type kern_return_t = c_int;
#[allow(non_camel_case_types)]
type mach_port_t = u32;

#[repr(C)]
#[allow(non_camel_case_types)]
struct mach_timespec_t {
    tv_sec  : c_uint,
    tv_nsec : c_int,
}

const KERN_SUCCESS             : kern_return_t = 0;
const KERN_RESOURCE_SHORTAGE   : kern_return_t = 6;
const KERN_ABORTED             : kern_return_t = 14;
const KERN_INVALID_NAME        : kern_return_t = 15;
const KERN_OPERATION_TIMED_OUT : kern_return_t = 49;

const MACH_PORT_NULL : mach_port_t = 0;
const SYNC_POLICY_FIFO : c_int = 0;

const SWITCH_OPTION_DEPRESS        : c_int = 1;
const SWITCH_OPTION_OSLOCK_DEPRESS : c_int = 4;

const UL_COMPARE_AND_WAIT : u32 = 1;
const ULF_WAKE_ALL        : u32 = 0x0000_0100;

extern "C" {
    static mach_task_self_ : mach_port_t;

    #[link_name = "semaphore_create"]
    fn mach_semaphore_create(task: mach_port_t, semaphore: *mut mach_port_t, policy: c_int, value: c_int) -> kern_return_t;
    #[link_name = "semaphore_destroy"]
    fn mach_semaphore_destroy(task: mach_port_t, semaphore: mach_port_t) -> kern_return_t;
    #[link_name = "semaphore_signal"]
    fn mach_semaphore_signal(semaphore: mach_port_t) -> kern_return_t;
    #[link_name = "semaphore_wait"]
    fn mach_semaphore_wait(semaphore: mach_port_t) -> kern_return_t;
    #[link_name = "semaphore_timedwait"]
    fn mach_semaphore_timedwait(semaphore: mach_port_t, wait_time: mach_timespec_t) -> kern_return_t;

    #[link_name = "thread_switch"]
    fn mach_thread_switch(thread_name: mach_port_t, option: c_int, option_time: u32) -> kern_return_t;

    fn __ulock_wait(operation: u32, addr: *mut c_void, value: u64, timeout_us: u32) -> c_int;
    fn __ulock_wake(operation: u32, addr: *mut c_void, wake_value: u64) -> c_int;
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Depress the current thread's priority for at most `timeout`, letting the lock owner run. A zero timeout only yields.
///
/// `DATA_CONTENTION` selects the depress policy meant for threads spinning on data rather than on a lock.
pub fn thread_switch(timeout: Duration, options: LockOptions) {
    if timeout.is_zero() {
        thread_yield();
        return;
    }

    let option = if options.contains(LockOptions::DATA_CONTENTION) {
        SWITCH_OPTION_OSLOCK_DEPRESS
    } else {
        SWITCH_OPTION_DEPRESS
    };
    let ms = timeout.as_millis().clamp(1, u32::MAX as u128) as u32;
    unsafe { mach_thread_switch(MACH_PORT_NULL, option, ms) };
}

//-----------------------------------------------------------------------------------------------------------------------------

#[inline]
fn verify_semaphore_kr(kr: kern_return_t) {
    if kr == KERN_INVALID_NAME {
        crash::client_crash(kr as u64, "Use-after-free of a semaphore");
    } else if kr != KERN_SUCCESS {
        crash::internal_crash(kr as i64, "mach semaphore API failure");
    }
}

/// Whether a semaphore creation failure is caused by a temporary shortage of resources.
pub fn is_resource_shortage(err: i32) -> bool {
    err == KERN_RESOURCE_SHORTAGE
}

/// Create a FIFO mach semaphore with a count of 0, the handle is its port name.
pub fn semaphore_create() -> Result<usize, i32> {
    let mut sema : mach_port_t = MACH_PORT_NULL;
    let kr = unsafe { mach_semaphore_create(mach_task_self_, &mut sema, SYNC_POLICY_FIFO, 0) };
    if kr == KERN_SUCCESS { Ok(sema as usize) } else { Err(kr) }
}

/// Destroy a semaphore created with `semaphore_create`.
///
/// # Safety
///
/// `handle` must come from `semaphore_create` and must not be used afterwards.
pub unsafe fn semaphore_destroy(handle: usize) {
    verify_semaphore_kr(mach_semaphore_destroy(mach_task_self_, handle as mach_port_t));
}

/// Increment the semaphore, waking one waiter if there is one.
///
/// # Safety
///
/// `handle` must be a live handle from `semaphore_create`.
pub unsafe fn semaphore_signal(handle: usize) {
    verify_semaphore_kr(mach_semaphore_signal(handle as mach_port_t));
}

/// Wait until the semaphore can be decremented.
///
/// # Safety
///
/// `handle` must be a live handle from `semaphore_create`.
pub unsafe fn semaphore_wait(handle: usize) {
    let mut kr;
    loop {
        kr = mach_semaphore_wait(handle as mach_port_t);
        if kr != KERN_ABORTED {
            break;
        }
    }
    verify_semaphore_kr(kr);
}

/// Wait until the semaphore can be decremented, or until `timeout` elapses.
///
/// Returns `false` when the wait timed out.
///
/// # Safety
///
/// `handle` must be a live handle from `semaphore_create`.
pub unsafe fn semaphore_timed_wait(handle: usize, timeout: Duration) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    let mut remaining = timeout;
    loop {
        let wait_time = mach_timespec_t {
            tv_sec: remaining.as_secs().min(c_uint::MAX as u64) as c_uint,
            tv_nsec: remaining.subsec_nanos() as c_int,
        };
        let kr = mach_semaphore_timedwait(handle as mach_port_t, wait_time);
        match kr {
            KERN_OPERATION_TIMED_OUT => return false,
            // Interrupted, wait again for whatever is left
            KERN_ABORTED => remaining = deadline.map_or(remaining, |deadline| deadline.saturating_duration_since(Instant::now())),
            kr => {
                verify_semaphore_kr(kr);
                return true;
            },
        }
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Block while `*word == expected`, until woken or until `timeout` elapses.
///
/// A positive return value from the kernel means other threads are still waiting on the word,
/// zero means this was the last waiter, which is reported as `WokenNoWaiters`.
pub fn address_wait(word: &AtomicU32, expected: u32, options: LockOptions, timeout: Option<Duration>) -> ParkResult {
    let timeout_us = match timeout {
        // 0 means wait forever, so round a zero timeout up
        Some(timeout) => timeout.as_micros().clamp(1, u32::MAX as u128) as u32,
        None => 0,
    };
    let operation = UL_COMPARE_AND_WAIT | (options & LockOptions::DATA_CONTENTION).bits();

    loop {
        let rc = unsafe { __ulock_wait(operation, word as *const AtomicU32 as *mut c_void, expected as u64, timeout_us) };
        if rc > 0 {
            return ParkResult::Woken;
        } else if rc == 0 {
            return ParkResult::WokenNoWaiters;
        }

        match errno() {
            libc::EINTR => continue,
            libc::ETIMEDOUT => return ParkResult::TimedOut,
            // The page backing the word went away, the caller re-reads it
            libc::EFAULT => return ParkResult::Woken,
            err => crash::internal_crash(err as i64, "ulock_wait() failed"),
        }
    }
}

/// Wake one, or all, threads blocked in `address_wait` on `word`.
///
/// `word` is only used as a key and is never dereferenced, so it may already be freed.
pub fn address_wake(word: *const AtomicU32, all: bool) {
    let operation = UL_COMPARE_AND_WAIT | if all { ULF_WAKE_ALL } else { 0 };
    loop {
        let rc = unsafe { __ulock_wake(operation, word as *mut c_void, 0) };
        if rc >= 0 {
            return;
        }

        match errno() {
            libc::EINTR => continue,
            // Nobody was waiting
            libc::ENOENT => return,
            err => crash::internal_crash(err as i64, "ulock_wake() failed"),
        }
    }
}

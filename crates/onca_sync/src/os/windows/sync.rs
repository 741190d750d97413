use core::{
    ffi::c_void,
    mem,
    sync::atomic::AtomicU32,
    time::Duration,
};

use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::*,
        System::Threading::*,
    }
};

use crate::{
    crash,
    sync::{thread_parker::ParkResult, LockOptions},
};

const INFINITE : u32 = u32::MAX;

fn duration_to_ms(timeout: Duration) -> u32 {
    // Round up so short timeouts don't turn into busy polling, and never hit INFINITE
    let ms = timeout.as_nanos().div_ceil(1_000_000);
    ms.min((INFINITE - 1) as u128) as u32
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Yield the rest of the current timeslice to the OS
#[inline]
pub fn thread_yield() {
    unsafe {
        // We don't use SwitchToThread here because it doesn't consider all
        // threads in the system and the lock owner may not get selected.
        Sleep(0);
    }
}

/// Give up the processor for at most `timeout`, a zero timeout only yields.
#[inline]
pub fn thread_switch(timeout: Duration, _options: LockOptions) {
    if timeout.is_zero() {
        thread_yield();
    } else {
        unsafe { Sleep(duration_to_ms(timeout)) };
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Whether a semaphore creation failure is caused by a temporary shortage of resources.
pub fn is_resource_shortage(err: i32) -> bool {
    err == ERROR_NOT_ENOUGH_MEMORY.to_hresult().0 ||
    err == ERROR_OUTOFMEMORY.to_hresult().0 ||
    err == ERROR_NO_SYSTEM_RESOURCES.to_hresult().0
}

/// Create an unnamed semaphore with a count of 0, the handle is the raw `HANDLE`.
pub fn semaphore_create() -> Result<usize, i32> {
    let handle = unsafe { CreateSemaphoreW(None, 0, i32::MAX, PCWSTR::null()) };
    match handle {
        Ok(handle) => Ok(handle.0 as usize),
        Err(err) => Err(err.code().0),
    }
}

/// Destroy a semaphore created with `semaphore_create`.
///
/// # Safety
///
/// `handle` must come from `semaphore_create` and must not be used afterwards.
pub unsafe fn semaphore_destroy(handle: usize) {
    if let Err(err) = CloseHandle(HANDLE(handle as isize)) {
        crash::internal_crash(err.code().0 as i64, "CloseHandle() on a semaphore failed");
    }
}

/// Increment the semaphore, waking one waiter if there is one.
///
/// # Safety
///
/// `handle` must be a live handle from `semaphore_create`.
pub unsafe fn semaphore_signal(handle: usize) {
    if let Err(err) = ReleaseSemaphore(HANDLE(handle as isize), 1, None) {
        crash::internal_crash(err.code().0 as i64, "ReleaseSemaphore() failed");
    }
}

/// Wait until the semaphore can be decremented.
///
/// # Safety
///
/// `handle` must be a live handle from `semaphore_create`.
pub unsafe fn semaphore_wait(handle: usize) {
    let res = WaitForSingleObject(HANDLE(handle as isize), INFINITE);
    if res != WAIT_OBJECT_0 {
        crash::internal_crash(res.0 as i64, "WaitForSingleObject() on a semaphore failed");
    }
}

/// Wait until the semaphore can be decremented, or until `timeout` elapses.
///
/// Returns `false` when the wait timed out.
///
/// # Safety
///
/// `handle` must be a live handle from `semaphore_create`.
pub unsafe fn semaphore_timed_wait(handle: usize, timeout: Duration) -> bool {
    let res = WaitForSingleObject(HANDLE(handle as isize), duration_to_ms(timeout));
    if res == WAIT_OBJECT_0 {
        true
    } else if res == WAIT_TIMEOUT {
        false
    } else {
        crash::internal_crash(res.0 as i64, "WaitForSingleObject() on a semaphore failed");
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Block while `*word == expected`, until woken or until `timeout` elapses.
///
/// `WaitOnAddress` can't tell whether other threads are still waiting, so a wake is always reported as `Woken`.
pub fn address_wait(word: &AtomicU32, expected: u32, _options: LockOptions, timeout: Option<Duration>) -> ParkResult {
    let ms = timeout.map_or(INFINITE, duration_to_ms);
    let res = unsafe {
        WaitOnAddress(
            word as *const AtomicU32 as *const c_void,
            &expected as *const u32 as *const c_void,
            mem::size_of::<u32>(),
            ms
        )
    };

    match res {
        Ok(_) => ParkResult::Woken,
        Err(err) if err.code() == ERROR_TIMEOUT.to_hresult() => ParkResult::TimedOut,
        Err(err) => crash::internal_crash(err.code().0 as i64, "WaitOnAddress() failed"),
    }
}

/// Wake one, or all, threads blocked in `address_wait` on `word`.
///
/// `word` is only used as a key and is never dereferenced, so it may already be freed.
pub fn address_wake(word: *const AtomicU32, all: bool) {
    unsafe {
        if all {
            WakeByAddressAll(word as *const c_void);
        } else {
            WakeByAddressSingle(word as *const c_void);
        }
    }
}

use core::time::Duration;

use crate::sync::LockOptions;

//-----------------------------------------------------------------------------------------------------------------------------

/// Yield the rest of the current timeslice to the OS
#[inline]
pub fn thread_yield() {
    unsafe { libc::sched_yield() };
}

/// Give up the processor for at most `timeout`, a zero timeout only yields.
///
/// Unix schedulers have no handoff or depress policy, so `options` are ignored.
#[inline]
pub fn thread_switch(timeout: Duration, _options: LockOptions) {
    if timeout.is_zero() {
        thread_yield();
    } else {
        std::thread::sleep(timeout);
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

#[cfg(not(target_vendor = "apple"))]
pub use self::posix_sem::*;

#[cfg(not(target_vendor = "apple"))]
mod posix_sem {
    use core::{
        mem::{self, MaybeUninit},
        time::Duration,
    };

    use crate::{crash, os::unix::errno};

    /// Whether a semaphore creation failure is caused by a temporary shortage of resources.
    pub fn is_resource_shortage(err: i32) -> bool {
        err == libc::EAGAIN || err == libc::ENOMEM || err == libc::ENOSPC
    }

    /// Create an unnamed, process-private semaphore with a count of 0.
    ///
    /// `sem_t` must not move after `sem_init`, so it is boxed and the handle is its address.
    pub fn semaphore_create() -> Result<usize, i32> {
        let sem = Box::into_raw(Box::new(MaybeUninit::<libc::sem_t>::uninit()));
        let res = unsafe { libc::sem_init(sem.cast(), 0, 0) };
        if res == -1 {
            let err = errno();
            drop(unsafe { Box::from_raw(sem) });
            return Err(err);
        }
        Ok(sem as usize)
    }

    /// Destroy a semaphore created with `semaphore_create`.
    ///
    /// # Safety
    ///
    /// `handle` must come from `semaphore_create` and must not be used afterwards.
    pub unsafe fn semaphore_destroy(handle: usize) {
        let sem = handle as *mut MaybeUninit<libc::sem_t>;
        if libc::sem_destroy(sem.cast()) == -1 {
            crash::internal_crash(errno() as i64, "POSIX semaphore API failure");
        }
        drop(Box::from_raw(sem));
    }

    /// Increment the semaphore, waking one waiter if there is one.
    ///
    /// # Safety
    ///
    /// `handle` must be a live handle from `semaphore_create`.
    pub unsafe fn semaphore_signal(handle: usize) {
        if libc::sem_post(handle as *mut libc::sem_t) == -1 {
            crash::internal_crash(errno() as i64, "POSIX semaphore API failure");
        }
    }

    /// Wait until the semaphore can be decremented.
    ///
    /// # Safety
    ///
    /// `handle` must be a live handle from `semaphore_create`.
    pub unsafe fn semaphore_wait(handle: usize) {
        loop {
            if libc::sem_wait(handle as *mut libc::sem_t) == 0 {
                return;
            }
            let err = errno();
            if err != libc::EINTR {
                crash::internal_crash(err as i64, "POSIX semaphore API failure");
            }
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
        // `sem_timedwait` takes an absolute `CLOCK_REALTIME` deadline, so an interrupted wait keeps its deadline
        let mut deadline : libc::timespec = mem::zeroed();
        if libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) == -1 {
            crash::internal_crash(errno() as i64, "clock_gettime() failed");
        }
        let nsec = deadline.tv_nsec as u64 + timeout.subsec_nanos() as u64;
        let secs = (deadline.tv_sec as u64)
            .saturating_add(timeout.as_secs())
            .saturating_add(nsec / 1_000_000_000)
            .min(libc::time_t::MAX as u64);
        deadline.tv_sec = secs as libc::time_t;
        deadline.tv_nsec = (nsec % 1_000_000_000) as _;

        loop {
            if libc::sem_timedwait(handle as *mut libc::sem_t, &deadline) == 0 {
                return true;
            }
            match errno() {
                libc::EINTR => continue,
                libc::ETIMEDOUT => return false,
                err => crash::internal_crash(err as i64, "POSIX semaphore API failure"),
            }
        }
    }
}

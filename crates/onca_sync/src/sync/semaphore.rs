use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use crate::{
    crash::{self, LOG_TARGET},
    os::sync as imp,
};

const NO_SEMAPHORE : usize = 0;

/// Time to wait before retrying to create a semaphore after the OS ran out of resources.
const RESOURCE_SHORTAGE_BACKOFF : Duration = Duration::from_secs(1);

/// Lazily created OS semaphore
///
/// The OS object is only created the first time the semaphore is signalled or waited on,
/// so creating an `OsSemaphore` is free and can be done in a `const` context.
///
/// - Mach semaphores on apple targets
/// - `sem_t` on other unix targets
/// - `CreateSemaphoreW` on windows
pub struct OsSemaphore {
    handle : AtomicUsize,
}

impl OsSemaphore {
    /// Create a new semaphore with a count of 0
    #[inline]
    pub const fn new() -> Self {
        Self { handle: AtomicUsize::new(NO_SEMAPHORE) }
    }

    /// Whether the OS object has been created
    pub fn is_created(&self) -> bool {
        self.handle.load(Ordering::Relaxed) != NO_SEMAPHORE
    }

    /// Increment the count, waking one waiter if there is one
    #[inline]
    pub fn signal(&self) {
        let handle = self.get_or_create();
        unsafe { imp::semaphore_signal(handle) };
    }

    /// Block until the count can be decremented
    #[inline]
    pub fn wait(&self) {
        let handle = self.get_or_create();
        unsafe { imp::semaphore_wait(handle) };
    }

    /// Block until the count can be decremented, or until `timeout` elapses.
    ///
    /// Returns `true` if the count was decremented, `false` if the wait timed out.
    #[inline]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let handle = self.get_or_create();
        unsafe { imp::semaphore_timed_wait(handle, timeout) }
    }

    #[inline]
    fn get_or_create(&self) -> usize {
        match self.handle.load(Ordering::Acquire) {
            NO_SEMAPHORE => self.create_slow(),
            handle => handle,
        }
    }

    #[cold]
    fn create_slow(&self) -> usize {
        let new = loop {
            match imp::semaphore_create() {
                Ok(handle) => break handle,
                Err(err) if imp::is_resource_shortage(err) => {
                    tracing::warn!(target: LOG_TARGET, err, "temporary resource shortage while creating a semaphore, retrying");
                    std::thread::sleep(RESOURCE_SHORTAGE_BACKOFF);
                },
                Err(err) => crash::internal_crash(err as i64, "failed to create a semaphore"),
            }
        };

        match self.handle.compare_exchange(NO_SEMAPHORE, new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                tracing::trace!(target: LOG_TARGET, handle = new, "created semaphore");
                new
            },
            Err(winner) => {
                tracing::trace!(target: LOG_TARGET, handle = new, winner, "lost semaphore creation race, destroying redundant semaphore");
                unsafe { imp::semaphore_destroy(new) };
                winner
            },
        }
    }
}

impl Default for OsSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OsSemaphore {
    fn drop(&mut self) {
        let handle = *self.handle.get_mut();
        if handle != NO_SEMAPHORE {
            tracing::trace!(target: LOG_TARGET, handle, "destroying semaphore");
            unsafe { imp::semaphore_destroy(handle) };
        }
    }
}

impl fmt::Debug for OsSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsSemaphore").field("created", &self.is_created()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Instant};

    use super::*;

    #[test]
    fn created_lazily() {
        let sema = OsSemaphore::new();
        assert!(!sema.is_created());
        sema.signal();
        assert!(sema.is_created());
        sema.wait();
    }

    #[test]
    fn signal_before_wait_is_kept() {
        let sema = OsSemaphore::new();
        sema.signal();
        sema.signal();
        sema.wait();
        sema.wait();
    }

    #[test]
    fn racing_creation_keeps_one() {
        let sema = Arc::new(OsSemaphore::new());
        let handles: Vec<_> = (0..8).map(|_| {
            let sema = sema.clone();
            thread::spawn(move || sema.get_or_create())
        }).collect();

        let created: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(created.iter().all(|&handle| handle == created[0]));
        assert_eq!(sema.handle.load(Ordering::Relaxed), created[0]);
    }

    #[test]
    fn wait_blocks_until_signal() {
        let sema = Arc::new(OsSemaphore::new());
        let waiter = {
            let sema = sema.clone();
            thread::spawn(move || sema.wait())
        };
        thread::sleep(Duration::from_millis(10));
        sema.signal();
        waiter.join().unwrap();
    }

    #[test]
    fn wait_timeout_elapses() {
        let sema = OsSemaphore::new();
        let start = Instant::now();
        assert!(!sema.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert!(sema.is_created());
    }

    #[test]
    fn wait_timeout_takes_pending_signal() {
        let sema = OsSemaphore::new();
        sema.signal();
        assert!(sema.wait_timeout(Duration::from_secs(5)));
        // The count was consumed
        assert!(!sema.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn wait_timeout_released_by_signal() {
        let sema = Arc::new(OsSemaphore::new());
        let waiter = {
            let sema = sema.clone();
            thread::spawn(move || sema.wait_timeout(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(10));
        sema.signal();
        assert!(waiter.join().unwrap());
    }
}

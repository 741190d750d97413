use core::{
    fmt,
    ptr,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::crash;
#[cfg(dlock_backend = "fallback")]
use super::OsSemaphore;
#[cfg(not(dlock_backend = "fallback"))]
use super::thread_parker::{AddressPark, DefaultPark, LockOptions};

/// Nothing pending, or the last signal was consumed
const IDLE      : u32 = 0;
/// Signalled before the waiter arrived
const SIGNALLED : u32 = 1;
/// A waiter is blocked
const WAITING   : u32 = u32::MAX;

/// One-shot event between two threads
///
/// Exactly one thread calls [`ThreadEvent::wait`], and exactly one other thread calls [`ThreadEvent::signal`].
/// `wait` returns once the matching `signal` happened, whichever of the two came first.
/// After `wait` returned, the event is idle again and can be reused for another pair.
///
/// Neither call needs a syscall when the signal comes before the wait.
pub struct ThreadEvent {
    value : AtomicU32,
    #[cfg(dlock_backend = "fallback")]
    sema  : OsSemaphore,
}

impl ThreadEvent {
    /// Create a new, idle event
    #[inline]
    pub const fn new() -> Self {
        Self {
            value: AtomicU32::new(IDLE),
            #[cfg(dlock_backend = "fallback")]
            sema: OsSemaphore::new(),
        }
    }

    /// Signal the event, releasing the waiter if it is already blocked
    #[inline]
    pub fn signal(&self) {
        unsafe { Self::signal_raw(self) }
    }

    /// Signal the event behind a raw pointer.
    ///
    /// Once the signal is published, the waiter may return and free the event while this call is still running.
    /// Unlike [`ThreadEvent::signal`], this never holds a reference to the event after that point.
    ///
    /// # Safety
    ///
    /// `event` must point to a live event, and the waiter may not free it before it has been signalled.
    #[inline]
    pub unsafe fn signal_raw(event: *const ThreadEvent) {
        let word = ptr::addr_of!((*event).value);
        // 0 -> 1 doesn't need a wake.
        // Any other value does, even a corrupt one, the waiter does the validation.
        if (*word).fetch_add(1, Ordering::Release) == IDLE {
            return;
        }
        Self::signal_slow(event, word);
    }

    #[cold]
    #[allow(unused_variables)]
    unsafe fn signal_slow(event: *const ThreadEvent, word: *const AtomicU32) {
        #[cfg(dlock_backend = "fallback")]
        {
            // The waiter is blocked on the semaphore, so the event is still alive
            (*event).sema.signal();
        }
        #[cfg(not(dlock_backend = "fallback"))]
        {
            DefaultPark::unpark_one(word);
        }
    }

    /// Block until the event is signalled
    #[inline]
    pub fn wait(&self) {
        match self.value.fetch_sub(1, Ordering::Acquire) {
            SIGNALLED => (),
            IDLE => self.wait_slow(),
            value => crash::client_crash(value as u64, "Corrupt thread event value"),
        }
    }

    #[cold]
    fn wait_slow(&self) {
        #[cfg(dlock_backend = "fallback")]
        {
            self.sema.wait();
            // The signal moved the value from WAITING back to IDLE before posting
            let value = self.value.load(Ordering::Acquire);
            if value != IDLE {
                crash::client_crash(value as u64, "Corrupt thread event value");
            }
        }
        #[cfg(not(dlock_backend = "fallback"))]
        loop {
            match self.value.load(Ordering::Acquire) {
                IDLE => return,
                WAITING => { DefaultPark::park(&self.value, WAITING, LockOptions::empty(), None); },
                value => crash::client_crash(value as u64, "Corrupt thread event value"),
            }
        }
    }

    /// Whether the event was signalled and nobody consumed the signal yet
    pub fn is_signalled(&self) -> bool {
        self.value.load(Ordering::Acquire) == SIGNALLED
    }
}

impl Default for ThreadEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.value.load(Ordering::Relaxed) {
            IDLE => "idle",
            SIGNALLED => "signalled",
            WAITING => "waiting",
            _ => "corrupt",
        };
        f.debug_struct("ThreadEvent").field("state", &state).finish()
    }
}

// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use core::{
    hint::spin_loop,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};
use std::time::Instant;

use crate::os::sync as imp;
use super::{AddressPark, LockOptions, ParkResult};

// Wastes some CPU time for the given number or iterations, using a hint to indicate to the CPU that we are spinning
#[inline]
fn cpu_relax(iterations: u32) {
    for _ in 0..iterations {
        spin_loop()
    }
}

// A counter used to perform exponential backoff in spin loops

#[derive(Default)]
pub struct SpinWait {
    counter: u32,
}

impl SpinWait {
    /// Creates a new `SpinWait`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets a `SpinWait` to its initial state
    #[inline]
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Spins until the sleep threshold has been reached.
    ///
    /// This function returns whether the sleep threshold has not been reached yet, once it has, further spinning has diminishing returns and the thread should back off instead.
    ///
    /// The spin strategy will initially use a CPU-bound loop, but will fall back to yielding the CPU to the OS after a few iterations.
    #[inline]
    pub fn spin(&mut self) -> bool {
        if self.counter >= 10 {
            return false;
        }

        self.counter += 1;
        if self.counter <= 3 {
            cpu_relax(1 << self.counter);
        } else {
            imp::thread_yield();
        }
        true
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Escalating `thread_switch` backoff, used once spinning stops paying off.
///
/// Each call gives up the processor for twice as long as the previous one, up to [`SwitchBackoff::MAX_TIMEOUT`].
pub struct SwitchBackoff {
    timeout : Duration,
}

impl SwitchBackoff {
    pub const INITIAL_TIMEOUT : Duration = Duration::from_micros(16);
    pub const MAX_TIMEOUT     : Duration = Duration::from_millis(1);

    #[inline]
    pub const fn new() -> Self {
        Self { timeout: Self::INITIAL_TIMEOUT }
    }

    /// Timeout the next call to [`SwitchBackoff::switch`] will use.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deprioritize the current thread for the current timeout, then double it.
    #[inline]
    pub fn switch(&mut self, options: LockOptions) {
        imp::thread_switch(self.timeout, options);
        self.timeout = (self.timeout * 2).min(Self::MAX_TIMEOUT);
    }
}

impl Default for SwitchBackoff {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

/// Fallback address park, for targets without a kernel address-wait facility.
///
/// Parking polls the word, first spinning with [`SpinWait`], then backing off with [`SwitchBackoff`].
/// As nobody actually sleeps, unparking has nothing to do.
pub struct SpinPark;

impl AddressPark for SpinPark {
    fn park(word: &AtomicU32, expected: u32, options: LockOptions, timeout: Option<Duration>) -> ParkResult {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut spin = SpinWait::new();
        let mut backoff = SwitchBackoff::new();

        while word.load(Ordering::Relaxed) == expected {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return ParkResult::TimedOut;
                }
            }
            if !spin.spin() {
                backoff.switch(options);
            }
        }
        ParkResult::Woken
    }

    #[inline]
    fn unpark_one(_word: *const AtomicU32) {}

    #[inline]
    fn unpark_all(_word: *const AtomicU32) {}
}

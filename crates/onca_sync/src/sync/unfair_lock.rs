use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::{
    crash,
    sys::get_thread_id,
};
use super::{
    lock_word::{self, LockState, NOWAITERS_BIT, UNLOCKED},
    thread_parker::{AddressPark, DefaultPark, LockOptions},
};
#[cfg(not(dlock_backend = "fallback"))]
use super::thread_parker::ParkResult;
#[cfg(not(dlock_backend = "fallback"))]
use crate::sys::PriorityBoost;
#[cfg(dlock_backend = "fallback")]
use super::thread_parker::{SpinWait, SwitchBackoff};

/// Word-sized unfair lock
///
/// The lock stores the id of its owner, so recursive locking and unlocking from another thread are detected and reported as a crash instead of deadlocking.
/// While threads wait for the lock, the owner is boosted to their priority with the registered [`PriorityOverride`](crate::sys::PriorityOverride).
///
/// There is no ticketing: a thread that unlocks and immediately locks again will usually win against the threads that were waiting.
pub struct UnfairLock {
    word : AtomicU32,
}

impl UnfairLock {
    /// Create a new unlocked lock
    #[inline]
    pub const fn new() -> Self {
        Self { word: AtomicU32::new(UNLOCKED) }
    }

    /// Acquire the lock, blocking the current thread until it is able to do so.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds the lock.
    #[inline]
    pub fn lock(&self) {
        self.lock_with_options(LockOptions::empty());
    }

    /// Acquire the lock, using `options` while waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if the current thread already holds the lock.
    #[inline]
    pub fn lock_with_options(&self, options: LockOptions) {
        let self_value = lock_word::current_lock_value();
        if self.word.compare_exchange(UNLOCKED, self_value, Ordering::Acquire, Ordering::Relaxed).is_err() {
            self.lock_slow(self_value, options);
        }
    }

    #[cfg(not(dlock_backend = "fallback"))]
    #[cold]
    fn lock_slow(&self, self_value: u32, options: LockOptions) {
        let mut next = self_value;
        loop {
            let mut old = self.word.load(Ordering::Relaxed);
            let new = loop {
                let new = if !lock_word::is_locked(old) {
                    next
                } else {
                    old & !NOWAITERS_BIT
                };
                // The waiters bit is already clear, nothing to publish
                if new == old {
                    break new;
                }
                match self.word.compare_exchange_weak(old, new, Ordering::Acquire, Ordering::Relaxed) {
                    Ok(_) => break new,
                    Err(cur) => old = cur,
                }
            };

            if lock_word::is_locked_by(old, self_value) {
                crash::client_crash(0, "trying to lock recursively");
            }
            if new == next {
                return;
            }

            let res = {
                let _boost = PriorityBoost::start(lock_word::owner(new), self.key());
                DefaultPark::park(&self.word, new, options, None)
            };
            // Unless the kernel knows we were the last waiter, the lock has to be taken with the waiters bit clear,
            // so the next unlock wakes whoever is still parked.
            next = if res == ParkResult::WokenNoWaiters {
                self_value
            } else {
                self_value & !NOWAITERS_BIT
            };
        }
    }

    #[cfg(dlock_backend = "fallback")]
    #[cold]
    fn lock_slow(&self, self_value: u32, options: LockOptions) {
        let mut spin = SpinWait::new();
        let mut backoff = SwitchBackoff::new();
        loop {
            match self.word.compare_exchange(UNLOCKED, self_value, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => return,
                Err(cur) => {
                    if lock_word::is_locked_by(cur, self_value) {
                        crash::client_crash(0, "trying to lock recursively");
                    }
                    if !spin.spin() {
                        backoff.switch(options);
                    }
                },
            }
        }
    }

    /// Attempt to acquire the lock without blocking.
    ///
    /// Returns `false` when the lock is held, including when it is held by the current thread.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let self_value = lock_word::current_lock_value();
        self.word.compare_exchange(UNLOCKED, self_value, Ordering::Acquire, Ordering::Relaxed).is_ok()
    }

    /// Release the lock, waking one waiter if any thread had to wait for it.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held by the current thread.
    #[inline]
    pub fn unlock(&self) {
        let self_value = lock_word::current_lock_value();
        let cur = self.word.swap(UNLOCKED, Ordering::Release);
        if cur != self_value {
            self.unlock_slow(cur, self_value);
        }
    }

    #[cold]
    fn unlock_slow(&self, cur: u32, self_value: u32) {
        if !lock_word::is_locked_by(cur, self_value) {
            crash::client_crash(cur as u64, "lock not owned by current thread");
        }
        if lock_word::has_waiters(cur) {
            DefaultPark::unpark_one(&self.word);
        }
    }

    /// Current state of the lock
    ///
    /// The state may already be stale when this returns, so it should only be used for diagnostics and assertions.
    pub fn state(&self) -> LockState {
        LockState::decode(self.word.load(Ordering::Relaxed))
    }

    /// Whether any thread holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        lock_word::is_locked(self.word.load(Ordering::Relaxed))
    }

    /// Whether the current thread holds the lock
    #[inline]
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.state().owner() == Some(get_thread_id())
    }

    #[allow(dead_code)]
    #[inline]
    fn key(&self) -> usize {
        &self.word as *const AtomicU32 as usize
    }
}

impl Default for UnfairLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UnfairLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnfairLock").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::UnsafeCell,
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::sync::thread_parker::{Backend, BACKEND};

    struct Counter {
        lock  : UnfairLock,
        value : UnsafeCell<usize>,
    }

    unsafe impl Sync for Counter {}

    #[test]
    fn lock_unlock() {
        let lock = UnfairLock::new();
        assert_eq!(lock.state(), LockState::Unlocked);

        lock.lock();
        assert!(lock.is_locked());
        assert!(lock.is_owned_by_current_thread());
        assert_eq!(lock.state(), LockState::OwnedBy(get_thread_id()));

        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = UnfairLock::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        thread::scope(|s| {
            s.spawn(|| assert!(!lock.try_lock()));
        });
        lock.unlock();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    #[should_panic(expected = "trying to lock recursively")]
    fn recursive_lock_is_detected() {
        let lock = UnfairLock::new();
        lock.lock();
        lock.lock();
    }

    #[test]
    #[should_panic(expected = "lock not owned by current thread")]
    fn unlock_from_other_thread_is_detected() {
        let lock = Arc::new(UnfairLock::new());
        {
            let lock = lock.clone();
            thread::spawn(move || lock.lock()).join().unwrap();
        }
        lock.unlock();
    }

    #[test]
    fn contended_counter() {
        const THREADS : usize = 8;
        const ITERATIONS : usize = 2000;

        let counter = Counter { lock: UnfairLock::new(), value: UnsafeCell::new(0) };
        thread::scope(|s| {
            for _ in 0..THREADS {
                let counter = &counter;
                s.spawn(move || {
                    for _ in 0..ITERATIONS {
                        counter.lock.lock();
                        unsafe { *counter.value.get() += 1 };
                        counter.lock.unlock();
                    }
                });
            }
        });
        assert_eq!(unsafe { *counter.value.get() }, THREADS * ITERATIONS);
    }

    #[test]
    fn waiter_clears_nowaiters_bit() {
        let lock = Arc::new(UnfairLock::new());
        lock.lock();

        let waiter = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.lock();
                lock.unlock();
            })
        };

        if BACKEND != Backend::Fallback {
            let deadline = Instant::now() + Duration::from_secs(10);
            while lock.state() != LockState::OwnedByWithWaiters(get_thread_id()) {
                assert!(Instant::now() < deadline, "waiter never registered");
                thread::sleep(Duration::from_millis(1));
            }
        }

        lock.unlock();
        waiter.join().unwrap();
        assert_eq!(lock.state(), LockState::Unlocked);
    }
}

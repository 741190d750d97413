use core::{
    fmt,
    sync::atomic::{fence, AtomicU32, Ordering},
};

use crate::{
    crash,
    sys::{maximally_synchronizing_barrier, PriorityBoost},
};
use super::{
    lock_word::{self, LockState, DONE, NOWAITERS_BIT, UNLOCKED},
    thread_parker::{AddressPark, DefaultPark, LockOptions, SwitchBackoff},
};

/// Value a [`Gate`] waiter is waiting for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GateTarget {
    /// The owner reopened the gate with [`Gate::broadcast`].
    Unlocked,
    /// The owner sealed the gate with [`Gate::broadcast_done`].
    Done,
}

impl GateTarget {
    #[inline]
    const fn value(self) -> u32 {
        match self {
            GateTarget::Unlocked => UNLOCKED,
            GateTarget::Done => DONE,
        }
    }
}

/// Word-sized gate
///
/// One thread enters the gate with [`Gate::try_enter`] and becomes its owner.
/// Any number of threads can then block until the owner publishes a value:
/// [`Gate::broadcast`] reopens the gate, [`Gate::broadcast_done`] seals it for good.
/// Either way, all waiters are released together.
///
/// While threads wait, the owner is boosted to their priority.
pub struct Gate {
    word : AtomicU32,
}

impl Gate {
    /// Create a new, open gate
    #[inline]
    pub const fn new() -> Self {
        Self { word: AtomicU32::new(UNLOCKED) }
    }

    /// Enter an open gate, returns `false` if the gate is owned or sealed.
    #[inline]
    pub fn try_enter(&self) -> bool {
        let self_value = lock_word::current_lock_value();
        self.word.compare_exchange(UNLOCKED, self_value, Ordering::Acquire, Ordering::Relaxed).is_ok()
    }

    /// Block until the gate is open.
    #[inline]
    pub fn wait(&self) {
        self.wait_until(GateTarget::Unlocked, LockOptions::empty());
    }

    /// Block until the gate holds `target`.
    ///
    /// Everything the owner did before publishing `target` is visible once this returns.
    ///
    /// # Panics
    ///
    /// Panics if the current thread owns the gate, or when waiting for [`GateTarget::Unlocked`] on a sealed gate.
    #[inline]
    pub fn wait_until(&self, target: GateTarget, options: LockOptions) {
        if self.word.load(Ordering::Acquire) != target.value() {
            self.wait_slow(target.value(), options);
        }
    }

    #[cold]
    fn wait_slow(&self, value: u32, options: LockOptions) {
        let self_value = lock_word::current_lock_value();
        let mut backoff = SwitchBackoff::new();

        loop {
            let mut old = self.word.load(Ordering::Relaxed);
            let new = loop {
                if old == value {
                    fence(Ordering::Acquire);
                    return;
                }
                if old == DONE {
                    crash::client_crash(value as u64, "waiting for an unlocked gate that is done");
                }
                // Waiting for an open gate to be sealed, nobody to wait on yet
                if old == UNLOCKED {
                    break old;
                }

                let new = old & !NOWAITERS_BIT;
                if new == old {
                    break new;
                }
                match self.word.compare_exchange_weak(old, new, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => break new,
                    Err(cur) => old = cur,
                }
            };

            if lock_word::is_locked_by(old, self_value) {
                crash::client_crash(0, "trying to lock recursively");
            }

            if new == UNLOCKED {
                backoff.switch(options);
                continue;
            }

            let _boost = PriorityBoost::start(lock_word::owner(new), self.key());
            DefaultPark::park(&self.word, new, options, None);
        }
    }

    /// Reopen the gate, releasing all waiters.
    ///
    /// # Panics
    ///
    /// Panics if the current thread doesn't own the gate, the gate is left untouched.
    #[inline]
    pub fn broadcast(&self) {
        self.publish(UNLOCKED, Ordering::Release);
    }

    /// Seal the gate, releasing all waiters. The gate never changes again.
    ///
    /// # Panics
    ///
    /// Panics if the current thread doesn't own the gate, the gate is left untouched.
    #[inline]
    pub fn broadcast_done(&self) {
        // Contains a release barrier
        maximally_synchronizing_barrier();
        self.publish(DONE, Ordering::Relaxed);
    }

    #[inline]
    fn publish(&self, value: u32, order: Ordering) {
        let self_value = lock_word::current_lock_value();
        if let Err(cur) = self.word.compare_exchange(self_value, value, order, Ordering::Relaxed) {
            self.publish_slow(cur, self_value, value, order);
        }
    }

    #[cold]
    fn publish_slow(&self, mut cur: u32, self_value: u32, value: u32, order: Ordering) {
        // While we own the word, waiters can only clear the no waiters bit
        loop {
            if !lock_word::is_locked_by(cur, self_value) {
                crash::client_crash(cur as u64, "lock not owned by current thread");
            }
            match self.word.compare_exchange_weak(cur, value, order, Ordering::Relaxed) {
                Ok(_) => break,
                Err(new) => cur = new,
            }
        }
        if lock_word::has_waiters(cur) {
            DefaultPark::unpark_all(&self.word);
        }
    }

    /// Whether the gate has been sealed
    #[inline]
    pub fn is_done(&self) -> bool {
        self.word.load(Ordering::Acquire) == DONE
    }

    /// Current state of the gate
    ///
    /// The state may already be stale when this returns, so it should only be used for diagnostics and assertions.
    pub fn state(&self) -> LockState {
        LockState::decode(self.word.load(Ordering::Relaxed))
    }

    #[inline]
    fn key(&self) -> usize {
        &self.word as *const AtomicU32 as usize
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate").field("state", &self.state()).finish()
    }
}

//! Layout of the 32-bit lock word shared by [`UnfairLock`](super::UnfairLock), [`Gate`](super::Gate) and [`Once`](super::Once).
//!
//! ```text
//!  31                               2   1   0
//! +----------------------------------+---+---+
//! |          owner thread id         | 0 | N |
//! +----------------------------------+---+---+
//! ```
//!
//! - `0` is unlocked.
//! - `N` is the *no waiters* bit: an owner stores its id with `N` set, and the first thread that has to wait clears it.
//!   Unlocking a word that still has `N` set never needs a syscall.
//! - bit 1 is reserved and always 0.
//! - `u32::MAX` is the terminal `DONE` value of a sealed gate, it has all owner bits set so it never matches a real thread id.

use core::fmt;

use crate::sys::{get_thread_id, ThreadId};

pub(crate) const UNLOCKED      : u32 = 0;
pub(crate) const NOWAITERS_BIT : u32 = 0x1;
pub(crate) const OWNER_MASK    : u32 = !0x3;
pub(crate) const DONE          : u32 = u32::MAX;

/// Lock value of the current thread, with the no waiters bit set.
#[inline]
pub(crate) fn current_lock_value() -> u32 {
    lock_value_for(get_thread_id())
}

#[inline]
pub(crate) fn lock_value_for(id: ThreadId) -> u32 {
    (id.0 << 2) | NOWAITERS_BIT
}

#[inline]
pub(crate) fn is_locked(value: u32) -> bool {
    value & OWNER_MASK != 0
}

/// Whether `value` is owned by the thread with lock value `lock_value`, ignoring the waiters bit.
#[inline]
pub(crate) fn is_locked_by(value: u32, lock_value: u32) -> bool {
    (value ^ lock_value) & OWNER_MASK == 0
}

#[inline]
pub(crate) fn has_waiters(value: u32) -> bool {
    value & NOWAITERS_BIT == 0
}

/// Owner of a locked word, `None` when unlocked or done.
#[inline]
pub(crate) fn owner(value: u32) -> Option<ThreadId> {
    if value == DONE || !is_locked(value) {
        None
    } else {
        Some(ThreadId(value >> 2))
    }
}

/// Decoded state of a lock or gate word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LockState {
    /// Nobody holds the word.
    Unlocked,
    /// Held by a thread, and nobody has had to wait for it.
    OwnedBy(ThreadId),
    /// Held by a thread, and at least one thread parked, or is about to park, on it.
    OwnedByWithWaiters(ThreadId),
    /// The gate has been sealed and will never change again.
    Done,
}

impl LockState {
    pub(crate) fn decode(value: u32) -> LockState {
        match value {
            DONE => LockState::Done,
            value => match owner(value) {
                None => LockState::Unlocked,
                Some(id) if has_waiters(value) => LockState::OwnedByWithWaiters(id),
                Some(id) => LockState::OwnedBy(id),
            },
        }
    }

    /// The thread holding the word, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        match *self {
            LockState::OwnedBy(id) | LockState::OwnedByWithWaiters(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked               => f.write_str("unlocked"),
            LockState::OwnedBy(id)            => f.write_fmt(format_args!("owned by {id}")),
            LockState::OwnedByWithWaiters(id) => f.write_fmt(format_args!("owned by {id}, with waiters")),
            LockState::Done                   => f.write_str("done"),
        }
    }
}

use core::{
    fmt,
    ptr::{self, null_mut},
    sync::atomic::{AtomicPtr, AtomicU32, Ordering},
};

use cfg_if::cfg_if;

use crate::{
    crash,
    os::sync as imp,
    sys::{get_thread_id, maximally_synchronizing_barrier, PriorityBoost, ThreadId},
};
use super::{
    lock_word::LockState,
    thread_parker::{LockOptions, SpinWait},
    Gate, GateTarget, ThreadEvent,
};

/// Current state of a `Once`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OnceState {
    /// The initializer has not been started yet.
    New,
    /// A thread is currently running the initializer.
    InProgress,
    /// The initializer has completed.
    Done,
}

impl OnceState {
    /// Returns whether the associated `Once` has completed its initializer.
    #[inline]
    pub fn done(self) -> bool {
        matches!(self, OnceState::Done)
    }
}

cfg_if! {
    if #[cfg(dlock_backend = "fallback")] {
        type OnceImpl = WaiterChain;
    } else {
        type OnceImpl = GateOnce;
    }
}

/// A synchronization primitive which can be used to run a one-time initialization.
///
/// The first thread to call [`Once::call_once`] runs its closure, every other caller blocks until that closure has completed.
/// Once `call_once` returns, all memory writes performed by the closure are visible to the caller,
/// even though the fast path only performs a single acquire load.
///
/// # Differences from the standard library `Once`
///
/// - No poisoning. An initializer that panics can never complete, so the process is aborted instead.
/// - The initializing thread is boosted to the priority of the threads waiting for it.
pub struct Once {
    imp : OnceImpl,
}

impl Once {
    /// Creates a new `Once` value
    #[inline]
    pub const fn new() -> Self {
        Self { imp: OnceImpl::new() }
    }

    /// Returns the current state of this `Once`
    #[inline]
    pub fn state(&self) -> OnceState {
        self.imp.state()
    }

    /// Returns whether the initializer has completed
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.imp.is_completed()
    }

    /// Performs an initialization routine once and only once.
    /// The given closure will be executed if this is the first time `call_once` has been called, and otherwise the routine will *not* be invoked.
    ///
    /// This method will block the calling thread if another initialization routine is currently running.
    ///
    /// # Aborts
    ///
    /// If `f` panics, the threads waiting for it can never be released, so the process is aborted.
    #[inline]
    pub fn call_once<F>(&self, f: F)
    where
        F : FnOnce(),
    {
        if self.imp.is_completed() {
            return;
        }

        let mut f = Some(f);
        self.imp.call_once_slow(&mut || {
            if let Some(f) = f.take() {
                f()
            }
        });
    }
}

impl Default for Once {
    #[inline]
    fn default() -> Self {
        Once::new()
    }
}

impl fmt::Debug for Once {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once").field("state", &self.state()).finish()
    }
}

/// Run an initializer, aborting if it unwinds.
fn run_initializer(f: &mut dyn FnMut()) {
    let _abort = scopeguard::guard_on_unwind((), |()| {
        crash::client_abort(0, "once initializer panicked, waiters can never be released")
    });
    f();
}

//-----------------------------------------------------------------------------------------------------------------------------

/// `Once` on top of a [`Gate`]: the winner owns the gate while initializing, then seals it.
#[cfg_attr(dlock_backend = "fallback", allow(dead_code))]
pub(crate) struct GateOnce {
    gate : Gate,
}

#[cfg_attr(dlock_backend = "fallback", allow(dead_code))]
impl GateOnce {
    pub(crate) const fn new() -> Self {
        Self { gate: Gate::new() }
    }

    #[inline]
    pub(crate) fn is_completed(&self) -> bool {
        self.gate.is_done()
    }

    pub(crate) fn state(&self) -> OnceState {
        match self.gate.state() {
            LockState::Unlocked => OnceState::New,
            LockState::Done => OnceState::Done,
            _ => OnceState::InProgress,
        }
    }

    /// This takes an `FnMut` instead of a `FnOnce` because there's currently no way to take an `FnOnce` and call it via virtual dispatch without some allocation overhead.
    #[cold]
    pub(crate) fn call_once_slow(&self, f: &mut dyn FnMut()) {
        if self.gate.try_enter() {
            run_initializer(f);
            self.gate.broadcast_done();
        } else {
            self.gate.wait_until(GateTarget::Done, LockOptions::empty());
        }
    }
}

//-----------------------------------------------------------------------------------------------------------------------------

#[cfg_attr(not(dlock_backend = "fallback"), allow(dead_code))]
const CHAIN_DONE : *mut OnceWaiter = usize::MAX as *mut OnceWaiter;

/// Node of a [`WaiterChain`], lives on the stack of the thread it belongs to.
#[cfg_attr(not(dlock_backend = "fallback"), allow(dead_code))]
struct OnceWaiter {
    /// Node pushed before this one, null until the owner linked itself in
    next   : AtomicPtr<OnceWaiter>,
    event  : ThreadEvent,
    /// Thread running the initializer, 0 if unknown
    thread : AtomicU32,
}

#[cfg_attr(not(dlock_backend = "fallback"), allow(dead_code))]
impl OnceWaiter {
    const fn new(thread: u32) -> Self {
        Self {
            next: AtomicPtr::new(null_mut()),
            event: ThreadEvent::new(),
            thread: AtomicU32::new(thread),
        }
    }
}

/// `Once` without a gate, for backends that can't block on an address.
///
/// The word is the head of a LIFO chain of waiters, each blocked on its own [`ThreadEvent`]:
/// - null: nobody called `call_once` yet
/// - the winner's node, then the most recently pushed waiter while initializing
/// - `CHAIN_DONE` once the initializer completed
///
/// Once done, the winner signals the waiters from most to least recently pushed.
#[cfg_attr(not(dlock_backend = "fallback"), allow(dead_code))]
pub(crate) struct WaiterChain {
    head : AtomicPtr<OnceWaiter>,
}

#[cfg_attr(not(dlock_backend = "fallback"), allow(dead_code))]
impl WaiterChain {
    pub(crate) const fn new() -> Self {
        Self { head: AtomicPtr::new(null_mut()) }
    }

    #[inline]
    pub(crate) fn is_completed(&self) -> bool {
        self.head.load(Ordering::Acquire) == CHAIN_DONE
    }

    pub(crate) fn state(&self) -> OnceState {
        let head = self.head.load(Ordering::Acquire);
        if head.is_null() {
            OnceState::New
        } else if head == CHAIN_DONE {
            OnceState::Done
        } else {
            OnceState::InProgress
        }
    }

    #[cold]
    pub(crate) fn call_once_slow(&self, f: &mut dyn FnMut()) {
        // The winner publishes its id before anyone can link behind it
        let tail = OnceWaiter::new(get_thread_id().0);
        let tail_ptr = &tail as *const OnceWaiter as *mut OnceWaiter;

        match self.head.compare_exchange(null_mut(), tail_ptr, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                run_initializer(f);
                // Contains a release barrier
                maximally_synchronizing_barrier();
                let next = self.head.swap(CHAIN_DONE, Ordering::AcqRel);
                unsafe { Self::release_waiters(next, tail_ptr) };
            },
            Err(next) => self.wait(next),
        }
    }

    /// Signal every waiter from `next` up to, but not including, `tail`.
    ///
    /// # Safety
    ///
    /// `next` must be the head swapped out by the winner, every node in the chain is blocked until it gets signalled.
    unsafe fn release_waiters(mut next: *mut OnceWaiter, tail: *mut OnceWaiter) {
        while next != tail {
            // A waiter links itself right after pushing, so this is short
            let mut spin = SpinWait::new();
            let following = loop {
                let following = (*next).next.load(Ordering::Acquire);
                if !following.is_null() {
                    break following;
                }
                if !spin.spin() {
                    imp::thread_yield();
                }
            };

            // The waiter may return, and free its node, as soon as the event is signalled
            let event = ptr::addr_of!((*next).event);
            next = following;
            ThreadEvent::signal_raw(event);
        }
    }

    fn wait(&self, mut next: *mut OnceWaiter) {
        let node = OnceWaiter::new(0);
        let node_ptr = &node as *const OnceWaiter as *mut OnceWaiter;

        loop {
            if next == CHAIN_DONE {
                return;
            }

            match self.head.compare_exchange_weak(next, node_ptr, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    // `next` stays alive until we link ourselves, the winner waits for that link before signalling anyone
                    let owner = unsafe { (*next).thread.load(Ordering::Relaxed) };
                    // Only the initializer itself can get here with its own id, its event would never be signalled
                    if owner == get_thread_id().0 {
                        crash::client_crash(0, "trying to lock recursively");
                    }
                    node.thread.store(owner, Ordering::Relaxed);
                    node.next.store(next, Ordering::Release);

                    let owner = if owner != 0 { Some(ThreadId(owner)) } else { None };
                    let _boost = PriorityBoost::start(owner, self.key());
                    node.event.wait();
                    return;
                },
                Err(cur) => next = cur,
            }
        }
    }

    #[inline]
    fn key(&self) -> usize {
        &self.head as *const AtomicPtr<OnceWaiter> as usize
    }
}

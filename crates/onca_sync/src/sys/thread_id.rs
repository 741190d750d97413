use core::{
    cell::Cell,
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::crash;

/// Largest identity that can be handed out.
///
/// Identities are stored in bits 2..32 of a lock word, and the all-ones word is reserved for a sealed gate.
const MAX_THREAD_ID : u32 = (u32::MAX >> 2) - 1;

static NEXT_THREAD_ID : AtomicU32 = AtomicU32::new(1);

thread_local! {
    // `Cell<u32>` has no destructor, so this stays accessible while other thread locals are being destroyed.
    static THREAD_ID : Cell<u32> = const { Cell::new(0) };
}

/// Thread ID
///
/// A non-zero, process-local identity used to record the owner of a lock word.
/// Ids are never reused while the process lives.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ThreadId(pub(crate) u32);

impl ThreadId {
    /// Get the thread id as a u32
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("'Thread {}'", self.0))
    }
}

/// Get the thread ID of the current thread
#[inline]
pub fn get_thread_id() -> ThreadId {
    let id = THREAD_ID.with(|id| {
        let cur = id.get();
        if cur != 0 {
            cur
        } else {
            let new = allocate_thread_id();
            id.set(new);
            new
        }
    });
    ThreadId(id)
}

#[cold]
fn allocate_thread_id() -> u32 {
    let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    if id == 0 || id > MAX_THREAD_ID {
        crash::internal_crash(id as i64, "thread identities exhausted");
    }
    id
}

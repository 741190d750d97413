use once_cell::sync::OnceCell;

use super::ThreadId;

/// Priority override service provided by the runtime.
///
/// While a thread is blocked on a word owned by another thread, the owner is temporarily boosted to the waiter's priority.
/// `key` is the address of the word being waited on, so an implementation can match each `end` with its `start`.
///
/// Both calls are made from the waiting thread, which can query its own priority.
pub trait PriorityOverride : Send + Sync {
    /// Boost `owner` to at least the priority of the calling thread.
    fn start(&self, owner: ThreadId, key: usize);

    /// Retract a boost previously requested with the same `owner` and `key`.
    fn end(&self, owner: ThreadId, key: usize);
}

static PRIORITY_OVERRIDE : OnceCell<&'static dyn PriorityOverride> = OnceCell::new();

/// Register the process-wide priority override service.
///
/// Only one service can be registered, a second registration returns the rejected service.
/// Without a service, boosts are no-ops.
pub fn set_priority_override(service: &'static dyn PriorityOverride) -> Result<(), &'static dyn PriorityOverride> {
    PRIORITY_OVERRIDE.set(service)
}

/// A priority boost of a lock owner, retracted when dropped.
///
/// Held across a park, so the boost is retracted after waking, on every loop iteration and when unwinding.
#[must_use = "the boost is retracted as soon as the guard is dropped"]
pub struct PriorityBoost {
    owner : Option<ThreadId>,
    key   : usize,
}

impl PriorityBoost {
    /// Boost `owner` while the current thread waits on the word at `key`.
    #[inline]
    pub fn start(owner: Option<ThreadId>, key: usize) -> Self {
        let owner = match (owner, PRIORITY_OVERRIDE.get()) {
            (Some(owner), Some(service)) => {
                service.start(owner, key);
                Some(owner)
            },
            _ => None,
        };
        PriorityBoost { owner, key }
    }

    /// Returns the thread being boosted, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }
}

impl Drop for PriorityBoost {
    #[inline]
    fn drop(&mut self) {
        if let (Some(owner), Some(service)) = (self.owner, PRIORITY_OVERRIDE.get()) {
            service.end(owner, self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Registration is process-wide, so it is covered by the `priority_boost` integration test.
    #[test]
    fn no_owner_no_boost() {
        let boost = PriorityBoost::start(None, 0x1000);
        assert_eq!(boost.owner(), None);
    }
}

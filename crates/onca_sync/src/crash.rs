//! Fatal diagnostics.
//!
//! None of the primitives in this crate return errors: they either succeed, possibly after blocking, or the process is taken down.
//! Client misuse panics, so tests can observe it and `panic = "abort"` builds terminate immediately.
//! Internal invariant violations always abort, as unwinding through a corrupted primitive is never safe.

use core::fmt;

pub(crate) const LOG_TARGET : &str = "onca_sync";

/// Kind of a fatal crash.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum CrashKind {
    /// The caller broke the contract of a primitive.
    Client,
    /// The primitive observed a state its own invariants say is impossible.
    Internal,
}

impl fmt::Display for CrashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashKind::Client   => f.write_str("BUG IN CLIENT OF ONCA_SYNC"),
            CrashKind::Internal => f.write_str("BUG IN ONCA_SYNC"),
        }
    }
}

/// Report a misuse of a primitive and panic.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn client_crash(code: u64, message: &str) -> ! {
    tracing::error!(target: LOG_TARGET, code, kind = %CrashKind::Client, "{message}");
    panic!("{}: {message} (code: {code:#x})", CrashKind::Client);
}

/// Report a misuse of a primitive that can't be recovered by unwinding, and abort the process.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn client_abort(code: u64, message: &str) -> ! {
    let location = core::panic::Location::caller();
    tracing::error!(target: LOG_TARGET, code, kind = %CrashKind::Client, %location, "{message}");
    eprintln!("{}: {message} (code: {code:#x}) at {location}", CrashKind::Client);
    std::process::abort();
}

/// Report a broken internal invariant and abort the process.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn internal_crash(code: i64, message: &str) -> ! {
    let location = core::panic::Location::caller();
    tracing::error!(target: LOG_TARGET, code, kind = %CrashKind::Internal, %location, "{message}");
    eprintln!("{}: {message} (code: {code:#x}) at {location}", CrashKind::Internal);
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "BUG IN CLIENT OF ONCA_SYNC: trying to lock recursively (code: 0x0)")]
    fn client_crash_panics_with_code() {
        client_crash(0, "trying to lock recursively");
    }

    #[test]
    fn crash_kind_display() {
        assert_eq!(CrashKind::Client.to_string(), "BUG IN CLIENT OF ONCA_SYNC");
        assert_eq!(CrashKind::Internal.to_string(), "BUG IN ONCA_SYNC");
    }
}

//! Module containing OS abstractions.
//!
//! Direct OS implementations aren't available to the user, the primitives built on top of them live in `onca_sync::sync`.
//!
//! Every platform exposes the same `sync` surface:
//! - `thread_yield` and `thread_switch` for backoff
//! - a counting semaphore addressed by a `usize` handle
//! - `address_wait`/`address_wake` when the kernel has an address-wait facility

use cfg_if::cfg_if;

cfg_if!{
    if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::sync;
    } else if #[cfg(any(target_os = "linux", target_os = "android"))] {
        mod unix;
        mod linux;
        pub(crate) use self::linux::sync;
    } else if #[cfg(target_vendor = "apple")] {
        mod unix;
        mod macos;
        pub(crate) use self::macos::sync;
    } else if #[cfg(unix)] {
        mod unix;
        pub(crate) use self::unix::sync;
    } else {
        compile_error!("onca_sync needs either a windows or a unix target");
    }
}

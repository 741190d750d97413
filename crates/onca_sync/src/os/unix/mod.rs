pub mod sync;

/// Get the `errno` of the last failed libc call on this thread.
pub(crate) fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

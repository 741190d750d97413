use core::sync::atomic::{fence, Ordering};

/// Issues the strongest barrier the CPU offers.
///
/// A release barrier alone only orders our own stores.
/// A peer CPU that speculatively loaded guarded data before it loaded the published flag can still observe stale data once the branch that skips re-initialization resolves.
/// Issuing a fully serializing instruction between the last guarded store and the publishing store makes the window long enough for that speculation to be thrown away.
///
/// This contains a release barrier, so the publishing store itself may be relaxed.
#[inline]
pub fn maximally_synchronizing_barrier() {
    fence(Ordering::SeqCst);

    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    unsafe {
        // `cpuid` is a serializing instruction, the result is irrelevant
        let _ = core::arch::x86_64::__cpuid(0);
    }

    #[cfg(target_arch = "x86")]
    #[allow(unused_unsafe)]
    unsafe {
        let _ = core::arch::x86::__cpuid(0);
    }
}

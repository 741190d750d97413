#![allow(dead_code)]

use std::{
    sync::mpsc,
    thread,
    time::Duration,
};

/// Budget for a whole stress scenario, a scenario that takes longer has lost a wakeup.
pub const TIMEOUT : Duration = Duration::from_secs(60);

/// Small xorshift generator, used to jitter threads around the interesting windows.
pub struct XorShift(u32);

impl XorShift {
    pub fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Spin, yield or sleep for a short random amount of time
    pub fn delay(&mut self) {
        match self.next() % 8 {
            0 => thread::yield_now(),
            1 => thread::sleep(Duration::from_micros((self.next() % 50) as u64)),
            n => for _ in 0..(n * 16) {
                core::hint::spin_loop();
            },
        }
    }
}

/// Run `f` on its own thread, panicking if it doesn't complete within `timeout`.
pub fn with_timeout<T, F>(timeout: Duration, f: F) -> T
where
    T : Send + 'static,
    F : FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        let res = f();
        let _ = sender.send(());
        res
    });

    match receiver.recv_timeout(timeout) {
        Ok(()) => handle.join().unwrap(),
        // The thread panicked, surface its panic
        Err(mpsc::RecvTimeoutError::Disconnected) => handle.join().unwrap(),
        Err(mpsc::RecvTimeoutError::Timeout) => panic!("scenario did not complete within {timeout:?}"),
    }
}

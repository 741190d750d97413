mod common;

use std::{
    cell::UnsafeCell,
    sync::Arc,
    thread,
};

use common::{with_timeout, XorShift, TIMEOUT};
use onca_sync::prelude::*;

struct Shared {
    lock    : UnfairLock,
    counter : UnsafeCell<u64>,
}

unsafe impl Sync for Shared {}

#[test]
fn unfair_lock_counter() {
    const THREADS : u64 = 8;
    const ITERATIONS : u64 = 20_000;

    let total = with_timeout(TIMEOUT, || {
        let shared = Arc::new(Shared { lock: UnfairLock::new(), counter: UnsafeCell::new(0) });
        let handles: Vec<_> = (0..THREADS).map(|i| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut rng = XorShift::new(i as u32 + 1);
                for j in 0..ITERATIONS {
                    shared.lock.lock();
                    // Read-modify-write split in two, so a second thread in here would lose an increment
                    let value = unsafe { *shared.counter.get() };
                    if j % 64 == 0 {
                        rng.delay();
                    }
                    unsafe { *shared.counter.get() = value + 1 };
                    shared.lock.unlock();
                }
            })
        }).collect();

        for handle in handles {
            handle.join().unwrap();
        }
        unsafe { *shared.counter.get() }
    });

    assert_eq!(total, THREADS * ITERATIONS);
}

struct Log {
    lock    : UnfairLock,
    entries : UnsafeCell<Vec<(usize, usize)>>,
}

unsafe impl Sync for Log {}

#[test]
fn mixed_options_keep_exclusion() {
    const THREADS : usize = 6;
    const ITERATIONS : usize = 10_000;

    let entries = with_timeout(TIMEOUT, || {
        let log = Arc::new(Log { lock: UnfairLock::new(), entries: UnsafeCell::new(Vec::new()) });
        let handles: Vec<_> = (0..THREADS).map(|i| {
            let log = log.clone();
            thread::spawn(move || {
                let options = if i % 2 == 0 { LockOptions::DATA_CONTENTION } else { LockOptions::empty() };
                for j in 0..ITERATIONS {
                    log.lock.lock_with_options(options);
                    unsafe { (*log.entries.get()).push((i, j)) };
                    log.lock.unlock();
                }
            })
        }).collect();

        for handle in handles {
            handle.join().unwrap();
        }
        unsafe { (*log.entries.get()).clone() }
    });

    assert_eq!(entries.len(), THREADS * ITERATIONS);
    // Each thread's own entries stay in program order
    for i in 0..THREADS {
        let own: Vec<_> = entries.iter().filter(|(t, _)| *t == i).map(|(_, j)| *j).collect();
        assert!(own.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn lock_with_options_excludes() {
    let lock = Arc::new(UnfairLock::new());
    let owner_seen = Arc::new(std::sync::atomic::AtomicBool::new(false));

    lock.lock_with_options(LockOptions::DATA_CONTENTION);
    let waiter = {
        let lock = lock.clone();
        let owner_seen = owner_seen.clone();
        thread::spawn(move || {
            lock.lock_with_options(LockOptions::DATA_CONTENTION);
            assert!(owner_seen.load(std::sync::atomic::Ordering::Relaxed));
            assert!(lock.is_owned_by_current_thread());
            lock.unlock();
        })
    };

    thread::sleep(std::time::Duration::from_millis(10));
    owner_seen.store(true, std::sync::atomic::Ordering::Relaxed);
    lock.unlock();
    waiter.join().unwrap();
}

#[test]
fn recursive_lock_panics_instead_of_deadlocking() {
    let res = with_timeout(TIMEOUT, || {
        std::panic::catch_unwind(|| {
            let lock = UnfairLock::new();
            lock.lock();
            lock.lock();
        })
    });
    assert!(res.is_err());
}

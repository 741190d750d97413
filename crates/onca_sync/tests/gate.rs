mod common;

use std::{
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use common::{with_timeout, XorShift, TIMEOUT};
use onca_sync::{prelude::*, sync::LockState};

#[test]
fn repeated_broadcast_rounds() {
    const WAITERS : usize = 4;
    const ROUNDS : u32 = 500;

    with_timeout(TIMEOUT, || {
        let gate = Arc::new(Gate::new());
        let data = Arc::new(AtomicU32::new(0));
        let start = Arc::new(Barrier::new(WAITERS + 1));
        let end = Arc::new(Barrier::new(WAITERS + 1));

        let handles: Vec<_> = (0..WAITERS).map(|i| {
            let gate = gate.clone();
            let data = data.clone();
            let start = start.clone();
            let end = end.clone();
            thread::spawn(move || {
                let mut rng = XorShift::new(i as u32 + 3);
                for round in 1..=ROUNDS {
                    start.wait();
                    rng.delay();
                    gate.wait();
                    assert_eq!(data.load(Ordering::Relaxed), round);
                    end.wait();
                }
            })
        }).collect();

        for round in 1..=ROUNDS {
            assert!(gate.try_enter());
            start.wait();
            data.store(round, Ordering::Relaxed);
            gate.broadcast();
            end.wait();
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gate.state(), LockState::Unlocked);
    });
}

#[test]
fn only_one_thread_enters() {
    const THREADS : usize = 8;

    with_timeout(TIMEOUT, || {
        let gate = Arc::new(Gate::new());
        let entered = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS).map(|_| {
            let gate = gate.clone();
            let entered = entered.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                if gate.try_enter() {
                    entered.fetch_add(1, Ordering::Relaxed);
                    gate.broadcast_done();
                } else {
                    gate.wait_until(GateTarget::Done, LockOptions::empty());
                }
                assert!(gate.is_done());
            })
        }).collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(entered.load(Ordering::Relaxed), 1);
    });
}

mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use common::{with_timeout, XorShift, TIMEOUT};
use onca_sync::prelude::*;

#[test]
fn racing_initializers_run_once() {
    const THREADS : usize = 8;
    const ROUNDS : usize = 200;

    with_timeout(TIMEOUT, || {
        for round in 0..ROUNDS {
            let once = Arc::new(Once::new());
            let runs = Arc::new(AtomicUsize::new(0));
            let value = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS).map(|i| {
                let once = once.clone();
                let runs = runs.clone();
                let value = value.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut rng = XorShift::new((round * THREADS + i) as u32 + 1);
                    barrier.wait();
                    rng.delay();
                    once.call_once(|| {
                        runs.fetch_add(1, Ordering::Relaxed);
                        rng.delay();
                        value.store(round + 1, Ordering::Relaxed);
                    });
                    // Everything the initializer wrote has to be visible here
                    assert_eq!(value.load(Ordering::Relaxed), round + 1);
                    assert!(once.is_completed());
                })
            }).collect();

            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(runs.load(Ordering::Relaxed), 1);
            assert_eq!(once.state(), OnceState::Done);
        }
    });
}

#[test]
fn waiters_block_on_slow_initializer() {
    static ONCE : Once = Once::new();
    static VALUE : AtomicUsize = AtomicUsize::new(0);

    with_timeout(TIMEOUT, || {
        let started = Arc::new(Barrier::new(2));
        let initializer = {
            let started = started.clone();
            thread::spawn(move || {
                ONCE.call_once(|| {
                    started.wait();
                    thread::sleep(std::time::Duration::from_millis(50));
                    VALUE.store(42, Ordering::Relaxed);
                });
            })
        };

        started.wait();
        assert_eq!(ONCE.state(), OnceState::InProgress);

        let waiters: Vec<_> = (0..4).map(|_| thread::spawn(|| {
            ONCE.call_once(|| unreachable!("initializer ran twice"));
            VALUE.load(Ordering::Relaxed)
        })).collect();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), 42);
        }
        initializer.join().unwrap();
    });
}

#[test]
fn completed_once_skips_closure() {
    let once = Once::new();
    let mut calls = 0;
    for _ in 0..3 {
        once.call_once(|| calls += 1);
    }
    assert_eq!(calls, 1);
}

use criterion::{criterion_main, criterion_group, Criterion};

use std::{
    cell::UnsafeCell,
    hint::black_box,
    sync::Arc,
    thread,
};
use onca_sync::prelude::*;

struct LockedCounter {
    lock  : UnfairLock,
    value : UnsafeCell<usize>,
}

unsafe impl Sync for LockedCounter {}

const CONTENDED_THREADS : usize = 4;
const CONTENDED_ITERATIONS : usize = 1000;

fn uncontended_benchmark(c: &mut Criterion) {
    let lock = UnfairLock::new();
    c.bench_function("unfair lock: lock/unlock", |b| b.iter(|| {
        lock.lock();
        lock.unlock();
    }));

    c.bench_function("unfair lock: try_lock/unlock", |b| b.iter(|| {
        if lock.try_lock() {
            lock.unlock();
        }
    }));

    let pl_mutex = parking_lot::Mutex::new(0u64);
    c.bench_function("parking_lot mutex: lock/unlock", |b| b.iter(|| {
        *pl_mutex.lock() += 1;
    }));

    let std_mutex = std::sync::Mutex::new(0u64);
    c.bench_function("std mutex: lock/unlock", |b| b.iter(|| {
        *std_mutex.lock().unwrap() += 1;
    }));
}

fn contended_benchmark(c: &mut Criterion) {
    c.bench_function("unfair lock: contended", |b| b.iter(|| {
        let counter = Arc::new(LockedCounter { lock: UnfairLock::new(), value: UnsafeCell::new(0) });
        let handles: Vec<_> = (0..CONTENDED_THREADS).map(|_| {
            let counter = counter.clone();
            thread::spawn(move || for _ in 0..CONTENDED_ITERATIONS {
                counter.lock.lock();
                unsafe { *counter.value.get() += 1 };
                counter.lock.unlock();
            })
        }).collect();
        for handle in handles {
            handle.join().unwrap();
        }
        black_box(unsafe { *counter.value.get() })
    }));

    c.bench_function("parking_lot mutex: contended", |b| b.iter(|| {
        let mutex = Arc::new(parking_lot::Mutex::new(0usize));
        let handles: Vec<_> = (0..CONTENDED_THREADS).map(|_| {
            let mutex = mutex.clone();
            thread::spawn(move || for _ in 0..CONTENDED_ITERATIONS {
                *mutex.lock() += 1;
            })
        }).collect();
        for handle in handles {
            handle.join().unwrap();
        }
        black_box(*mutex.lock())
    }));
}

fn once_benchmark(c: &mut Criterion) {
    let once = Once::new();
    once.call_once(|| {});
    c.bench_function("once: completed", |b| b.iter(|| {
        once.call_once(|| unreachable!());
    }));

    let pl_once = parking_lot::Once::new();
    pl_once.call_once(|| {});
    c.bench_function("parking_lot once: completed", |b| b.iter(|| {
        pl_once.call_once(|| unreachable!());
    }));

    c.bench_function("once: fresh", |b| b.iter(|| {
        let once = Once::new();
        once.call_once(|| { black_box(()); });
        black_box(once.is_completed())
    }));
}

fn thread_event_benchmark(c: &mut Criterion) {
    let event = ThreadEvent::new();
    c.bench_function("thread event: signal then wait", |b| b.iter(|| {
        event.signal();
        event.wait();
    }));
}

criterion_group!(benches, uncontended_benchmark, contended_benchmark, once_benchmark, thread_event_benchmark);
criterion_main!(benches);

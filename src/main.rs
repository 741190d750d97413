use std::{
    cell::UnsafeCell,
    process::ExitCode,
    str::FromStr,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Instant,
};

use onca_sync::{
    prelude::*,
    sync::thread_parker::BACKEND,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const LOG_TARGET : &str = "onca_sync_stress";

struct Config {
    threads    : usize,
    iterations : usize,
    rounds     : usize,
}

impl Config {
    fn from_env() -> Self {
        Config {
            threads: env_or("ONCA_STRESS_THREADS", 8),
            iterations: env_or("ONCA_STRESS_ITERATIONS", 100_000),
            rounds: env_or("ONCA_STRESS_ROUNDS", 1000),
        }
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => match value.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(target: LOG_TARGET, "invalid value '{value}' for {name}, using {default}");
                default
            },
        },
        Err(_) => default,
    }
}

/// Counter only protected by an `UnfairLock`, so lost increments show up as a wrong total.
struct LockedCounter {
    lock  : UnfairLock,
    value : UnsafeCell<usize>,
}

unsafe impl Sync for LockedCounter {}

fn mutual_exclusion(config: &Config) -> Result<(), String> {
    let counter = LockedCounter { lock: UnfairLock::new(), value: UnsafeCell::new(0) };

    thread::scope(|s| {
        for i in 0..config.threads {
            let counter = &counter;
            s.spawn(move || {
                for _ in 0..config.iterations {
                    if i % 2 == 0 {
                        counter.lock.lock_with_options(LockOptions::DATA_CONTENTION);
                    } else {
                        counter.lock.lock();
                    }
                    unsafe { *counter.value.get() += 1 };
                    counter.lock.unlock();
                }
            });
        }
    });

    let expected = config.threads * config.iterations;
    let lock_total = unsafe { *counter.value.get() };
    if lock_total != expected {
        return Err(format!("expected {expected}, counted {lock_total}"));
    }
    Ok(())
}

fn exactly_once(config: &Config) -> Result<(), String> {
    for round in 0..config.rounds {
        let once = Once::new();
        let runs = AtomicUsize::new(0);
        let published = AtomicUsize::new(0);
        let seen = AtomicUsize::new(0);
        let barrier = Barrier::new(config.threads);

        thread::scope(|s| {
            for _ in 0..config.threads {
                s.spawn(|| {
                    barrier.wait();
                    once.call_once(|| {
                        runs.fetch_add(1, Ordering::Relaxed);
                        published.store(round + 1, Ordering::Relaxed);
                    });
                    if published.load(Ordering::Relaxed) == round + 1 {
                        seen.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        let runs = runs.into_inner();
        let seen = seen.into_inner();
        if runs != 1 || seen != config.threads {
            return Err(format!("round {round}: initializer ran {runs} times, {seen}/{} callers saw its result", config.threads));
        }
    }
    Ok(())
}

fn gate_broadcast(config: &Config) -> Result<(), String> {
    let gate = Gate::new();
    let data = AtomicU32::new(0);
    let released = AtomicUsize::new(0);
    let waiters = config.threads.saturating_sub(1).max(1);
    let start = Barrier::new(waiters + 1);
    let end = Barrier::new(waiters + 1);
    let rounds = config.rounds as u32;

    thread::scope(|s| {
        for _ in 0..waiters {
            s.spawn(|| {
                for round in 1..=rounds {
                    start.wait();
                    gate.wait();
                    if data.load(Ordering::Relaxed) == round {
                        released.fetch_add(1, Ordering::Relaxed);
                    }
                    end.wait();
                }
            });
        }

        for round in 1..=rounds {
            let entered = gate.try_enter();
            start.wait();
            data.store(round, Ordering::Relaxed);
            if entered {
                gate.broadcast();
            }
            end.wait();
        }
    });

    let expected = waiters * config.rounds;
    let released = released.into_inner();
    if released != expected {
        return Err(format!("expected {expected} releases, got {released}"));
    }
    Ok(())
}

fn event_ping_pong(config: &Config) -> Result<(), String> {
    let ping = Arc::new(ThreadEvent::new());
    let pong = Arc::new(ThreadEvent::new());
    let iterations = config.iterations;

    let other = {
        let ping = ping.clone();
        let pong = pong.clone();
        thread::spawn(move || for _ in 0..iterations {
            ping.wait();
            pong.signal();
        })
    };

    for _ in 0..iterations {
        ping.signal();
        pong.wait();
    }
    other.join().map_err(|_| "ping-pong thread panicked".to_string())?;

    if ping.is_signalled() || pong.is_signalled() {
        return Err("an event was left signalled".to_string());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!(target: LOG_TARGET, backend = ?BACKEND, threads = config.threads, iterations = config.iterations, rounds = config.rounds, "starting stress run");

    let scenarios : [(&str, fn(&Config) -> Result<(), String>); 4] = [
        ("mutual exclusion", mutual_exclusion),
        ("exactly once", exactly_once),
        ("gate broadcast", gate_broadcast),
        ("thread event ping-pong", event_ping_pong),
    ];

    let mut failed = 0;
    for (name, scenario) in scenarios {
        let start = Instant::now();
        match scenario(&config) {
            Ok(()) => info!(target: LOG_TARGET, elapsed = ?start.elapsed(), "{name}: ok"),
            Err(err) => {
                error!(target: LOG_TARGET, "{name}: {err}");
                failed += 1;
            },
        }
    }

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        error!(target: LOG_TARGET, "{failed} scenario(s) failed");
        ExitCode::FAILURE
    }
}

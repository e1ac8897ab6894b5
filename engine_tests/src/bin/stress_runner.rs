//! Registry stress runner.
//!
//! Usage:
//!   cargo run -p engine_tests --bin stress_runner -- [--jobs 32] [--threads 8] [--rounds 5000] [--keys 16]
//!
//! Schedules `jobs` workers on the job scheduler. Each worker acquires,
//! clones and drops handles to randomly chosen keys. Afterwards the registry
//! must be empty and every constructed resource destroyed exactly once.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Context};
use engine_core::prelude::*;
use engine_core::scheduler::Scheduler;
use rand::Rng;
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct StressArgs {
    jobs: usize,
    threads: usize,
    rounds: usize,
    keys: usize,
}

fn parse_args() -> anyhow::Result<StressArgs> {
    let mut out = StressArgs {
        jobs: 32,
        threads: 0,
        rounds: 5_000,
        keys: 16,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .with_context(|| format!("{} needs a value", args[i]))?
                .parse::<usize>()
                .with_context(|| format!("{} expects a number", args[i]))
        };
        match args[i].as_str() {
            "--jobs" => out.jobs = value()?,
            "--threads" => out.threads = value()?,
            "--rounds" => out.rounds = value()?,
            "--keys" => out.keys = value()?.max(1),
            other => anyhow::bail!("unknown argument: {other}"),
        }
        i += 2;
    }
    Ok(out)
}

#[derive(Default)]
struct Counters {
    built: AtomicUsize,
    dropped: AtomicUsize,
}

struct Blob {
    bytes: Vec<u8>,
    counters: Arc<Counters>,
}

impl RefCounted for Blob {
    type Args = (Arc<Counters>, usize);

    fn create(_key: &Guid, (counters, len): Self::Args) -> anyhow::Result<Self> {
        counters.built.fetch_add(1, Ordering::Relaxed);
        Ok(Blob {
            bytes: vec![0xAB; len],
            counters,
        })
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    let registry = Registry::with_config(RegistryConfig {
        leak_policy: LeakPolicy::Log,
        log_lifecycle: false,
        ..RegistryConfig::named("stress")
    });
    let scheduler = Scheduler::new(args.threads);
    let counters = Arc::new(Counters::default());
    let names: Arc<Vec<Guid>> = Arc::new(
        (0..args.keys)
            .map(|k| Guid::from_name(&format!("blob/{k}")))
            .collect(),
    );

    info!(?args, max_threads = scheduler.max_threads(), "starting registry stress run");
    let start = Instant::now();

    for _ in 0..args.jobs {
        let registry = registry.clone();
        let counters = counters.clone();
        let names = names.clone();
        let rounds = args.rounds;
        scheduler.schedule(move || {
            let mut rng = rand::thread_rng();
            let mut held: Vec<Handle<Blob>> = Vec::new();
            for _ in 0..rounds {
                let key = names[rng.gen_range(0..names.len())];
                let h = Blob::get_handle_in(&registry, key, (counters.clone(), 64));
                assert!(h.is_valid() && h.ref_count() >= 1);
                assert_eq!(h.bytes.len(), 64);

                match rng.gen_range(0..4) {
                    0 => held.push(h.clone()),
                    1 if !held.is_empty() => {
                        let i = rng.gen_range(0..held.len());
                        held.swap_remove(i);
                    }
                    _ => {}
                }
            }
        });
    }

    let report = scheduler.run_jobs();
    let elapsed = start.elapsed();
    let built = counters.built.load(Ordering::SeqCst);
    let dropped = counters.dropped.load(Ordering::SeqCst);

    info!(
        completed = report.completed,
        panicked = report.panicked,
        peak = report.peak_parallelism,
        built,
        dropped,
        live = registry.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "stress run finished"
    );

    ensure!(report.panicked == 0, "{} worker(s) panicked", report.panicked);
    ensure!(built == dropped, "built {built} resources but dropped {dropped}");
    registry.shutdown().context("registry not empty after stress run")?;
    Ok(())
}

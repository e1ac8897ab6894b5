//! Job scheduler.
//!
//! Runs queued jobs each on its own thread, never more than `max_threads`
//! at a time. Independent of the resource registry and its lock.
//!
//! # Usage
//! ```ignore
//! let scheduler = Scheduler::new(4);
//! scheduler.schedule(|| decode_audio("music/theme.ogg"));
//! scheduler.schedule(|| bake_lightmap("level01"));
//! let report = scheduler.run_jobs();
//! assert_eq!(report.panicked, 0);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, warn};

use crate::thread_queue::ThreadQueue;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of one [`Scheduler::run_jobs`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Jobs that returned normally.
    pub completed: usize,
    /// Jobs that panicked.
    pub panicked: usize,
    /// Most jobs observed running at once.
    pub peak_parallelism: usize,
}

/// Bounded-parallelism, thread-per-job dispatcher.
pub struct Scheduler {
    max_threads: usize,
    jobs: ThreadQueue<Job>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Scheduler {
    /// `max_threads == 0` uses the hardware parallelism.
    pub fn new(max_threads: usize) -> Self {
        let max_threads = match max_threads {
            0 => thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        Self {
            max_threads,
            jobs: ThreadQueue::new(),
        }
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Jobs queued and not yet started.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Queues a job for the next [`Scheduler::run_jobs`].
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs.push(Box::new(job));
    }

    /// Runs every queued job, including jobs queued by running jobs, and
    /// blocks until all have finished.
    pub fn run_jobs(&self) -> JobReport {
        let finished: ThreadQueue<bool> = ThreadQueue::new();
        let mut workers = Vec::new();
        let mut report = JobReport::default();
        let mut running = 0usize;
        let mut spawned = 0usize;

        loop {
            if running < self.max_threads {
                if let Some(job) = self.jobs.try_pop() {
                    let done = finished.clone();
                    let worker = thread::Builder::new()
                        .name(format!("job-{spawned}"))
                        .spawn(move || {
                            let ok = panic::catch_unwind(AssertUnwindSafe(job)).is_ok();
                            done.push(ok);
                        });
                    match worker {
                        Ok(worker) => workers.push(worker),
                        Err(e) => {
                            // The job was moved into the failed spawn; count it as lost.
                            warn!(error = %e, "failed to spawn job thread");
                            report.panicked += 1;
                            continue;
                        }
                    }
                    spawned += 1;
                    running += 1;
                    report.peak_parallelism = report.peak_parallelism.max(running);
                    continue;
                }
            }

            if running == 0 {
                break;
            }

            if finished.wait_pop() {
                report.completed += 1;
            } else {
                report.panicked += 1;
                warn!("scheduled job panicked");
            }
            running -= 1;
        }

        for worker in workers {
            let _ = worker.join();
        }

        debug!(
            completed = report.completed,
            panicked = report.panicked,
            peak = report.peak_parallelism,
            "jobs finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn runs_every_job() {
        let scheduler = Scheduler::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = counter.clone();
            scheduler.schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.pending(), 20);

        let report = scheduler.run_jobs();
        assert_eq!(report.completed, 20);
        assert_eq!(report.panicked, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn parallelism_is_bounded() {
        let scheduler = Scheduler::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let active = active.clone();
            let peak = peak.clone();
            scheduler.schedule(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        let report = scheduler.run_jobs();
        assert_eq!(report.completed, 8);
        assert!(report.peak_parallelism <= 2);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn panicking_job_does_not_stop_others() {
        let scheduler = Scheduler::new(2);
        scheduler.schedule(|| panic!("bad job"));
        scheduler.schedule(|| {});
        let report = scheduler.run_jobs();
        assert_eq!(report.completed, 1);
        assert_eq!(report.panicked, 1);
    }

    #[test]
    fn zero_threads_means_hardware_parallelism() {
        assert!(Scheduler::default().max_threads() >= 1);
    }

    #[test]
    fn empty_queue_returns_immediately() {
        assert_eq!(Scheduler::new(1).run_jobs(), JobReport::default());
    }
}

use std::num::NonZeroUsize;

use thiserror::Error;

use crate::shared::constants::FALLBACK_MATERIALIZER_WORKERS;

/// Queue slots per worker; bounds how far the feeder can run ahead.
const QUEUE_SLOTS_PER_WORKER: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerPoolError {
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

/// Fixed worker count over a fixed-capacity task queue.
///
/// Layout: `caller → bounded queue → N workers`. The caller blocks while the
/// queue is full, so at most `workers + queue_capacity` items are in flight.
/// Each `run` spawns scoped threads, so jobs may borrow from the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * QUEUE_SLOTS_PER_WORKER,
        }
    }

    /// One worker per detected processing unit, or the fallback when the
    /// count cannot be determined.
    pub fn for_available_cpus() -> Self {
        Self::new(available_cpus().unwrap_or(FALLBACK_MATERIALIZER_WORKERS))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Runs `job` once per item and returns when every worker has exited.
    ///
    /// A panicking job takes down only its own worker; remaining items are
    /// drained by the survivors. Items never picked up because every worker
    /// died are dropped.
    pub fn run<T, F>(&self, items: Vec<T>, job: F) -> Result<(), WorkerPoolError>
    where
        T: Send,
        F: Fn(T) + Sync,
    {
        if items.is_empty() {
            return Ok(());
        }

        let worker_count = self.workers.min(items.len());
        let (task_tx, task_rx) = crossbeam_channel::bounded::<T>(self.queue_capacity);
        let job = &job;

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..worker_count)
                .map(|_| {
                    let task_rx = task_rx.clone();
                    scope.spawn(move || {
                        for item in task_rx {
                            job(item);
                        }
                    })
                })
                .collect();
            drop(task_rx);

            for item in items {
                if task_tx.send(item).is_err() {
                    break;
                }
            }
            drop(task_tx);

            let panicked = handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(Result::is_err)
                .count();

            if panicked > 0 {
                Err(WorkerPoolError::WorkerPanicked(panicked))
            } else {
                Ok(())
            }
        })
    }
}

fn available_cpus() -> Option<usize> {
    std::thread::available_parallelism()
        .ok()
        .map(NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.queue_capacity(), 2);
    }

    #[test]
    fn test_cpu_pool_has_at_least_one_worker() {
        assert!(WorkerPool::for_available_cpus().workers() >= 1);
    }

    #[test]
    fn test_runs_every_item_once() {
        let pool = WorkerPool::new(4);
        let seen = Mutex::new(Vec::new());
        pool.run((0..50).collect(), |i: usize| {
            seen.lock().unwrap().push(i);
        })
        .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_input_is_noop() {
        let pool = WorkerPool::new(3);
        let calls = AtomicUsize::new(0);
        pool.run(Vec::<u8>::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrency_never_exceeds_worker_count() {
        let pool = WorkerPool::new(3);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        pool.run((0..20).collect(), |_: u32| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        })
        .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak}");
        assert!(peak >= 1);
    }

    #[test]
    fn test_panicking_job_is_reported_and_others_continue() {
        let pool = WorkerPool::new(2);
        let completed = AtomicUsize::new(0);

        let result = pool.run((0..10).collect(), |i: usize| {
            if i == 3 {
                panic!("boom");
            }
            completed.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(result, Err(WorkerPoolError::WorkerPanicked(1)));
        assert_eq!(completed.load(Ordering::SeqCst), 9);
    }
}

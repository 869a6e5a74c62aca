//! Fixed-or-scalable worker pool over a single FIFO task queue.
//!
//! # Architecture
//!
//! ```text
//!  submit() ──► Mutex<VecDeque<Task>> ◄── submit_with_callback()
//!                      │ Condvar
//!        ┌─────────────┼─────────────┐
//!        ▼             ▼             ▼
//!    worker 0      worker 1      worker N
//! ```
//!
//! Work is served in FIFO order by any free worker; no ordering is
//! guaranteed between tasks. Callers needing order impose it through
//! continuations or atomics on shared state.
//!
//! # Correctness Invariants
//!
//! - **Work-conserving**: shutdown drains the queue before workers exit, so
//!   an accepted task always runs.
//! - **Panic isolation**: a panicking task never takes its worker down; the
//!   panic is caught and logged.
//! - **No post-shutdown acceptance**: `submit` after `shutdown` fails with a
//!   recoverable error; it never silently drops work.

use crate::error::EngineError;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::error;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Hardware parallelism with a safe fallback.
///
/// Uses `std::thread::available_parallelism`, which respects cgroup and
/// affinity limits where the platform reports them.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

struct QueueState {
    tasks: VecDeque<Task>,
    stop: bool,
}

struct Inner {
    queue: Mutex<QueueState>,
    available: Condvar,
    /// Workers currently executing a task.
    active: AtomicUsize,
    /// Total spawned workers.
    worker_count: AtomicUsize,
}

/// Pool of worker threads draining a shared FIFO queue.
pub struct WorkerPool {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn a pool with `num_threads` workers (0 means hardware count).
    pub fn new(num_threads: usize) -> Self {
        let n = if num_threads == 0 {
            num_cpus()
        } else {
            num_threads
        };

        let pool = Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    stop: false,
                }),
                available: Condvar::new(),
                active: AtomicUsize::new(0),
                worker_count: AtomicUsize::new(0),
            }),
            workers: Mutex::new(Vec::new()),
        };
        pool.spawn_workers(n);
        pool
    }

    fn spawn_workers(&self, n: usize) {
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..n {
            let inner = Arc::clone(&self.inner);
            workers.push(std::thread::spawn(move || worker_loop(&inner)));
        }
        self.inner
            .worker_count
            .fetch_add(n, Ordering::Relaxed);
    }

    /// Grow the worker set to `new_size`. Shrinking is not supported; a
    /// smaller value is a no-op.
    pub fn scale(&self, new_size: usize) {
        let current = self.worker_count();
        if new_size > current {
            self.spawn_workers(new_size - current);
        }
    }

    /// Enqueue a parameterless unit of work.
    ///
    /// # Errors
    ///
    /// Returns `Err(task)` if `shutdown` has been called. The task is handed
    /// back so the caller can run it elsewhere or account for the rejection.
    pub fn submit(&self, task: Task) -> Result<(), Task> {
        {
            let mut state = self.queue_lock();
            if state.stop {
                return Err(task);
            }
            state.tasks.push_back(task);
        }
        self.inner.available.notify_one();
        Ok(())
    }

    /// Enqueue a producer task whose return value is handed to `callback`,
    /// which runs on a worker thread.
    ///
    /// # Errors
    ///
    /// [`EngineError::PoolShutdown`] if `shutdown` has been called.
    pub fn submit_with_callback<T, F, C>(&self, task: F, callback: C) -> Result<(), EngineError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        self.submit(Box::new(move || callback(task())))
            .map_err(|_| EngineError::PoolShutdown)
    }

    pub fn worker_count(&self) -> usize {
        self.inner.worker_count.load(Ordering::Relaxed)
    }

    /// Approximate count of workers not currently running a task.
    ///
    /// Racy by nature; callers use it for admission control only.
    pub fn idle_count(&self) -> usize {
        self.worker_count()
            .saturating_sub(self.inner.active.load(Ordering::Relaxed))
    }

    pub fn has_idle(&self) -> bool {
        self.idle_count() > 0 && !self.is_stopped()
    }

    fn is_stopped(&self) -> bool {
        self.queue_lock().stop
    }

    /// Signal stop, wake all workers, and await their exit. Queued tasks are
    /// drained before the workers leave. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.queue_lock();
            if state.stop {
                return;
            }
            state.stop = true;
        }
        self.inner.available.notify_all();

        let mut workers = self.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn queue_lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        // A worker panic cannot poison this mutex (panics are caught inside
        // tasks), but a poisoned lock would still be fatal; propagate intent.
        self.inner.queue.lock().unwrap()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &Inner) {
    loop {
        let task = {
            let mut state = inner.queue.lock().unwrap();
            loop {
                if let Some(task) = state.tasks.pop_front() {
                    break task;
                }
                if state.stop {
                    return;
                }
                state = inner.available.wait(state).unwrap();
            }
        };

        inner.active.fetch_add(1, Ordering::Relaxed);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!(panic = %panic_message(&payload), "worker task panicked");
        }
        inner.active.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_submitted_tasks() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            assert!(pool
                .submit(Box::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                    tx.send(()).unwrap();
                }))
                .is_ok());
        }
        for _ in 0..16 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn callback_receives_task_result() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();
        pool.submit_with_callback(|| 41 + 1, move |v| tx.send(v).unwrap())
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();

        assert!(pool.submit(Box::new(|| panic!("boom"))).is_ok());
        assert!(pool.submit(Box::new(move || tx.send(7).unwrap())).is_ok());

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn submit_after_shutdown_returns_task() {
        let pool = WorkerPool::new(1);
        pool.shutdown();
        assert!(pool.submit(Box::new(|| {})).is_err());
        let err = pool
            .submit_with_callback(|| 1, |_| {})
            .unwrap_err();
        assert!(matches!(err, EngineError::PoolShutdown));
    }

    #[test]
    fn shutdown_drains_queued_tasks() {
        let pool = WorkerPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            assert!(pool
                .submit(Box::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }))
                .is_ok());
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn scale_grows_worker_set() {
        let pool = WorkerPool::new(1);
        assert_eq!(pool.worker_count(), 1);
        pool.scale(4);
        assert_eq!(pool.worker_count(), 4);
        pool.scale(2); // no shrink
        assert_eq!(pool.worker_count(), 4);
    }

    #[test]
    fn idle_count_reflects_parked_workers() {
        let pool = WorkerPool::new(2);
        // Nothing submitted: both workers should eventually report idle.
        for _ in 0..100 {
            if pool.idle_count() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.idle_count(), 2);
        assert!(pool.has_idle());
    }
}

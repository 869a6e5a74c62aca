//! Writeback pipeline.
//!
//! A single dedicated dispatcher thread drains a queue of completed files.
//! When the worker pool reports idle workers the dispatcher hands a batch of
//! writes to the pool; otherwise it writes one file inline on its own thread,
//! so writeback makes progress even while every worker is busy matching.
//!
//! Files whose batch produced zero replacements are never rewritten; their
//! notification completes as a success no-op and the input stays
//! byte-for-byte unchanged on disk.
//!
//! The pipeline counts outstanding notifications so the processor can join
//! all writeback work before aggregating results; write failures recorded
//! here are folded into the per-file `ProcessingResult`.

use crate::pool::WorkerPool;
use crate::types::WritebackNotification;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

struct Shared {
    queue: Mutex<VecDeque<WritebackNotification>>,
    nonempty: Condvar,
    stop: AtomicBool,
    /// Notifications accepted but not yet fully written (queued, dispatched,
    /// or in flight on a pool worker).
    outstanding: AtomicUsize,
    drained_mtx: Mutex<()>,
    drained: Condvar,
    /// Write failures for this batch, keyed by path at aggregation time.
    failures: Mutex<Vec<(PathBuf, String)>>,
    pool: Arc<WorkerPool>,
}

impl Shared {
    /// Write one file and account for it, inline or on a pool worker.
    fn run_writeback(&self, item: WritebackNotification) {
        if let Err(e) = write_file(&item) {
            error!(path = %item.file.path.display(), error = %e, "writeback failed");
            self.failures
                .lock()
                .unwrap()
                .push((item.file.path.clone(), format!("Failed to write file: {e}")));
        }
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.drained_mtx.lock().unwrap();
            self.drained.notify_all();
        }
    }
}

/// Serialize one file's processed pages to disk.
///
/// Zero replacements means the file content is unchanged; skip the write
/// entirely so the input keeps its bytes and mtime.
fn write_file(item: &WritebackNotification) -> io::Result<()> {
    if item.total_replacements == 0 {
        return Ok(());
    }

    let file = &item.file;
    let total: usize = file
        .processed_pages
        .iter()
        .map(|slot| slot.get().map_or(0, String::len))
        .sum();

    let mut out = String::with_capacity(total);
    for slot in &file.processed_pages {
        let page = slot.get().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "missing processed page slot")
        })?;
        out.push_str(page);
    }

    std::fs::write(&file.path, out.as_bytes())?;
    debug!(
        path = %file.path.display(),
        replacements = item.total_replacements,
        "file rewritten"
    );
    Ok(())
}

/// Dedicated writeback dispatcher plus its shared queue.
pub struct WritebackPipeline {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable submission handle for page tasks.
#[derive(Clone)]
pub struct WritebackHandle {
    shared: Arc<Shared>,
}

impl WritebackHandle {
    /// Enqueue a completed file. Called by the page task that decremented
    /// `pages_remaining` to zero.
    pub fn notify(&self, item: WritebackNotification) {
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.push_back(item);
        }
        self.shared.nonempty.notify_one();
    }
}

impl WritebackPipeline {
    /// Start the dispatcher thread.
    pub fn start(pool: Arc<WorkerPool>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            nonempty: Condvar::new(),
            stop: AtomicBool::new(false),
            outstanding: AtomicUsize::new(0),
            drained_mtx: Mutex::new(()),
            drained: Condvar::new(),
            failures: Mutex::new(Vec::new()),
            pool,
        });

        let dispatcher = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("writeback".into())
            .spawn(move || dispatch_loop(&dispatcher))
            .expect("failed to spawn writeback thread");

        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn handle(&self) -> WritebackHandle {
        WritebackHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block until every accepted notification has been written.
    pub fn wait_drained(&self) {
        let mut guard = self.shared.drained_mtx.lock().unwrap();
        while self.shared.outstanding.load(Ordering::Acquire) != 0 {
            guard = self.shared.drained.wait(guard).unwrap();
        }
    }

    /// Collect and clear the write failures recorded since the last call.
    pub fn take_failures(&self) -> Vec<(PathBuf, String)> {
        std::mem::take(&mut *self.shared.failures.lock().unwrap())
    }

    /// Signal stop, wake the dispatcher, and join it. Idempotent.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.nonempty.notify_all();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WritebackPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_loop(shared: &Arc<Shared>) {
    loop {
        let mut queue = shared.queue.lock().unwrap();
        while queue.is_empty() && !shared.stop.load(Ordering::Acquire) {
            queue = shared.nonempty.wait(queue).unwrap();
        }
        if shared.stop.load(Ordering::Acquire) && queue.is_empty() {
            break;
        }

        if shared.pool.has_idle() && !queue.is_empty() {
            // Hand up to idle_count items to the pool in one go.
            let take = shared.pool.idle_count().max(1).min(queue.len());
            let batch: Vec<_> = queue.drain(..take).collect();
            drop(queue);

            for item in batch {
                let task_shared = Arc::clone(shared);
                let submitted = shared
                    .pool
                    .submit(Box::new(move || task_shared.run_writeback(item)));
                if let Err(task) = submitted {
                    // Pool already stopped; nothing left but to write here.
                    debug!("pool rejected writeback task, writing inline");
                    task();
                }
            }
        } else if let Some(item) = queue.pop_front() {
            drop(queue);
            shared.run_writeback(item);
        }
    }
}

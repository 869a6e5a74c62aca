//! Batch orchestration.
//!
//! # Architecture
//!
//! ```text
//!  paths ──► preprocess (load + decode + scan + page)   [worker]
//!                │ continuation                          [worker]
//!                ├── per-page fan-out ──► process_page   [workers]
//!                │                             │
//!                │              pages_remaining == 0 ──► writeback queue
//!                ▼
//!        pending counter ──► 0 ──► wake caller ──► join writeback ──► aggregate
//! ```
//!
//! One global pending counter tracks unfinished tasks for the whole batch.
//! It starts at the number of files; each preprocess continuation swaps its
//! own slot for the file's page tasks by adding `num_pages - 1`, and every
//! page task decrements by one. The caller sleeps until the counter hits
//! zero, then joins the writeback pipeline so write failures are visible in
//! the aggregated results.
//!
//! # Ordering guarantees
//!
//! - Page tasks for one file run in arbitrary order; output assembly is
//!   deterministic because slots are keyed by page id.
//! - A file's writeback happens strictly after its last page completes:
//!   only the task that decrements `pages_remaining` to zero enqueues it.
//! - Results are returned in input order via per-index slots.

use crate::error::EngineError;
use crate::matcher::Matcher;
use crate::pager::paginate;
use crate::pool::{num_cpus, panic_message, WorkerPool};
use crate::protect::ProtectedScanner;
use crate::types::{
    FileContent, Page, PageResult, ProcessingResult, ProtectedRegionSpec, ReplacementMap,
    WritebackNotification,
};
use crate::writeback::{WritebackHandle, WritebackPipeline};
use ahash::AHashMap;
use memchr::memchr_iter;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use tracing::debug;

/// Raw bytes inspected by the binary-file heuristic.
const BINARY_SAMPLE_LEN: usize = 1024;

/// Message surfaced for unreadable, binary, or empty inputs.
const LOAD_FAILURE_MSG: &str = "Failed to load file content";

/// The public entry point: owns the worker pool, the writeback pipeline,
/// and the compiled rule state shared by every task.
pub struct Processor {
    pool: Arc<WorkerPool>,
    writeback: WritebackPipeline,
    matcher: Arc<Matcher>,
    scanner: Arc<ProtectedScanner>,
}

impl Processor {
    /// Compile the rule state and start the pool (one worker until the
    /// first batch scales it) plus the writeback dispatcher.
    pub fn new(replacements: &ReplacementMap, protected_regions: Vec<ProtectedRegionSpec>) -> Self {
        let pool = Arc::new(WorkerPool::new(1));
        let writeback = WritebackPipeline::start(Arc::clone(&pool));
        Self {
            pool,
            writeback,
            matcher: Arc::new(Matcher::from_map(replacements)),
            scanner: Arc::new(ProtectedScanner::new(protected_regions)),
        }
    }

    /// Process a batch of files with at most `max_threads` workers
    /// (0 means auto). Returns one result per input file, in input order.
    ///
    /// # Errors
    ///
    /// [`EngineError::PoolShutdown`] if the pool rejected a file task; the
    /// batch is aborted. Per-file failures are data, not errors.
    pub fn process(
        &self,
        files: &[PathBuf],
        max_threads: usize,
    ) -> Result<Vec<ProcessingResult>, EngineError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let num_files = files.len();
        let hw_cap = (num_cpus() * 3 / 2).max(1);
        self.pool
            .scale(resolve_thread_count(num_files, max_threads, hw_cap));

        let batch = Arc::new(Batch::new(num_files));

        for (index, path) in files.iter().enumerate() {
            let path = path.clone();
            let matcher = Arc::clone(&self.matcher);
            let scanner = Arc::clone(&self.scanner);
            let pool = Arc::clone(&self.pool);
            let wb = self.writeback.handle();
            let batch_cb = Arc::clone(&batch);

            self.pool.submit_with_callback(
                move || preprocess(&path, &scanner),
                move |preprocessed| {
                    fan_out_pages(preprocessed, index, &batch_cb, &pool, &matcher, &wb);
                },
            )?;
        }

        batch.wait();
        self.writeback.wait_drained();

        let mut write_failures: AHashMap<PathBuf, String> =
            self.writeback.take_failures().into_iter().collect();

        let mut results = Vec::with_capacity(num_files);
        for (index, path) in files.iter().enumerate() {
            results.push(aggregate_file(
                path,
                batch.slots[index].get(),
                &mut write_failures,
            ));
        }
        Ok(results)
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        // Waiter first, then the pool it dispatches to.
        self.writeback.stop();
        self.pool.shutdown();
    }
}

/// Pool size for one batch: auto mode scales with the batch, both modes are
/// capped at 1.5x hardware concurrency.
fn resolve_thread_count(num_files: usize, max_threads: usize, hw_cap: usize) -> usize {
    if max_threads == 0 {
        (num_files * 2).clamp(1, hw_cap)
    } else {
        max_threads.min(hw_cap).max(1)
    }
}

// ============================================================================
// Batch state
// ============================================================================

/// Per-file state published by the preprocess continuation.
struct LoadedFile {
    file: Arc<FileContent>,
    page_results: Arc<Vec<OnceLock<PageResult>>>,
}

/// Shared coordination state for one `process` call.
struct Batch {
    /// Unfinished tasks; the batch is complete when this reaches zero.
    pending: AtomicUsize,
    done_mtx: Mutex<()>,
    done: Condvar,
    /// Slot `i` belongs to input file `i`; set once by its continuation.
    slots: Vec<OnceLock<LoadedFile>>,
}

impl Batch {
    fn new(num_files: usize) -> Self {
        let mut slots = Vec::with_capacity(num_files);
        slots.resize_with(num_files, OnceLock::new);
        Self {
            pending: AtomicUsize::new(num_files),
            done_mtx: Mutex::new(()),
            done: Condvar::new(),
            slots,
        }
    }

    fn complete_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.done_mtx.lock().unwrap();
            self.done.notify_all();
        }
    }

    fn wait(&self) {
        let mut guard = self.done_mtx.lock().unwrap();
        while self.pending.load(Ordering::Acquire) != 0 {
            guard = self.done.wait(guard).unwrap();
        }
    }
}

// ============================================================================
// Preprocess
// ============================================================================

/// Binary heuristic: text iff NUL bytes are under 1% of the first 1 KiB.
fn is_text(raw: &[u8]) -> bool {
    let sample = &raw[..raw.len().min(BINARY_SAMPLE_LEN)];
    let nul_count = memchr_iter(0, sample).count();
    nul_count * 100 / sample.len().max(1) < 1
}

/// Load, decode, scan, and page one file.
///
/// Returns `None` for I/O errors, binary files, and empty files; the
/// aggregation surfaces all three as a failed load.
fn preprocess(path: &Path, scanner: &ProtectedScanner) -> Option<(Arc<FileContent>, Vec<Page>)> {
    let raw = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "read failed");
            return None;
        }
    };
    if !is_text(&raw) {
        debug!(path = %path.display(), "binary file skipped");
        return None;
    }

    let decoded = String::from_utf8_lossy(&raw);
    let content: Box<[char]> = decoded.chars().collect();
    let intervals = scanner.scan(&content);
    let spans = paginate(&content, &intervals);
    if spans.is_empty() {
        return None;
    }

    let file = Arc::new(FileContent::new(
        path.to_path_buf(),
        content,
        intervals,
        spans.len(),
    ));
    let pages = spans
        .into_iter()
        .enumerate()
        .map(|(id, span)| Page {
            owner: Arc::clone(&file),
            id,
            start_pos: span.start_pos,
            end_pos: span.end_pos,
            is_protected: span.is_protected,
        })
        .collect();
    Some((file, pages))
}

/// Continuation of the preprocess task: publish the file slot and submit one
/// task per page, adjusting the pending counter by `num_pages - 1`.
fn fan_out_pages(
    preprocessed: Option<(Arc<FileContent>, Vec<Page>)>,
    index: usize,
    batch: &Arc<Batch>,
    pool: &Arc<WorkerPool>,
    matcher: &Arc<Matcher>,
    wb: &WritebackHandle,
) {
    let Some((file, pages)) = preprocessed else {
        batch.complete_one();
        return;
    };

    let num_pages = pages.len();
    let page_results: Arc<Vec<OnceLock<PageResult>>> = {
        let mut slots = Vec::with_capacity(num_pages);
        slots.resize_with(num_pages, OnceLock::new);
        Arc::new(slots)
    };
    let _ = batch.slots[index].set(LoadedFile {
        file,
        page_results: Arc::clone(&page_results),
    });

    batch.pending.fetch_add(num_pages - 1, Ordering::AcqRel);

    for page in pages {
        let page_id = page.id;
        let matcher = Arc::clone(matcher);
        let wb = wb.clone();
        let page_results_task = Arc::clone(&page_results);
        let batch_task = Arc::clone(batch);

        let submitted = pool.submit(Box::new(move || {
            process_page(page, &matcher, &wb, &page_results_task);
            batch_task.complete_one();
        }));
        if submitted.is_err() {
            let _ = page_results[page_id].set(PageResult::failure(
                page_id,
                "worker pool shut down".to_string(),
            ));
            batch.complete_one();
        }
    }
}

// ============================================================================
// Page processing
// ============================================================================

/// Run the matcher over one page (or pass a protected page through), store
/// the slice in the owner's slot, and trigger writeback on the last page.
///
/// A panic converts to a failed [`PageResult`]; the file's `pages_remaining`
/// is then left above zero on purpose, so a partially failed file is never
/// written back.
fn process_page(
    page: Page,
    matcher: &Matcher,
    writeback: &WritebackHandle,
    page_results: &[OnceLock<PageResult>],
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let text = &page.owner.content[page.start_pos..page.end_pos];
        if page.is_protected {
            (text.iter().collect::<String>(), 0)
        } else {
            matcher.apply(text)
        }
    }));

    match outcome {
        Ok((processed, replacements)) => {
            let owner = &page.owner;
            owner
                .total_replacements
                .fetch_add(replacements, Ordering::Relaxed);
            let _ = owner.processed_pages[page.id].set(processed);
            let _ = page_results[page.id].set(PageResult::success(page.id, replacements));

            if owner.pages_remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let total = owner.total_replacements.load(Ordering::Acquire);
                writeback.notify(WritebackNotification {
                    file: Arc::clone(owner),
                    total_replacements: total,
                });
            }
        }
        Err(payload) => {
            let msg = format!("Page processing exception: {}", panic_message(&payload));
            let _ = page_results[page.id].set(PageResult::failure(page.id, msg));
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

fn aggregate_file(
    path: &Path,
    loaded: Option<&LoadedFile>,
    write_failures: &mut AHashMap<PathBuf, String>,
) -> ProcessingResult {
    let Some(loaded) = loaded else {
        return ProcessingResult {
            file_path: path.to_path_buf(),
            ok: false,
            err_msg: LOAD_FAILURE_MSG.to_string(),
            replacement_count: 0,
        };
    };

    let mut ok = true;
    let mut err_msg = String::new();
    let mut replacement_count = 0usize;

    for (page_id, slot) in loaded.page_results.iter().enumerate() {
        match slot.get() {
            Some(page) if page.ok => replacement_count += page.replacement_count,
            Some(page) => {
                ok = false;
                append_error(&mut err_msg, &format!("Page {}: {}", page.page_id, page.err_msg));
            }
            None => {
                // Unreachable under the counter protocol; surface rather
                // than silently claim success.
                ok = false;
                append_error(&mut err_msg, &format!("Page {page_id}: result missing"));
            }
        }
    }

    if let Some(write_err) = write_failures.remove(path) {
        ok = false;
        append_error(&mut err_msg, &write_err);
    }

    ProcessingResult {
        file_path: path.to_path_buf(),
        ok,
        err_msg,
        replacement_count,
    }
}

fn append_error(buf: &mut String, msg: &str) {
    if !buf.is_empty() {
        buf.push_str("; ");
    }
    buf.push_str(msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_heuristic_accepts_plain_text() {
        assert!(is_text(b"hello, world\n"));
        assert!(is_text("hëllo wörld, 你好".as_bytes()));
    }

    #[test]
    fn text_heuristic_rejects_nul_heavy_content() {
        let mut buf = vec![0u8; 32];
        buf.extend_from_slice(&[b'a'; 992]);
        assert!(!is_text(&buf));
    }

    #[test]
    fn text_heuristic_tolerates_sub_percent_nuls() {
        // 1 NUL in 1024 bytes: 100/1024 = 0 (integer), under the threshold.
        let mut buf = vec![b'a'; 1023];
        buf.push(0);
        assert!(is_text(&buf));
    }

    #[test]
    fn text_heuristic_empty_input() {
        assert!(is_text(b""));
    }

    #[test]
    fn thread_count_auto_scales_with_batch() {
        assert_eq!(resolve_thread_count(1, 0, 12), 2);
        assert_eq!(resolve_thread_count(3, 0, 12), 6);
        assert_eq!(resolve_thread_count(100, 0, 12), 12);
    }

    #[test]
    fn thread_count_explicit_is_capped() {
        assert_eq!(resolve_thread_count(100, 4, 12), 4);
        assert_eq!(resolve_thread_count(100, 64, 12), 12);
    }

    #[test]
    fn thread_count_never_zero() {
        assert_eq!(resolve_thread_count(1, 0, 1), 1);
        assert_eq!(resolve_thread_count(0, 0, 8), 1);
    }
}

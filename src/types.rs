//! Shared data contracts for the rewriting engine.
//!
//! Everything here is either immutable after construction or carries its own
//! synchronization (atomics, `OnceLock` slots). A [`FileContent`] is built by
//! the preprocess task, wrapped in an `Arc`, and then shared read-only by
//! every page task and by the writeback item; the last reference dropping
//! after writeback frees it.

use ahash::AHashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, OnceLock};

/// Configured rewrite rules: pattern -> replacement.
///
/// Patterns are non-empty sequences of Unicode scalar values and pairwise
/// distinct (map keys). Patterns may share prefixes; the matcher applies the
/// longest match at each position.
pub type ReplacementMap = AHashMap<String, String>;

/// One configured protected-region kind: a `(start, end)` marker pair.
///
/// An empty `end` marker denotes literal-content protection: the protected
/// interval is exactly the occurrence of `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedRegionSpec {
    /// Start marker, in scalar values. Never empty.
    pub start: Vec<char>,
    /// End marker, in scalar values. Empty for literal-content protection.
    pub end: Vec<char>,
}

impl ProtectedRegionSpec {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.chars().collect(),
            end: end.chars().collect(),
        }
    }
}

/// A concrete occurrence of a protected region in one file.
///
/// All offsets are in scalar values, measured against the full file content.
/// Per-file interval lists are sorted by `start_first` and pairwise
/// non-overlapping by construction of the scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtectedInterval {
    /// Index of the first scalar of the start marker.
    pub start_first: usize,
    /// Index of the last scalar of the end marker.
    pub end_last: usize,
    /// Start marker length in scalars.
    pub start_len: usize,
    /// End marker length in scalars. Zero for literal-content protection.
    pub end_len: usize,
}

impl ProtectedInterval {
    /// First position after the interval.
    #[inline]
    pub fn skip_to(&self) -> usize {
        self.end_last + 1
    }
}

/// Fully loaded content of one input file plus its processing state.
///
/// # Shared-resource policy
///
/// - `content` and `protected_intervals`: write-once during preprocess,
///   read-only afterwards; shared without locking.
/// - `processed_pages[i]`: the task owning page `i` is the only writer; the
///   `OnceLock` slot plus the release decrement of `pages_remaining` give the
///   writeback reader the happens-before it needs. No per-slot lock.
/// - `pages_remaining`, `total_replacements`: plain atomic counters.
#[derive(Debug)]
pub struct FileContent {
    /// Filesystem path the content was loaded from (and is written back to).
    pub path: PathBuf,
    /// Full decoded text, immutable after load.
    pub content: Box<[char]>,
    /// Sorted, non-overlapping protected intervals for this file.
    pub protected_intervals: Vec<ProtectedInterval>,
    /// Page tasks not yet completed. The task that decrements this to zero
    /// enqueues the writeback notification.
    pub pages_remaining: AtomicUsize,
    /// Replacements accumulated across page tasks.
    pub total_replacements: AtomicUsize,
    /// Dense per-page output slots; slot `i` is assigned exactly once by the
    /// task owning page `i`.
    pub processed_pages: Vec<OnceLock<String>>,
}

impl FileContent {
    /// Build the content record for one file.
    ///
    /// `num_pages` fixes the size of the dense output buffer and the initial
    /// value of `pages_remaining`; it must equal the page count produced by
    /// the pager for this content.
    pub fn new(
        path: PathBuf,
        content: Box<[char]>,
        protected_intervals: Vec<ProtectedInterval>,
        num_pages: usize,
    ) -> Self {
        let mut processed_pages = Vec::with_capacity(num_pages);
        processed_pages.resize_with(num_pages, OnceLock::new);
        Self {
            path,
            content,
            protected_intervals,
            pages_remaining: AtomicUsize::new(num_pages),
            total_replacements: AtomicUsize::new(0),
            processed_pages,
        }
    }
}

/// Descriptor of one contiguous slice of a file assigned to a single worker.
///
/// Page ids are dense `0..n` and pages tile the content exactly:
/// `pages[0].start_pos == 0`, `pages[i].end_pos == pages[i+1].start_pos`,
/// and the last page ends at `content.len()`.
#[derive(Clone, Debug)]
pub struct Page {
    /// Shared handle on the owning file.
    pub owner: Arc<FileContent>,
    /// Dense page id; indexes `owner.processed_pages`.
    pub id: usize,
    /// First scalar of the page (inclusive).
    pub start_pos: usize,
    /// One past the last scalar of the page (exclusive).
    pub end_pos: usize,
    /// Whether this page covers exactly one protected interval and must be
    /// passed through byte-identically.
    pub is_protected: bool,
}

/// Outcome of one page task. Processed text lives in the owner's
/// `processed_pages` slot, not here.
#[derive(Clone, Debug)]
pub struct PageResult {
    pub page_id: usize,
    pub replacement_count: usize,
    pub ok: bool,
    pub err_msg: String,
}

impl PageResult {
    pub fn success(page_id: usize, replacement_count: usize) -> Self {
        Self {
            page_id,
            replacement_count,
            ok: true,
            err_msg: String::new(),
        }
    }

    pub fn failure(page_id: usize, err_msg: String) -> Self {
        Self {
            page_id,
            replacement_count: 0,
            ok: false,
            err_msg,
        }
    }
}

/// Per-input-file outcome, returned to the caller in input order.
#[derive(Clone, Debug)]
pub struct ProcessingResult {
    pub file_path: PathBuf,
    pub ok: bool,
    pub err_msg: String,
    pub replacement_count: usize,
}

/// Handed to the writeback pipeline when a file's last page completes.
#[derive(Clone, Debug)]
pub struct WritebackNotification {
    pub file: Arc<FileContent>,
    pub total_replacements: usize,
}

//! Page carving.
//!
//! Splits file content into bounded-size spans that tile it exactly, so page
//! tasks can run concurrently and the writeback can reassemble output by page
//! id alone.
//!
//! # Invariants produced
//!
//! - Spans tile the content: no gaps, no overlaps, full coverage.
//! - No non-protected span overlaps any protected interval.
//! - Every protected interval is covered by exactly one protected span.
//! - Protected spans may be arbitrarily large (they are never split);
//!   non-protected spans stay within `PAGE_SIZE` plus boundary slack.
//!
//! Boundary snapping prefers a newline, then a space, inside the last
//! [`SNAP_WINDOW`] scalars of the tentative page, so pages break at natural
//! places and the cut never lands mid-word unless the window has neither.

use crate::types::ProtectedInterval;

/// Target page size in scalar values.
pub const PAGE_SIZE: usize = 16 * 1024;

/// How far back from a tentative page end to look for a newline or space.
pub const SNAP_WINDOW: usize = 100;

/// A page boundary candidate produced by [`paginate`]; the processor attaches
/// the owning file handle to build the final `Page` descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSpan {
    pub start_pos: usize,
    pub end_pos: usize,
    pub is_protected: bool,
}

/// Carve `content` into spans, honoring `intervals` (sorted, non-overlapping).
///
/// Walks a cursor and an interval index together. When the cursor sits on an
/// interval start, the whole interval becomes one protected span. Otherwise
/// the tentative end is clamped to the next interval start, then snapped
/// leftward to a newline or space, then re-clamped. Clamping guarantees the
/// cursor always lands exactly on interval starts, so intervals can never be
/// split across spans.
///
/// Empty content yields no spans.
pub fn paginate(content: &[char], intervals: &[ProtectedInterval]) -> Vec<PageSpan> {
    paginate_with(content, intervals, PAGE_SIZE)
}

/// [`paginate`] with an explicit target page size, for tests and tuning.
pub fn paginate_with(
    content: &[char],
    intervals: &[ProtectedInterval],
    page_size: usize,
) -> Vec<PageSpan> {
    debug_assert!(page_size > 0, "page_size must be > 0");
    let len = content.len();
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut k = 0usize;

    while start < len {
        if k < intervals.len() && intervals[k].start_first == start {
            spans.push(PageSpan {
                start_pos: start,
                end_pos: intervals[k].skip_to(),
                is_protected: true,
            });
            start = intervals[k].skip_to();
            k += 1;
            continue;
        }

        let mut end = (start + page_size).min(len);
        if k < intervals.len() && end > intervals[k].start_first {
            end = intervals[k].start_first;
        }

        // Snap to a natural boundary unless the cut already sits on the next
        // interval start (which must be preserved exactly).
        if end < len && (k >= intervals.len() || end < intervals[k].start_first) {
            let window_start = start.max(end.saturating_sub(SNAP_WINDOW));
            if let Some(p) = rfind(content, window_start, end, '\n') {
                end = p + 1;
            } else if let Some(p) = rfind(content, window_start, end, ' ') {
                end = p + 1;
            }
            if k < intervals.len() && end > intervals[k].start_first {
                end = intervals[k].start_first;
            }
        }

        spans.push(PageSpan {
            start_pos: start,
            end_pos: end,
            is_protected: false,
        });
        start = end;
    }

    spans
}

/// Last occurrence of `needle` in `content[from..to)`.
#[inline]
fn rfind(content: &[char], from: usize, to: usize, needle: char) -> Option<usize> {
    content[from..to]
        .iter()
        .rposition(|&c| c == needle)
        .map(|p| from + p)
}

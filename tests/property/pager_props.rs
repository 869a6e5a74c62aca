//! Pager invariants over generated content and protected intervals.
//!
//! Small page sizes force frequent splits so the boundary logic is actually
//! exercised; the invariants themselves are size-independent.

use proptest::prelude::*;
use rewriter_rs::{paginate_with, ProtectedRegionSpec, ProtectedScanner};

/// Text over a tiny alphabet with backtick-delimited protected spans mixed in.
fn text_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            8 => Just('a'),
            3 => Just(' '),
            2 => Just('\n'),
            2 => Just('`'),
        ],
        0..600,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn spans_tile_content_exactly(text in text_strategy(), page_size in 1usize..64) {
        let chars: Vec<char> = text.chars().collect();
        let scanner = ProtectedScanner::new(vec![ProtectedRegionSpec::new("`", "`")]);
        let intervals = scanner.scan(&chars);
        let spans = paginate_with(&chars, &intervals, page_size);

        if chars.is_empty() {
            prop_assert!(spans.is_empty());
            return Ok(());
        }

        prop_assert_eq!(spans[0].start_pos, 0);
        for w in spans.windows(2) {
            prop_assert_eq!(w[0].end_pos, w[1].start_pos);
        }
        for span in &spans {
            prop_assert!(span.start_pos < span.end_pos, "empty span {:?}", span);
        }
        prop_assert_eq!(spans.last().unwrap().end_pos, chars.len());
    }

    #[test]
    fn protected_intervals_isolated(text in text_strategy(), page_size in 1usize..64) {
        let chars: Vec<char> = text.chars().collect();
        let scanner = ProtectedScanner::new(vec![ProtectedRegionSpec::new("`", "`")]);
        let intervals = scanner.scan(&chars);
        let spans = paginate_with(&chars, &intervals, page_size);

        // Every interval is exactly one protected span.
        let protected: Vec<_> = spans.iter().filter(|s| s.is_protected).collect();
        prop_assert_eq!(protected.len(), intervals.len());
        for (span, iv) in protected.iter().zip(intervals.iter()) {
            prop_assert_eq!(span.start_pos, iv.start_first);
            prop_assert_eq!(span.end_pos, iv.skip_to());
        }

        // No unprotected span overlaps any interval.
        for span in spans.iter().filter(|s| !s.is_protected) {
            for iv in &intervals {
                let disjoint = span.end_pos <= iv.start_first || span.start_pos >= iv.skip_to();
                prop_assert!(disjoint, "span {:?} overlaps interval {:?}", span, iv);
            }
        }
    }

    #[test]
    fn unprotected_spans_respect_size_bound(text in text_strategy(), page_size in 1usize..64) {
        let chars: Vec<char> = text.chars().collect();
        let scanner = ProtectedScanner::new(vec![ProtectedRegionSpec::new("`", "`")]);
        let intervals = scanner.scan(&chars);
        let spans = paginate_with(&chars, &intervals, page_size);

        for span in spans.iter().filter(|s| !s.is_protected) {
            prop_assert!(
                span.end_pos - span.start_pos <= page_size,
                "span {:?} exceeds page size {}",
                span,
                page_size
            );
        }
    }
}

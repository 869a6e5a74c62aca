//! Matcher soundness against a naive reference implementation.
//!
//! The reference tries every pattern at every position and picks the
//! longest one that matches; the trie must agree exactly, both on output
//! text and on replacement counts, for arbitrary pattern sets including
//! shared prefixes.

use proptest::prelude::*;
use rewriter_rs::{Matcher, ReplacementMap};

/// Longest-match left-to-right with no overlap, the slow and obvious way.
fn reference_apply(rules: &ReplacementMap, text: &[char]) -> (String, usize) {
    let compiled: Vec<(Vec<char>, &str)> = rules
        .iter()
        .map(|(f, t)| (f.chars().collect(), t.as_str()))
        .collect();

    let mut out = String::new();
    let mut count = 0usize;
    let mut pos = 0usize;

    while pos < text.len() {
        let mut best: Option<(usize, &str)> = None;
        for (pattern, replacement) in &compiled {
            if pattern.is_empty() || pattern.len() > text.len() - pos {
                continue;
            }
            if text[pos..pos + pattern.len()] == pattern[..]
                && best.map_or(true, |(len, _)| pattern.len() > len)
            {
                best = Some((pattern.len(), replacement));
            }
        }
        match best {
            Some((len, replacement)) => {
                out.push_str(replacement);
                pos += len;
                count += 1;
            }
            None => {
                out.push(text[pos]);
                pos += 1;
            }
        }
    }
    (out, count)
}

fn pattern_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just('a'), Just('b'), Just('c')], 1..4)
        .prop_map(|chars| chars.into_iter().collect())
}

fn rules_strategy() -> impl Strategy<Value = ReplacementMap> {
    proptest::collection::hash_map(pattern_strategy(), "[xyz]{0,3}", 0..8)
        .prop_map(|m| m.into_iter().collect())
}

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![Just('a'), Just('b'), Just('c'), Just(' '), Just('\n')],
        0..200,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn trie_agrees_with_reference(rules in rules_strategy(), text in text_strategy()) {
        let chars: Vec<char> = text.chars().collect();
        let matcher = Matcher::from_map(&rules);
        let (got_text, got_count) = matcher.apply(&chars);
        let (want_text, want_count) = reference_apply(&rules, &chars);
        prop_assert_eq!(got_text, want_text);
        prop_assert_eq!(got_count, want_count);
    }

    #[test]
    fn match_free_text_is_unchanged(text in "[xyz ]{0,100}") {
        // Patterns are drawn from {a,b,c}; text from {x,y,z, } can't match.
        let rules: ReplacementMap =
            [("abc".to_string(), "Q".to_string())].into_iter().collect();
        let chars: Vec<char> = text.chars().collect();
        let (out, count) = Matcher::from_map(&rules).apply(&chars);
        prop_assert_eq!(out, text);
        prop_assert_eq!(count, 0);
    }

    #[test]
    fn replacements_never_rescanned(n in 1usize..50) {
        // "a" -> "aa" doubles each 'a' exactly once per input scalar.
        let rules: ReplacementMap =
            [("a".to_string(), "aa".to_string())].into_iter().collect();
        let text: Vec<char> = vec!['a'; n];
        let (out, count) = Matcher::from_map(&rules).apply(&text);
        prop_assert_eq!(out.len(), 2 * n);
        prop_assert_eq!(count, n);
    }
}

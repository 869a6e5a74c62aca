//! Compiled multi-pattern matcher.
//!
//! A trie over scalar-value edges, applied in a single left-to-right pass
//! with longest-match-at-position semantics and no overlap: after a
//! replacement of length `L` at position `i`, matching resumes at `i + L`.
//!
//! Verbatim runs between matches are coalesced into `[copy_start, copy_end)`
//! slices and flushed only when a replacement fires or at end of input, so a
//! match-free page costs one bulk append instead of per-scalar pushes.
//!
//! The matcher never inspects protected state; the pager guarantees that
//! protected content lives in separate pages that skip matching entirely.
//!
//! Failure links are deliberately absent. The match discipline restarts the
//! trie walk at each position, which already yields the specified semantics
//! for arbitrary pattern sets, shared prefixes included.

use crate::types::ReplacementMap;
use ahash::AHashMap;

/// Root node index in the arena.
const ROOT: u32 = 0;

/// One trie node. Nodes live in a flat arena and refer to each other by
/// index, so the whole index is a pair of contiguous allocations plus the
/// per-node edge maps.
#[derive(Debug, Default)]
struct Node {
    /// Outgoing edges, one per scalar value.
    children: AHashMap<char, u32>,
    /// Present iff this node terminates a pattern.
    replacement: Option<String>,
    /// Scalars consumed by the terminating pattern; 0 if none.
    pattern_len: usize,
}

/// Compiled index over a [`ReplacementMap`].
#[derive(Debug)]
pub struct Matcher {
    nodes: Vec<Node>,
}

impl Matcher {
    /// Build the index from a replacement map. Empty patterns are skipped.
    pub fn from_map(map: &ReplacementMap) -> Self {
        let mut nodes = vec![Node::default()];

        for (pattern, replacement) in map {
            if pattern.is_empty() {
                continue;
            }

            let mut cur = ROOT;
            let mut len = 0usize;
            for ch in pattern.chars() {
                len += 1;
                cur = match nodes[cur as usize].children.get(&ch).copied() {
                    Some(next) => next,
                    None => {
                        let next = nodes.len() as u32;
                        nodes.push(Node::default());
                        nodes[cur as usize].children.insert(ch, next);
                        next
                    }
                };
            }
            let node = &mut nodes[cur as usize];
            node.replacement = Some(replacement.clone());
            node.pattern_len = len;
        }

        Self { nodes }
    }

    /// True if no pattern was compiled in.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Apply all replacements to `text`, returning the rewritten buffer and
    /// the number of replacements applied.
    ///
    /// At each position the trie is walked as far as the text allows,
    /// remembering the deepest terminal node seen; if one was found its
    /// replacement is emitted and the cursor advances by the pattern length,
    /// otherwise the scalar is copied verbatim and the cursor advances by 1.
    ///
    /// Empty text or an empty index yields `(unchanged, 0)`.
    pub fn apply(&self, text: &[char]) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut count = 0usize;

        if self.is_empty() {
            out.extend(text.iter());
            return (out, 0);
        }

        let mut pos = 0usize;
        let mut copy_start = 0usize;
        let mut copy_end = 0usize;

        while pos < text.len() {
            // Longest accepted pattern starting at `pos`.
            let mut best: Option<(usize, &str)> = None;
            let mut cur = ROOT;
            for &ch in &text[pos..] {
                match self.nodes[cur as usize].children.get(&ch) {
                    Some(&next) => cur = next,
                    None => break,
                }
                let node = &self.nodes[cur as usize];
                if let Some(rep) = node.replacement.as_deref() {
                    best = Some((node.pattern_len, rep));
                }
            }

            match best {
                Some((len, rep)) => {
                    if copy_end > copy_start {
                        out.extend(text[copy_start..copy_end].iter());
                    }
                    out.push_str(rep);
                    pos += len;
                    copy_start = pos;
                    copy_end = pos;
                    count += 1;
                }
                None => {
                    copy_end = pos + 1;
                    pos += 1;
                }
            }
        }

        if copy_end > copy_start {
            out.extend(text[copy_start..copy_end].iter());
        }

        (out, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(rules: &[(&str, &str)]) -> Matcher {
        let map: ReplacementMap = rules
            .iter()
            .map(|(f, t)| (f.to_string(), t.to_string()))
            .collect();
        Matcher::from_map(&map)
    }

    fn apply(rules: &[(&str, &str)], input: &str) -> (String, usize) {
        let chars: Vec<char> = input.chars().collect();
        matcher(rules).apply(&chars)
    }

    #[test]
    fn empty_rules_pass_through() {
        let (out, n) = apply(&[], "hello, world.");
        assert_eq!(out, "hello, world.");
        assert_eq!(n, 0);
    }

    #[test]
    fn empty_text() {
        let (out, n) = apply(&[(",", "，")], "");
        assert_eq!(out, "");
        assert_eq!(n, 0);
    }

    #[test]
    fn basic_replace() {
        let (out, n) = apply(&[(",", "，"), (".", "。")], "hello, world.");
        assert_eq!(out, "hello， world。");
        assert_eq!(n, 2);
    }

    #[test]
    fn longest_match_wins() {
        let (out, n) = apply(&[("ab", "X"), ("abc", "Y")], "xabcy");
        assert_eq!(out, "xYy");
        assert_eq!(n, 1);
    }

    #[test]
    fn shorter_pattern_applies_when_longer_fails() {
        let (out, n) = apply(&[("ab", "X"), ("abc", "Y")], "xaby");
        assert_eq!(out, "xXy");
        assert_eq!(n, 1);
    }

    #[test]
    fn no_overlap_after_replacement() {
        // Replacement text containing a pattern must not be rescanned.
        let (out, n) = apply(&[("a", "aa")], "aaa");
        assert_eq!(out, "aaaaaa");
        assert_eq!(n, 3);
    }

    #[test]
    fn multichar_patterns_and_replacements() {
        let (out, n) = apply(&[("...", "…"), ("--", "—")], "wait... -- done");
        assert_eq!(out, "wait… — done");
        assert_eq!(n, 2);
    }

    #[test]
    fn adjacent_matches() {
        let (out, n) = apply(&[(",", "，")], ",,,");
        assert_eq!(out, "，，，");
        assert_eq!(n, 3);
    }

    #[test]
    fn non_ascii_patterns() {
        let (out, n) = apply(&[("，", ","), ("。", ".")], "你好，世界。");
        assert_eq!(out, "你好,世界.");
        assert_eq!(n, 2);
    }

    #[test]
    fn unmatched_prefix_is_copied_verbatim() {
        // "ab" walks two trie edges without reaching a terminal; both
        // scalars must come out unmodified and matching must resume at 'b'.
        let (out, n) = apply(&[("abc", "Y"), ("bd", "Z")], "abd");
        assert_eq!(out, "aZ");
        assert_eq!(n, 1);
    }

    #[test]
    fn replacement_count_matches_occurrences() {
        let (out, n) = apply(&[("x", "y")], "x x x x");
        assert_eq!(out, "y y y y");
        assert_eq!(n, 4);
    }
}

//! Input expansion: turn positional arguments into a concrete file list.
//!
//! Each argument is either a directory (walked, optionally recursively), a
//! glob pattern over one directory (`*` and `?` wildcards in the final
//! component), or a literal file path. Directory walks skip hidden entries
//! and honor `.gitignore` files. Rule files are never returned, the final
//! list is sorted and deduplicated, and arguments that match nothing are
//! logged rather than failing the run.

use crate::config::RULE_FILE_NAME;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expand `patterns` into a sorted, deduplicated list of file paths.
pub fn find_files(patterns: &[String], recursive: bool) -> Vec<PathBuf> {
    let mut all_files = Vec::new();

    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_dir() {
            collect_dir(path, recursive, &mut all_files);
        } else if contains_wildcard(pattern) {
            expand_glob(pattern, &mut all_files);
        } else if path.is_file() {
            all_files.push(path.to_path_buf());
        } else {
            warn!(pattern = %pattern, "input not found");
        }
    }

    all_files.retain(|p| !is_rule_file(p));
    all_files.sort();
    all_files.dedup();
    all_files
}

fn contains_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

fn is_rule_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == RULE_FILE_NAME)
}

fn collect_dir(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) {
    let mut builder = WalkBuilder::new(dir);
    if !recursive {
        builder.max_depth(Some(1));
    }
    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                let is_file = entry
                    .file_type()
                    .map_or_else(|| entry.path().is_file(), |ft| ft.is_file());
                if is_file {
                    out.push(entry.into_path());
                }
            }
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "walk error");
            }
        }
    }
}

/// Expand a `*`/`?` pattern against the entries of its parent directory.
/// Wildcards apply to the final path component only.
fn expand_glob(pattern: &str, out: &mut Vec<PathBuf>) {
    let path = Path::new(pattern);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let Some(file_pattern) = path.file_name().and_then(|n| n.to_str()) else {
        warn!(pattern = %pattern, "unusable glob pattern");
        return;
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read glob directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if match_glob(name, file_pattern) {
            out.push(entry_path);
        }
    }
}

/// Match `name` against `pattern` where `*` matches any run of characters
/// and `?` matches exactly one.
pub fn match_glob(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // Iterative backtracking over the single most recent `*`.
    let (mut n, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            n += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

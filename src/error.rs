//! Error taxonomies.
//!
//! File-level failures (unreadable input, binary input, a failed page, a
//! failed write) are data, carried in [`crate::types::ProcessingResult`];
//! they never abort a batch. The enums here cover the genuinely fatal or
//! upstream cases.

use std::path::PathBuf;

/// Fatal engine errors that abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A task was submitted to a pool that has been shut down.
    #[error("cannot submit task to a stopped worker pool")]
    PoolShutdown,
}

/// Rule-configuration loading failures. Individual malformed statements are
/// recovered from (and reported as diagnostics); these are the cases where
/// no usable rule set exists at all.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// No rule file exists at any searched location.
    #[error("no rule file found (searched: {})", format_paths(.searched))]
    NotFound {
        /// Paths probed, in priority order.
        searched: Vec<PathBuf>,
    },

    /// A rule file exists but could not be read.
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parsing finished but produced no replacement rules.
    #[error("no replacement rules defined (checked: {})", format_paths(.parsed))]
    Empty {
        /// Rule files that were parsed.
        parsed: Vec<PathBuf>,
    },
}

fn format_paths(paths: &[PathBuf]) -> String {
    let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    joined.join(", ")
}

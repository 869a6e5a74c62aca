//! Parallel batch text-rewriting engine with protected regions.
//!
//! Given a set of input files and a rule set, the engine performs a single
//! pass over each file replacing every occurrence of a configured source
//! string with its target string, except inside user-declared protected
//! regions (code fences, math environments, literal tokens), and rewrites
//! each file in place, exactly once, only when replacements occurred.
//!
//! All pattern matching and offsets work in Unicode scalar values, so rules
//! over mixed-script text (CJK punctuation, combining sequences) behave the
//! same regardless of byte widths.
//!
//! Pipeline flow (per batch):
//!
//! ```text
//! paths -> load + decode -> ProtectedScanner -> Pager -> page tasks
//!            (WorkerPool x Matcher) -> per-file reassembly -> Writeback
//! ```
//!
//! Output assembly is deterministic regardless of task interleaving: every
//! page writes its own dense slot and the writeback concatenates by page id,
//! so a batch produces byte-identical results whether it ran on one worker
//! or sixteen.
//!
//! # Usage
//!
//! ```ignore
//! use rewriter_rs::{config, Processor};
//!
//! let rules = config::load_rules(None)?;
//! let processor = Processor::new(&rules.replacements, rules.protected_regions.clone());
//! let results = processor.process(&files, 0)?;
//! ```

pub mod config;
pub mod error;
pub mod finder;
pub mod matcher;
pub mod pager;
pub mod pool;
pub mod processor;
pub mod protect;
pub mod types;
pub mod writeback;

pub use config::{load_rules, RuleSet};
pub use error::{EngineError, RuleError};
pub use matcher::Matcher;
pub use pager::{paginate, paginate_with, PAGE_SIZE};
pub use pool::WorkerPool;
pub use processor::Processor;
pub use protect::ProtectedScanner;
pub use types::{
    FileContent, Page, PageResult, ProcessingResult, ProtectedInterval, ProtectedRegionSpec,
    ReplacementMap, WritebackNotification,
};

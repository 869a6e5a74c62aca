//! Rule configuration: the `.rules` file format and its discovery.
//!
//! Rule files are looked up lowest-priority first (the user data directory,
//! then the current directory) and parsed into one accumulated [`RuleSet`],
//! so project-local rules override user-wide ones statement by statement.

pub mod lexer;
pub mod parser;

use crate::error::RuleError;
use crate::types::{ProtectedRegionSpec, ReplacementMap};
use self::parser::{Parser, Severity};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// File name probed for rule statements.
pub const RULE_FILE_NAME: &str = ".rules";

/// Subdirectory of the user data dir holding the user-wide rule file.
const USER_DATA_SUBDIR: &str = "rewriter-rs";

/// Parsed rule configuration.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    /// pattern -> replacement, later statements overriding earlier ones.
    pub replacements: ReplacementMap,
    /// Protected-region marker pairs, in configured order. Order matters
    /// when one start marker is a prefix of another; put the longer or more
    /// specific marker first.
    pub protected_regions: Vec<ProtectedRegionSpec>,
}

impl RuleSet {
    /// Parse one rule file's content into this set, logging diagnostics.
    /// Returns the number of errors encountered.
    pub fn parse_into(&mut self, input: &str, origin: &Path) -> usize {
        let diagnostics = Parser::new(input, self).parse();
        let mut errors = 0;
        for d in &diagnostics {
            match d.severity {
                Severity::Warning => warn!(file = %origin.display(), "{d}"),
                Severity::Error => {
                    errors += 1;
                    error!(file = %origin.display(), "{d}");
                }
            }
        }
        errors
    }
}

/// Candidate rule-file paths, lowest priority first.
pub fn rule_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(
            PathBuf::from(home)
                .join(".local/share")
                .join(USER_DATA_SUBDIR)
                .join(RULE_FILE_NAME),
        );
    }
    candidates.push(PathBuf::from(RULE_FILE_NAME));
    candidates
}

/// Load the rule set from the standard locations, or from `explicit` alone
/// when given.
///
/// # Errors
///
/// [`RuleError::NotFound`] if no candidate exists, [`RuleError::Io`] if an
/// explicit file cannot be read, and [`RuleError::Empty`] if parsing yields
/// no replacement rules at all.
pub fn load_rules(explicit: Option<&Path>) -> Result<RuleSet, RuleError> {
    let candidates = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => rule_file_candidates(),
    };

    let mut rules = RuleSet::default();
    let mut parsed = Vec::new();

    for path in &candidates {
        let input = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(RuleError::Io {
                    path: path.clone(),
                    source: e,
                })
            }
        };
        debug!(file = %path.display(), "parsing rule file");
        rules.parse_into(&input, path);
        parsed.push(path.clone());
    }

    if parsed.is_empty() {
        return Err(RuleError::NotFound {
            searched: candidates,
        });
    }
    if rules.replacements.is_empty() {
        return Err(RuleError::Empty { parsed });
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_into_accumulates_across_files() {
        let mut rules = RuleSet::default();
        rules.parse_into(r#"REPLACE(FROM "a", TO "b");"#, Path::new("user"));
        rules.parse_into(r#"REPLACE(FROM "a", TO "c");"#, Path::new("project"));
        assert_eq!(rules.replacements.get("a"), Some(&"c".to_string()));
    }

    #[test]
    fn parse_into_counts_errors() {
        let mut rules = RuleSet::default();
        let errors = rules.parse_into("NOT A RULE ;", Path::new("x"));
        assert!(errors > 0);
    }

    #[test]
    fn candidates_end_with_cwd_file() {
        let candidates = rule_file_candidates();
        assert_eq!(
            candidates.last().map(PathBuf::as_path),
            Some(Path::new(RULE_FILE_NAME))
        );
    }
}

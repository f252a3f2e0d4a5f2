//! Exclusion rule matching
//!
//! Pure predicate over a compiled set of exclusion rules. Evaluated before
//! debounce admission so excluded paths never consume debounce resources.

#![allow(dead_code)]

use glob::Pattern;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;
use vigil_core::{Error, Result};

/// Compiled exclusion rules for one watch
///
/// A rule is either a glob pattern (`*.log`, `build/**`) or a literal path
/// fragment (`node_modules`); fragments match anywhere in the path. Matching
/// is stateless and has no side effects.
#[derive(Clone)]
pub struct ExclusionFilter {
    /// Glob rules, matched against both the full path and the file name
    patterns: Arc<Vec<Pattern>>,
    /// Metacharacter-free rules, matched as path substrings
    fragments: Arc<Vec<String>>,
}

impl ExclusionFilter {
    /// A filter that excludes nothing
    pub fn empty() -> Self {
        Self {
            patterns: Arc::new(Vec::new()),
            fragments: Arc::new(Vec::new()),
        }
    }

    /// Compile a rule set
    ///
    /// Fails on the first malformed glob; registration surfaces this to the
    /// caller rather than silently watching with partial rules.
    pub fn compile(rules: &[String]) -> Result<Self> {
        let mut patterns = Vec::new();
        let mut fragments = Vec::new();

        for rule in rules {
            patterns.push(
                Pattern::new(rule).map_err(|e| Error::pattern(rule.clone(), e.msg.to_string()))?,
            );
            if !has_glob_meta(rule) {
                fragments.push(rule.clone());
            }
        }

        Ok(Self {
            patterns: Arc::new(patterns),
            fragments: Arc::new(fragments),
        })
    }

    /// Check whether a raw notification for `path` should be discarded
    pub fn should_ignore(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let file_name = path.file_name().map(|n| n.to_string_lossy());

        for pattern in self.patterns.iter() {
            if pattern.matches(&path_str) {
                trace!("path {:?} matches exclusion pattern {}", path, pattern);
                return true;
            }
            if let Some(name) = &file_name {
                if pattern.matches(name) {
                    trace!("file name {:?} matches exclusion pattern {}", name, pattern);
                    return true;
                }
            }
        }

        for fragment in self.fragments.iter() {
            if path_str.contains(fragment.as_str()) {
                trace!("path {:?} contains excluded fragment {:?}", path, fragment);
                return true;
            }
        }

        false
    }

    /// Number of compiled rules
    pub fn rule_count(&self) -> usize {
        self.patterns.len()
    }
}

impl std::fmt::Debug for ExclusionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusionFilter")
            .field("rules", &self.patterns.len())
            .finish()
    }
}

fn has_glob_meta(rule: &str) -> bool {
    rule.chars().any(|c| matches!(c, '*' | '?' | '[' | ']'))
}

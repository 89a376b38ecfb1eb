//! Ignore rules applied to every scan and archive.
//!
//! Rules come from `.odoignore` (or `.gitignore` when there is no
//! `.odoignore`) plus explicit `--ignore` globs. All rules are evaluated; a
//! path is excluded as soon as any of them matches it or one of its parent
//! directories.

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::error::{io_err, SyncError};

/// Patterns that are always excluded from sync.
pub const BUILTIN_IGNORES: &[&str] = &[".git", ".odo"];

const IGNORE_FILES: &[&str] = &[".odoignore", ".gitignore"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    raw: String,
    pattern: Pattern,
    /// Rules containing a `/` match whole relative paths; others match any
    /// single path component.
    anchored: bool,
}

/// Ordered set of glob rules relative to the source root.
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    rules: Vec<Rule>,
}

impl Default for IgnoreRuleSet {
    fn default() -> Self {
        let mut set = Self { rules: Vec::new() };
        for raw in BUILTIN_IGNORES {
            if let Ok(rule) = parse_rule(raw) {
                set.rules.push(rule);
            }
        }
        set
    }
}

impl IgnoreRuleSet {
    /// Built-in rules plus `patterns`.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        set.extend(patterns)?;
        Ok(set)
    }

    /// Built-in rules plus the first ignore file found in `root`.
    pub fn load_from_dir(root: &Path) -> Result<Self, SyncError> {
        let mut set = Self::default();
        for name in IGNORE_FILES {
            let path = root.join(name);
            if !path.is_file() {
                continue;
            }
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            tracing::debug!(file = %path.display(), "loading ignore rules");
            set.extend(contents.lines())?;
            break;
        }
        Ok(set)
    }

    /// Append patterns; blank lines, `#` comments and `!` negations are skipped.
    pub fn extend<I, S>(&mut self, patterns: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in patterns {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let rule = parse_rule(line).map_err(|source| SyncError::InvalidPattern {
                pattern: line.to_string(),
                source,
            })?;
            self.rules.push(rule);
        }
        Ok(())
    }

    /// The raw patterns, in insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.raw.as_str())
    }

    /// Whether `rel_path` (`/`-separated, relative to the source root) is excluded.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let rel_path = rel_path.trim_start_matches("./").trim_matches('/');
        if rel_path.is_empty() {
            return false;
        }

        let components: Vec<&str> = rel_path.split('/').collect();
        for depth in 1..=components.len() {
            let prefix = components[..depth].join("/");
            let last = components[depth - 1];
            let hit = self.rules.iter().any(|rule| {
                if rule.anchored {
                    rule.pattern.matches_with(&prefix, MATCH_OPTIONS)
                } else {
                    rule.pattern.matches_with(last, MATCH_OPTIONS)
                }
            });
            if hit {
                return true;
            }
        }
        false
    }
}

fn parse_rule(raw: &str) -> Result<Rule, glob::PatternError> {
    let trimmed = raw.trim_end_matches('/');
    let anchored = trimmed.contains('/');
    let body = trimmed.trim_start_matches('/');
    Ok(Rule {
        raw: raw.to_string(),
        pattern: Pattern::new(body)?,
        anchored,
    })
}

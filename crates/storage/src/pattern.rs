//! Protocol name patterns for template lookup.
//!
//! `*` matches any run of characters; `%` is accepted as a synonym so that
//! SQL-`LIKE` style callers keep working. Every other character is literal
//! and matching is case-sensitive. Patterns compile to both a [`glob::Pattern`]
//! (in-memory backend) and an escaped SQLite `GLOB` string, which share the
//! same semantics.

use std::fmt;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
pub struct ProtocolPattern {
    raw: String,
    glob: String,
    matcher: glob::Pattern,
}

impl ProtocolPattern {
    /// Compile a pattern where `*` and `%` are wildcards.
    pub fn new(raw: &str) -> Result<Self> {
        let mut glob = String::with_capacity(raw.len());
        let mut literal = String::new();
        for c in raw.chars() {
            if c == '*' || c == '%' {
                glob.push_str(&glob::Pattern::escape(&literal));
                literal.clear();
                glob.push('*');
            } else {
                literal.push(c);
            }
        }
        glob.push_str(&glob::Pattern::escape(&literal));
        Self::compile(raw, glob)
    }

    /// A pattern matching exactly `name`, wildcard characters included.
    pub fn exact(name: &str) -> Result<Self> {
        Self::compile(name, glob::Pattern::escape(name))
    }

    /// Matches every protocol name.
    pub fn any() -> Result<Self> {
        Self::new("*")
    }

    fn compile(raw: &str, glob: String) -> Result<Self> {
        let matcher = glob::Pattern::new(&glob).map_err(|e| StoreError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            glob,
            matcher,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.matcher.matches(value)
    }

    /// Escaped pattern for the SQLite `GLOB` operator.
    pub fn as_glob(&self) -> &str {
        &self.glob
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ProtocolPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_match_exactly() {
        let p = ProtocolPattern::new("RewardedAnti").unwrap();
        assert!(p.matches("RewardedAnti"));
        assert!(!p.matches("RewardedAntisaccade"));
        assert!(!p.matches("rewardedanti"));
    }

    #[test]
    fn star_and_percent_are_wildcards() {
        let prefix = ProtocolPattern::new("WPC*").unwrap();
        assert!(prefix.matches("WPC-8620"));
        assert!(!prefix.matches("xWPC-8620"));

        let suffix = ProtocolPattern::new("%8620").unwrap();
        assert!(suffix.matches("WPC-8620"));
        assert!(!suffix.matches("WPC-8621"));

        assert!(ProtocolPattern::any().unwrap().matches(""));
    }

    #[test]
    fn glob_metacharacters_are_literal() {
        let p = ProtocolPattern::new("dMRI[98]?").unwrap();
        assert!(p.matches("dMRI[98]?"));
        assert!(!p.matches("dMRI9x"));
    }

    #[test]
    fn exact_escapes_wildcards() {
        let p = ProtocolPattern::exact("a*b").unwrap();
        assert!(p.matches("a*b"));
        assert!(!p.matches("axxb"));
    }
}

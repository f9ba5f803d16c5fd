//! IRC-style glob matching against `nick!user@host` masks.
//!
//! Permitted wildcards are * (match zero or more characters) and ? (match exactly one character)

use std::fmt::Display;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use wildmatch::WildMatch;

use crate::casemap::rfc_casefold;

/// A wildcard pattern
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct Pattern(String);

impl Deref for Pattern {
    type Target = String;

    fn deref(&self) -> &String {
        &self.0
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Pattern {
    /// Construct a `Pattern`
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Test whether the given string matches this pattern. Matching is
    /// case-insensitive under the RFC 1459 case mapping.
    pub fn matches(&self, s: &str) -> bool {
        WildMatch::new(&rfc_casefold(&self.0)).matches(&rfc_casefold(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_wildcards() {
        let pattern = Pattern::new("*!*@staff/*");
        assert!(pattern.matches("oper!~oper@staff/oper"));
        assert!(!pattern.matches("oper!~oper@user/oper"));
    }

    #[test]
    fn matching_ignores_case() {
        let pattern = Pattern::new("Admin[x]!*@*");
        assert!(pattern.matches("ADMIN{X}!a@b"));
    }

    #[test]
    fn single_character_wildcard() {
        let pattern = Pattern::new("ni?k!*@*");
        assert!(pattern.matches("nick!u@h"));
        assert!(!pattern.matches("niiick!u@h"));
    }
}

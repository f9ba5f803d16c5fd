//! RFC 1459 case mapping for nicknames.
//!
//! IRC servers treat `[]\` as the upper-case forms of `{}|`, so two nicknames that
//! differ only in those characters (or in ASCII case) refer to the same user.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Fold a single character according to the RFC 1459 case mapping
fn fold_char(c: char) -> char {
    match c {
        'A'..='Z' => c.to_ascii_lowercase(),
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        _ => c,
    }
}

/// Casefold `text` according to the RFC 1459 case mapping.
///
/// Folding is idempotent: `rfc_casefold(&rfc_casefold(s)) == rfc_casefold(s)`.
pub fn rfc_casefold(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

/// Compare two strings for equality under the RFC 1459 case mapping
pub fn rfc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().map(fold_char).eq(b.chars().map(fold_char))
}

/// A casefolded nickname, used as the identity of a tracked user and as the
/// correlation key for pending lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NickKey(String);

impl NickKey {
    pub fn new(nick: &str) -> Self {
        Self(rfc_casefold(nick))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NickKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&String> for NickKey {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for NickKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for NickKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_ascii_and_brackets() {
        assert_eq!(rfc_casefold("Alice[AWAY]\\"), "alice{away}|");
    }

    #[test]
    fn leaves_other_characters_alone() {
        assert_eq!(rfc_casefold("nick_^`-{}|"), "nick_^`-{}|");
        assert_eq!(rfc_casefold("Ünïcode"), "Ünïcode");
    }

    #[test]
    fn folding_is_idempotent() {
        for s in ["Bob", "[x]", "a\\b", "MiXeD|Case{}", ""] {
            let once = rfc_casefold(s);
            assert_eq!(rfc_casefold(&once), once);
        }
    }

    #[test]
    fn equality_ignores_case_mapping() {
        assert!(rfc_eq("Foo[m]", "foo{M}"));
        assert!(rfc_eq("a\\b", "A|B"));
        assert!(!rfc_eq("foo", "foo_"));
    }

    #[test]
    fn keys_compare_folded() {
        assert_eq!(NickKey::new("Dan[1]"), NickKey::from("dan{1}"));
        assert_eq!(NickKey::new("Dan[1]").as_str(), "dan{1}");
    }
}

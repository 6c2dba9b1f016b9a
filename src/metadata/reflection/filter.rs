//! Name filters and hashed member names.
//!
//! Every member name read from the metadata provider is wrapped in a [`MemberName`], which
//! carries its case-folded hash. A [`NameFilter`] built for a case-insensitive query
//! carries the folded hash of the query string, so most non-matching candidates are
//! rejected by an integer comparison.

use std::fmt;

use crate::utils::{eq_ignore_case, folded_hash};

/// How a [`NameFilter`] compares names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Every name matches
    All,
    /// Ordinal comparison
    CaseSensitive,
    /// Comparison after simple case folding
    CaseInsensitive,
}

/// A member name together with its case-folded hash
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MemberName {
    text: Box<str>,
    folded_hash: u32,
}

impl MemberName {
    /// Wrap `text`, computing its folded hash
    pub fn new(text: impl Into<Box<str>>) -> Self {
        let text = text.into();
        let folded_hash = folded_hash(&text);
        MemberName { text, folded_hash }
    }

    /// The name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The case-folded hash of the name
    #[must_use]
    pub fn folded_hash(&self) -> u32 {
        self.folded_hash
    }
}

impl From<&str> for MemberName {
    fn from(text: &str) -> Self {
        MemberName::new(text)
    }
}

impl fmt::Debug for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.text, f)
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Predicate over member names.
///
/// The folded hash is present if and only if the filter compares a full name
/// case-insensitively. The hash only ever rejects; two names that compare equal always
/// have equal hashes.
///
/// # Example
///
/// ```rust
/// use memberscope::metadata::reflection::{MatchMode, NameFilter};
///
/// let filter = NameFilter::new(Some("tostring"), MatchMode::CaseInsensitive);
/// assert!(filter.matches("ToString"));
/// assert!(!filter.matches("ToStrings"));
///
/// let prefix = NameFilter::prefix("get_", MatchMode::CaseSensitive);
/// assert!(prefix.matches("get_Item"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    name: Option<Box<str>>,
    mode: MatchMode,
    folded_hash: Option<u32>,
    prefix: bool,
}

impl NameFilter {
    /// Build a filter for `name`; `None` or [`MatchMode::All`] matches every name
    #[must_use]
    pub fn new(name: Option<&str>, mode: MatchMode) -> Self {
        match (name, mode) {
            (None, _) | (_, MatchMode::All) => Self::all(),
            (Some(name), MatchMode::CaseSensitive) => Self::exact(name),
            (Some(name), MatchMode::CaseInsensitive) => Self::case_insensitive(name),
        }
    }

    /// Matches every name
    #[must_use]
    pub fn all() -> Self {
        NameFilter {
            name: None,
            mode: MatchMode::All,
            folded_hash: None,
            prefix: false,
        }
    }

    /// Ordinal match of `name`
    #[must_use]
    pub fn exact(name: &str) -> Self {
        NameFilter {
            name: Some(name.into()),
            mode: MatchMode::CaseSensitive,
            folded_hash: None,
            prefix: false,
        }
    }

    /// Case-insensitive match of `name`
    #[must_use]
    pub fn case_insensitive(name: &str) -> Self {
        NameFilter {
            name: Some(name.into()),
            mode: MatchMode::CaseInsensitive,
            folded_hash: Some(folded_hash(name)),
            prefix: false,
        }
    }

    /// Matches names starting with `prefix`; an empty prefix matches every name
    #[must_use]
    pub fn prefix(prefix: &str, mode: MatchMode) -> Self {
        if prefix.is_empty() || mode == MatchMode::All {
            return Self::all();
        }
        NameFilter {
            name: Some(prefix.into()),
            mode,
            folded_hash: None,
            prefix: true,
        }
    }

    /// Parse a member query: a trailing `*` turns the name into a prefix filter
    #[must_use]
    pub fn parse(pattern: &str, mode: MatchMode) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::prefix(prefix, mode),
            None => Self::new(Some(pattern), mode),
        }
    }

    /// The queried name (or prefix)
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The match mode
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// The folded hash of the queried name, for case-insensitive full-name filters
    #[must_use]
    pub fn folded_hash(&self) -> Option<u32> {
        self.folded_hash
    }

    /// Returns `true` for prefix filters
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    /// Returns `true` if the filter selects a single name through a name index
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.mode != MatchMode::All && !self.prefix
    }

    /// Test `candidate` against the filter
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let Some(name) = self.name.as_deref() else {
            return true;
        };
        match (self.mode, self.prefix) {
            (MatchMode::All, _) => true,
            (MatchMode::CaseSensitive, false) => candidate == name,
            (MatchMode::CaseSensitive, true) => candidate.starts_with(name),
            (MatchMode::CaseInsensitive, false) => eq_ignore_case(candidate, name),
            (MatchMode::CaseInsensitive, true) => starts_with_ignore_case(candidate, name),
        }
    }

    /// Test a hashed member name; uses the folded hash as a fast reject
    #[must_use]
    pub fn matches_name(&self, candidate: &MemberName) -> bool {
        if let Some(hash) = self.folded_hash {
            if hash != candidate.folded_hash() {
                return false;
            }
        }
        self.matches(candidate.as_str())
    }
}

fn starts_with_ignore_case(candidate: &str, prefix: &str) -> bool {
    let mut chars = candidate.chars();
    let head: String = chars.by_ref().take(prefix.chars().count()).collect();
    eq_ignore_case(&head, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all() {
        let filter = NameFilter::new(None, MatchMode::CaseSensitive);
        assert_eq!(filter.mode(), MatchMode::All);
        assert!(filter.matches("anything"));
        assert!(filter.folded_hash().is_none());
        assert!(!filter.is_indexed());
    }

    #[test]
    fn test_case_sensitive() {
        let filter = NameFilter::exact("Item");
        assert!(filter.matches("Item"));
        assert!(!filter.matches("item"));
        assert!(filter.folded_hash().is_none());
        assert!(filter.is_indexed());
    }

    #[test]
    fn test_case_insensitive_hash_rejects() {
        let filter = NameFilter::case_insensitive("ITEM");
        assert_eq!(filter.folded_hash(), Some(folded_hash("item")));
        assert!(filter.matches_name(&MemberName::new("Item")));
        assert!(!filter.matches_name(&MemberName::new("Items")));
    }

    #[test]
    fn test_prefix() {
        let filter = NameFilter::parse("Get*", MatchMode::CaseInsensitive);
        assert!(filter.is_prefix());
        assert!(filter.folded_hash().is_none());
        assert!(filter.matches("GetHashCode"));
        assert!(filter.matches("gettype"));
        assert!(!filter.matches("Ge"));
        assert!(!filter.matches("ToString"));

        let exact = NameFilter::parse("Get", MatchMode::CaseSensitive);
        assert!(!exact.is_prefix());
        assert!(!exact.matches("GetType"));

        assert_eq!(NameFilter::parse("*", MatchMode::CaseSensitive), NameFilter::all());
    }
}

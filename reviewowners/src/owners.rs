use std::{collections::BTreeSet, fmt};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ruleset::Owner;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[<>()\[\]{},;+*?=]").expect("valid punctuation regex"));

/// Reduce a raw owner token to its canonical identifier.
///
/// Punctuation from the set `<>()[]{},;+*?=` is removed, then the first `@`,
/// then anything up to and including the last `/` (so `@org/team` becomes
/// `team`), and the result is lower-cased. Returns `None` when nothing is left.
pub fn normalize_owner(raw: &str) -> Option<String> {
    let stripped = PUNCTUATION.replace_all(raw, "");
    let stripped = stripped.replacen('@', "", 1);
    let slug = stripped.rsplit('/').next().unwrap_or_default().to_lowercase();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// A deduplicated set of normalized owner identifiers. Iterates in sorted
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerSet {
    owners: BTreeSet<String>,
}

impl OwnerSet {
    pub fn new() -> OwnerSet {
        OwnerSet::default()
    }

    /// Normalize `raw` and add it to the set. Returns `true` if the set
    /// didn't already contain the owner.
    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize_owner(raw) {
            Some(owner) => self.owners.insert(owner),
            None => false,
        }
    }

    /// Fold a rule's owners into the set, returning the extended set.
    pub fn with_owners(mut self, owners: &[Owner]) -> OwnerSet {
        for owner in owners {
            self.insert(owner.as_str());
        }
        self
    }

    /// Membership test against an already-normalized identifier.
    pub fn contains(&self, owner: &str) -> bool {
        self.owners.contains(owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.owners.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.owners.into_iter().collect()
    }
}

impl IntoIterator for OwnerSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.owners.into_iter()
    }
}

impl<S: AsRef<str>> FromIterator<S> for OwnerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = OwnerSet::new();
        for raw in iter {
            set.insert(raw.as_ref());
        }
        set
    }
}

impl fmt::Display for OwnerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, owner) in self.owners.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(owner)?;
        }
        Ok(())
    }
}

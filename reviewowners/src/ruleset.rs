use std::fmt;

use tracing::debug;

use crate::{
    owners::{normalize_owner, OwnerSet},
    pattern::NormalizedPattern,
    patternset::{Builder, Matcher},
};

/// A compiled set of CODEOWNERS rules. Rule order is significant: when several
/// rules match a path, the one that appears last wins.
#[derive(Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    patterns: Vec<NormalizedPattern>,
    matcher: Matcher,
}

impl RuleSet {
    /// Build a `RuleSet` from rules in document order.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut builder = Builder::new();
        let patterns = rules
            .iter()
            .map(|rule| {
                let pattern = NormalizedPattern::parse(&rule.pattern);
                builder.add(&pattern);
                pattern
            })
            .collect();
        Self {
            rules,
            patterns,
            matcher: builder.build(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The normalized form of the rule at `idx`.
    pub fn pattern(&self, idx: usize) -> Option<&NormalizedPattern> {
        self.patterns.get(idx)
    }

    /// Every rule matching `path`, in document order, paired with its index.
    pub fn matching_rules(&self, path: &str) -> Vec<(usize, &Rule)> {
        self.matcher
            .matching_patterns(path)
            .into_iter()
            .map(|idx| (idx, &self.rules[idx]))
            .collect()
    }

    /// The last rule matching `path`, paired with its index.
    pub fn winning_rule(&self, path: &str) -> Option<(usize, &Rule)> {
        self.matcher
            .matching_patterns(path)
            .into_iter()
            .max()
            .map(|idx| (idx, &self.rules[idx]))
    }

    /// The owners of `path`: those of the last matching rule. Returns `None`
    /// when no rule matches or the winning rule has no owners.
    pub fn owners(&self, path: &str) -> Option<&[Owner]> {
        self.winning_rule(path).and_then(|(_, rule)| {
            if rule.owners.is_empty() {
                None
            } else {
                Some(rule.owners.as_ref())
            }
        })
    }

    /// Resolve the combined owner set for a change: every changed file
    /// contributes the owners of its winning rule, and the results are merged
    /// after normalization. Blank paths contribute nothing.
    pub fn resolve<I>(&self, changed_files: I) -> OwnerSet
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        changed_files
            .into_iter()
            .filter_map(|file| {
                let path = file.as_ref();
                if path.trim().is_empty() {
                    return None;
                }
                let (idx, rule) = self.winning_rule(path)?;
                debug!(
                    file = path,
                    pattern = %self.patterns[idx],
                    owners = ?rule.owners.iter().map(Owner::as_str).collect::<Vec<_>>(),
                    "match found"
                );
                Some(rule.owners.as_slice())
            })
            .fold(OwnerSet::new(), OwnerSet::with_owners)
    }
}

/// A single CODEOWNERS rule: a pattern and the owners it assigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: String,
    pub owners: Vec<Owner>,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, owners: Vec<Owner>) -> Rule {
        Rule {
            pattern: pattern.into(),
            owners,
        }
    }
}

/// An owner token as written in the CODEOWNERS file, e.g. `@octocat` or
/// `@github/docs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    value: String,
    kind: OwnerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    User,
    Team,
}

impl Owner {
    pub fn new(value: String, kind: OwnerKind) -> Self {
        Self { value, kind }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> OwnerKind {
        self.kind
    }

    /// The canonical identifier for this owner, see
    /// [`normalize_owner`](crate::normalize_owner).
    pub fn normalized(&self) -> Option<String> {
        normalize_owner(&self.value)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOwnerError {
    value: String,
}

impl fmt::Display for InvalidOwnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid owner: {}", self.value)
    }
}

impl std::error::Error for InvalidOwnerError {}

impl TryFrom<&str> for Owner {
    type Error = InvalidOwnerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.strip_prefix('@') {
            Some(name) if !name.is_empty() => {
                let kind = if name.contains('/') {
                    OwnerKind::Team
                } else {
                    OwnerKind::User
                };
                Ok(Owner::new(value.to_owned(), kind))
            }
            _ => Err(InvalidOwnerError {
                value: value.to_owned(),
            }),
        }
    }
}

//! Work out which owners must review a change, given a CODEOWNERS file and the
//! paths the change touches.
//!
//! ```
//! let codeowners = "\
//! * @org/platform
//! /containers/dashboard/ @org/Dashboard
//! docs @docs-team
//! ";
//! let owners = reviewowners::resolve(
//!     codeowners,
//!     ["containers/dashboard/index.ts", "/docs/intro.md"],
//! );
//! assert_eq!(owners.into_vec(), vec!["dashboard", "docs-team"]);
//! ```

pub mod owners;
pub mod parser;
pub mod pattern;
mod patternset;
mod ruleset;

pub use owners::{normalize_owner, OwnerSet};
pub use ruleset::{InvalidOwnerError, Owner, OwnerKind, Rule, RuleSet};

/// Resolve the owners required for `changed_files` under the CODEOWNERS
/// `document`. For each file the last matching rule wins; the owners of every
/// file are then normalized and merged into one set. Lines that don't form a
/// rule are skipped, and an empty document yields an empty set.
pub fn resolve<I>(document: &str, changed_files: I) -> OwnerSet
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    parser::parse(document).into_ruleset().resolve(changed_files)
}

use std::{collections::BTreeMap, fmt::Write};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use reviewowners::{OwnerSet, RuleSet};

/// Changed files keyed by change request number.
pub type ChangeSets = BTreeMap<u64, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetOwners {
    pub number: u64,
    pub owners: OwnerSet,
}

/// Resolve the owners of every change set, ordered by change set number.
pub fn resolve_all(ruleset: &RuleSet, change_sets: &ChangeSets) -> Vec<ChangeSetOwners> {
    #[cfg(feature = "rayon")]
    let iter = change_sets.par_iter();
    #[cfg(not(feature = "rayon"))]
    let iter = change_sets.iter();

    let mut results = iter
        .map(|(&number, files)| ChangeSetOwners {
            number,
            owners: ruleset.resolve(files),
        })
        .collect::<Vec<_>>();
    results.sort_by_key(|result| result.number);
    results
}

/// List the change sets that need more than one owner, grouped by how many
/// owners they need, largest groups first.
pub fn render(results: &[ChangeSetOwners]) -> String {
    let max_owners = results.iter().map(|r| r.owners.len()).max().unwrap_or(0);
    let mut out = String::new();
    for count in (2..=max_owners).rev() {
        let _ = writeln!(out, "Change sets with {} owners:", count);
        for result in results.iter().filter(|r| r.owners.len() == count) {
            let _ = writeln!(out, "#{}: {}", result.number, result.owners);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change_sets() -> ChangeSets {
        serde_json::from_str(
            r#"{
                "12": ["app/a.rb", "docs/guide.md", "lib/tasks/x.rake"],
                "7": ["app/b.rb"],
                "9": ["docs/guide.md", "app/c.rb"],
                "3": []
            }"#,
        )
        .expect("valid change sets")
    }

    fn ruleset() -> RuleSet {
        reviewowners::parser::parse("app/ @org/app\ndocs/ @org/Docs\nlib/tasks/*.rake @ops\n")
            .into_ruleset()
    }

    #[test]
    fn test_resolve_all() {
        let results = resolve_all(&ruleset(), &change_sets());
        let summary = results
            .iter()
            .map(|r| (r.number, r.owners.clone().into_vec()))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                (3, vec![]),
                (7, vec!["app".to_owned()]),
                (9, vec!["app".to_owned(), "docs".to_owned()]),
                (12, vec!["app".to_owned(), "docs".to_owned(), "ops".to_owned()]),
            ]
        );
    }

    #[test]
    fn test_render() {
        let results = resolve_all(&ruleset(), &change_sets());
        assert_eq!(
            render(&results),
            "Change sets with 3 owners:\n#12: app, docs, ops\nChange sets with 2 owners:\n#9: app, docs\n"
        );
        assert_eq!(render(&[]), "");
    }
}

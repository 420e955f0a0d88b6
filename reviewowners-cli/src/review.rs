use std::{
    collections::BTreeSet,
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

use reviewowners::OwnerSet;
use serde::Deserialize;

use crate::directory::TeamDirectory;

/// One entry of a change request's review timeline. Only submitted reviews
/// carry an author and a state; other events are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
}

/// Logins of everyone with an `APPROVED` review in the timeline.
pub fn approving_users(timeline: &[TimelineEvent]) -> Vec<String> {
    timeline
        .iter()
        .filter(|event| event.state.as_deref() == Some("APPROVED"))
        .filter_map(|event| event.author.as_ref().map(|a| a.login.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Required owners that no approver belongs to, in sorted order.
pub fn outstanding_owners(
    required: &OwnerSet,
    directory: &TeamDirectory,
    approvers: &[String],
) -> Vec<String> {
    let approved_teams = approvers
        .iter()
        .flat_map(|login| directory.teams_for(login))
        .collect::<BTreeSet<_>>();
    required
        .iter()
        .filter(|owner| !approved_teams.contains(owner))
        .map(str::to_owned)
        .collect()
}

/// Why a change needs no codeowner approval at all. Only changes against the
/// protected branch are checked, and mergeback branches are exempt.
pub fn skip_reason(
    base_ref: Option<&str>,
    protected_branch: &str,
    head_ref: Option<&str>,
    mergeback_prefix: &str,
) -> Option<String> {
    if let Some(base_ref) = base_ref {
        if base_ref != protected_branch {
            return Some(format!("change is not against the {} branch", protected_branch));
        }
    }
    match head_ref {
        Some(head_ref) if !mergeback_prefix.is_empty() && head_ref.starts_with(mergeback_prefix) => {
            Some("change is a mergeback".to_owned())
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Pending { outstanding: Vec<String> },
    Skipped { reason: String },
}

impl Verdict {
    pub fn from_outstanding(outstanding: Vec<String>) -> Verdict {
        if outstanding.is_empty() {
            Verdict::Approved
        } else {
            Verdict::Pending { outstanding }
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved | Verdict::Skipped { .. })
    }

    pub fn reason(&self) -> String {
        match self {
            Verdict::Approved => "all codeowners have provided reviews".to_owned(),
            Verdict::Pending { outstanding } => format!(
                "codeowners {} have not provided reviews",
                outstanding.join(", ")
            ),
            Verdict::Skipped { reason } => format!("skipping check because {}", reason),
        }
    }

    /// The `key=value` line consumed by CI output files.
    pub fn output_line(&self) -> String {
        format!("approved={}", self.is_approved())
    }
}

/// Append the verdict's output line to a CI output file, creating it if
/// needed.
pub fn append_output(path: &Path, verdict: &Verdict) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", verdict.output_line())
}

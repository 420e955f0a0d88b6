use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use reviewowners::normalize_owner;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no team directory cached for {today} in {}", path.display())]
    StaleCache { path: PathBuf, today: NaiveDate },
}

/// Maps user logins to the slugs of the teams they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamDirectory {
    users: BTreeMap<String, BTreeSet<String>>,
}

// On-disk shape of a team listing: team slug to member logins.
#[derive(Deserialize)]
struct TeamsFile {
    teams: BTreeMap<String, Vec<String>>,
}

impl TeamDirectory {
    /// Build the user-to-teams directory from team-to-members pairs. Team
    /// slugs are normalized the same way CODEOWNERS owners are.
    pub fn from_teams<I, M>(teams: I) -> TeamDirectory
    where
        I: IntoIterator<Item = (String, M)>,
        M: IntoIterator<Item = String>,
    {
        let mut users: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (slug, members) in teams {
            let Some(slug) = normalize_owner(&slug) else {
                continue;
            };
            for login in members {
                users.entry(login).or_default().insert(slug.clone());
            }
        }
        TeamDirectory { users }
    }

    /// Load a `{ "teams": { "<slug>": ["login", ...] } }` listing.
    pub fn load(path: &Path) -> Result<TeamDirectory, DirectoryError> {
        let contents = fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_owned(),
            source,
        })?;
        let file: TeamsFile =
            serde_json::from_str(&contents).map_err(|source| DirectoryError::Json {
                path: path.to_owned(),
                source,
            })?;
        let directory = TeamDirectory::from_teams(file.teams);
        debug!(users = directory.len(), path = %path.display(), "loaded team directory");
        Ok(directory)
    }

    /// Team slugs for `login`. Unknown users belong to no teams.
    pub fn teams_for<'a>(&'a self, login: &str) -> impl Iterator<Item = &'a str> {
        self.users
            .get(login)
            .into_iter()
            .flat_map(|teams| teams.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    timestamp: NaiveDate,
    user_directory: TeamDirectory,
}

/// A team directory cached in a file, valid only for the day it was written.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    path: PathBuf,
}

impl DirectoryCache {
    pub fn new(path: impl Into<PathBuf>) -> DirectoryCache {
        DirectoryCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached directory if it was stored on `today`. Missing, unreadable
    /// and stale caches all yield `None`.
    pub fn load(&self, today: NaiveDate) -> Option<TeamDirectory> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "error reading cached team directory");
                return None;
            }
        };
        let cached: CacheFile = match serde_json::from_str(&contents) {
            Ok(cached) => cached,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "error parsing cached team directory");
                return None;
            }
        };
        if cached.timestamp != today {
            info!(cached = %cached.timestamp, %today, "cached team directory is stale");
            return None;
        }
        info!("using cached team directory");
        Some(cached.user_directory)
    }

    /// Overwrite the cache with `directory`, stamped with `today`.
    pub fn store(&self, today: NaiveDate, directory: &TeamDirectory) -> Result<(), DirectoryError> {
        let cached = CacheFile {
            timestamp: today,
            user_directory: directory.clone(),
        };
        let contents = serde_json::to_string(&cached).map_err(|source| DirectoryError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, contents).map_err(|source| DirectoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "updated team directory cache");
        Ok(())
    }
}

/// Pick the team directory for a check. A listing file always wins and
/// refreshes the cache when one is configured; otherwise the cache must hold a
/// directory stored today. With neither, there is no directory.
pub fn select_directory(
    listing: Option<&Path>,
    cache: Option<&DirectoryCache>,
    today: NaiveDate,
) -> Result<Option<TeamDirectory>, DirectoryError> {
    let directory = match (listing, cache) {
        (Some(listing), cache) => {
            let directory = TeamDirectory::load(listing)?;
            if let Some(cache) = cache {
                cache.store(today, &directory)?;
            }
            directory
        }
        (None, Some(cache)) => match cache.load(today) {
            Some(directory) => directory,
            None => {
                return Err(DirectoryError::StaleCache {
                    path: cache.path().to_owned(),
                    today,
                })
            }
        },
        (None, None) => return Ok(None),
    };
    if directory.is_empty() {
        warn!("team directory has no members, no owner can be approved");
    }
    Ok(Some(directory))
}

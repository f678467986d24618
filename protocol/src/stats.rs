use crate::repo::RepoName;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;

/// Tolerated per-shard conditions accumulated over one request. Sets keep
/// repositories deduplicated and sorted by name.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AggregateStats {
    pub limit_hit: bool,
    /// Repositories that could not be searched because they are still cloning.
    pub cloning: BTreeSet<RepoName>,
    /// Repositories (or their default revision) that do not exist.
    pub missing: BTreeSet<RepoName>,
    /// Repositories whose search did not finish in time. Partial results from
    /// them may still be present.
    pub timed_out: BTreeSet<RepoName>,
    /// Repositories that finished searching, fully or partially.
    pub searched: BTreeSet<RepoName>,
    /// Repositories with matches that were dropped because a cap was hit.
    pub partial: BTreeSet<RepoName>,
}

impl AggregateStats {
    /// Folds `other` into `self`. `other` is left untouched.
    pub fn update(&mut self, other: &AggregateStats) {
        self.limit_hit |= other.limit_hit;
        self.cloning.extend(other.cloning.iter().cloned());
        self.missing.extend(other.missing.iter().cloned());
        self.timed_out.extend(other.timed_out.iter().cloned());
        self.searched.extend(other.searched.iter().cloned());
        self.partial.extend(other.partial.iter().cloned());
    }

    /// True when at least one repository was searched and every one of them
    /// timed out.
    pub fn all_timed_out(&self) -> bool {
        !self.searched.is_empty() && self.searched.is_subset(&self.timed_out)
    }

    pub fn is_empty(&self) -> bool {
        self == &AggregateStats::default()
    }
}

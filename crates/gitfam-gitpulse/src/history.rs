//! Whole-history scans over every ref.
//!
//! One revwalk collects the contributor roster, the set of authors per file,
//! and per-file change frequency inside a recent window.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use gitfam_core::{FamError, UserIdentity};
use gitfam_scoring::hotspots::ChangeFrequency;
use git2::{Commit, DiffOptions, Repository, Revwalk, Sort};
use serde::Serialize;
use tracing::debug;

use crate::files::open_repository;

/// A commit author and how many commits they made.
///
/// # Examples
///
/// ```
/// use gitfam_core::UserIdentity;
/// use gitfam_gitpulse::history::Contributor;
///
/// let c = Contributor {
///     identity: UserIdentity::new("Ann", "ann@example.com"),
///     commit_count: 12,
/// };
/// assert_eq!(c.identity.display_name(), "Ann");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub identity: UserIdentity,
    pub commit_count: usize,
}

/// Everything [`scan_history`] learns in one pass.
#[derive(Debug, Clone, Default)]
pub struct HistoryScan {
    /// Author names per tracked file, over all time.
    pub file_contributors: HashMap<String, HashSet<String>>,
    /// Commits per tracked file inside the window.
    pub change_frequency: HashMap<String, ChangeFrequency>,
    /// Every author, most commits first.
    pub contributors: Vec<Contributor>,
}

/// Revwalk over every branch, tag, remote and HEAD, newest first.
pub(crate) fn walk_all_refs(repo: &Repository) -> Result<Revwalk<'_>, FamError> {
    let mut revwalk = repo
        .revwalk()
        .map_err(|e| FamError::Git(format!("failed to create revwalk: {e}")))?;
    revwalk.set_sorting(Sort::TIME).ok();

    let references = repo
        .references()
        .map_err(|e| FamError::Git(format!("failed to list references: {e}")))?;
    for reference in references.flatten() {
        if let Ok(commit) = reference.peel_to_commit() {
            revwalk
                .push(commit.id())
                .map_err(|e| FamError::Git(format!("failed to push ref: {e}")))?;
        }
    }
    if let Ok(commit) = repo.head().and_then(|h| h.peel_to_commit()) {
        revwalk
            .push(commit.id())
            .map_err(|e| FamError::Git(format!("failed to push HEAD: {e}")))?;
    }
    Ok(revwalk)
}

pub(crate) fn author_time(commit: &Commit<'_>) -> DateTime<Utc> {
    DateTime::from_timestamp(commit.author().when().seconds(), 0).unwrap_or_default()
}

/// Paths a non-merge commit added, modified or deleted.
pub(crate) fn changed_paths(repo: &Repository, commit: &Commit<'_>) -> Result<Vec<String>, FamError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| FamError::Git(format!("failed to get commit tree: {e}")))?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(
            parent
                .tree()
                .map_err(|e| FamError::Git(format!("failed to get parent tree: {e}")))?,
        ),
        Err(_) => None,
    };

    let mut diff_opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut diff_opts))
        .map_err(|e| FamError::Git(format!("failed to compute diff: {e}")))?;

    Ok(diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect())
}

#[derive(Default)]
struct Roster {
    by_email: HashMap<String, (UserIdentity, usize)>,
}

impl Roster {
    fn record(&mut self, name: &str, email: &str) {
        if name.is_empty() || email.is_empty() {
            return;
        }
        self.by_email
            .entry(email.to_lowercase())
            .or_insert_with(|| (UserIdentity::new(name.trim(), email.trim()), 0))
            .1 += 1;
    }

    fn finish(self) -> Vec<Contributor> {
        let mut contributors: Vec<Contributor> = self
            .by_email
            .into_values()
            .map(|(identity, commit_count)| Contributor {
                identity,
                commit_count,
            })
            .collect();
        contributors.sort_by(|a, b| {
            b.commit_count
                .cmp(&a.commit_count)
                .then_with(|| a.identity.name.cmp(&b.identity.name))
        });
        contributors
    }
}

/// Every commit author across all refs, deduplicated by email
/// (case-insensitive), most commits first.
///
/// # Errors
///
/// Returns [`FamError::Git`] if the repository cannot be opened or walked.
pub fn contributors(repo_path: &Path, min_commits: usize) -> Result<Vec<Contributor>, FamError> {
    let repo = open_repository(repo_path)?;
    let mut roster = Roster::default();
    for oid in walk_all_refs(&repo)? {
        let oid = oid.map_err(|e| FamError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| FamError::Git(format!("failed to find commit: {e}")))?;
        let author = commit.author();
        roster.record(author.name().unwrap_or(""), author.email().unwrap_or(""));
    }
    Ok(roster
        .finish()
        .into_iter()
        .filter(|c| c.commit_count >= min_commits)
        .collect())
}

/// Single pass over all refs collecting per-file authors, per-file change
/// frequency since `now - window_days`, and the contributor roster.
///
/// Only paths in `tracked` are recorded. Merge commits count toward the
/// roster but not toward file statistics.
///
/// # Errors
///
/// Returns [`FamError::Git`] if the repository cannot be opened or walked.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashSet;
/// use std::path::Path;
/// use gitfam_gitpulse::history::scan_history;
///
/// let tracked: HashSet<String> = ["src/main.rs".to_string()].into();
/// let scan = scan_history(Path::new("."), &tracked, 90, chrono::Utc::now()).unwrap();
/// println!("{} contributors", scan.contributors.len());
/// ```
pub fn scan_history(
    repo_path: &Path,
    tracked: &HashSet<String>,
    window_days: u32,
    now: DateTime<Utc>,
) -> Result<HistoryScan, FamError> {
    let repo = open_repository(repo_path)?;
    let since = now - Duration::days(i64::from(window_days));
    let mut scan = HistoryScan::default();
    let mut roster = Roster::default();
    let mut walked = 0usize;

    for oid in walk_all_refs(&repo)? {
        let oid = oid.map_err(|e| FamError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| FamError::Git(format!("failed to find commit: {e}")))?;
        walked += 1;

        let author = commit.author();
        let name = author.name().unwrap_or("").trim().to_string();
        roster.record(&name, author.email().unwrap_or(""));

        if commit.parent_count() > 1 {
            continue;
        }
        let date = author_time(&commit);
        let in_window = date >= since;

        for path in changed_paths(&repo, &commit)? {
            if !tracked.contains(&path) {
                continue;
            }
            if !name.is_empty() {
                scan.file_contributors
                    .entry(path.clone())
                    .or_default()
                    .insert(name.clone());
            }
            if in_window {
                let entry = scan.change_frequency.entry(path).or_default();
                entry.commit_count += 1;
                if entry.last_changed.map_or(true, |last| date > last) {
                    entry.last_changed = Some(date);
                }
            }
        }
    }

    scan.contributors = roster.finish();
    debug!(
        commits = walked,
        files = scan.file_contributors.len(),
        contributors = scan.contributors.len(),
        "history scanned"
    );
    Ok(scan)
}

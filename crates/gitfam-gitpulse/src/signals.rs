//! [`SignalSource`] backed by a local git repository.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use git2::{BlameOptions, Commit, DiffOptions, Oid, Repository, Sort, Tree};
use gitfam_core::{CommitInfo, FamError, UserIdentity};
use gitfam_scoring::signals::{BlameTally, LastTouch, SignalSource};

use crate::files::{count_lines, open_repository};
use crate::history::{author_time, changed_paths, walk_all_refs};

/// Reads blame, per-user commits and change ratios with git2.
///
/// Each lookup opens its own [`Repository`] handle so lookups can run on
/// separate blocking tasks.
///
/// # Examples
///
/// ```no_run
/// use gitfam_core::UserIdentity;
/// use gitfam_gitpulse::signals::GitSignals;
/// use gitfam_scoring::signals::SignalSource;
///
/// let signals = GitSignals::new(".");
/// let me = UserIdentity::new("Ann", "ann@example.com");
/// let tally = signals.blame("src/main.rs", &me).unwrap();
/// println!("{:.0}% of lines", tally.ratio() * 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct GitSignals {
    repo_path: PathBuf,
}

impl GitSignals {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    fn open(&self) -> Result<Repository, FamError> {
        open_repository(&self.repo_path)
    }
}

fn blob_id(commit: &Commit<'_>, path: &str) -> Option<Oid> {
    commit
        .tree()
        .ok()?
        .get_path(Path::new(path))
        .ok()
        .map(|entry| entry.id())
}

/// Whether `commit` changed `path` relative to its first parent.
fn touches(commit: &Commit<'_>, path: &str) -> bool {
    let parent = commit.parent(0).ok().and_then(|p| blob_id(&p, path));
    blob_id(commit, path) != parent
}

fn blob_lines(repo: &Repository, tree: &Tree<'_>, path: &str) -> Option<u64> {
    let entry = tree.get_path(Path::new(path)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    Some(count_lines(blob.content()))
}

fn diff_stats(
    repo: &Repository,
    old: Option<&Tree<'_>>,
    new: Option<&Tree<'_>>,
    path: &str,
) -> Result<(u64, u64), git2::Error> {
    let mut opts = DiffOptions::new();
    opts.pathspec(path).disable_pathspec_match(true);
    let diff = repo.diff_tree_to_tree(old, new, Some(&mut opts))?;
    let stats = diff.stats()?;
    Ok((stats.insertions() as u64, stats.deletions() as u64))
}

/// Non-merge commits reachable from HEAD, authored by `user`, that changed
/// `path`. Newest first.
fn touching_commits<'r>(
    repo: &'r Repository,
    path: &str,
    user: &UserIdentity,
    limit: Option<usize>,
) -> Result<Vec<Commit<'r>>, FamError> {
    let mut revwalk = repo
        .revwalk()
        .map_err(|e| FamError::signal(path, format!("failed to create revwalk: {e}")))?;
    revwalk.set_sorting(Sort::TIME).ok();
    if revwalk.push_head().is_err() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for oid in revwalk {
        let oid = oid.map_err(|e| FamError::signal(path, format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| FamError::signal(path, format!("failed to find commit: {e}")))?;
        if commit.parent_count() > 1 {
            continue;
        }
        let is_user = {
            let author = commit.author();
            user.matches(author.name().unwrap_or(""), author.email().unwrap_or(""))
        };
        if !is_user {
            continue;
        }
        if touches(&commit, path) {
            found.push(commit);
            if limit.is_some_and(|n| found.len() >= n) {
                break;
            }
        }
    }
    Ok(found)
}

impl SignalSource for GitSignals {
    fn blame(&self, path: &str, user: &UserIdentity) -> Result<BlameTally, FamError> {
        let repo = self.open()?;
        let mut opts = BlameOptions::new();
        opts.ignore_whitespace(true);
        let blame = repo
            .blame_file(Path::new(path), Some(&mut opts))
            .map_err(|e| FamError::signal(path, format!("blame failed: {e}")))?;

        let mut tally = BlameTally::default();
        for hunk in blame.iter() {
            let lines = hunk.lines_in_hunk() as u64;
            let sig = hunk.final_signature();
            tally.total_lines += lines;
            if user.matches(sig.name().unwrap_or(""), sig.email().unwrap_or("")) {
                tally.owned_lines += lines;
            }
        }
        Ok(tally)
    }

    fn commits(&self, path: &str, user: &UserIdentity) -> Result<Vec<CommitInfo>, FamError> {
        let repo = self.open()?;
        let mut out = Vec::new();
        for commit in touching_commits(&repo, path, user, None)? {
            let tree = commit
                .tree()
                .map_err(|e| FamError::signal(path, format!("failed to get commit tree: {e}")))?;
            let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
            let (added, deleted) = diff_stats(&repo, parent_tree.as_ref(), Some(&tree), path)
                .map_err(|e| FamError::signal(path, format!("failed to compute diff: {e}")))?;
            let size = blob_lines(&repo, &tree, path).unwrap_or(added).max(1);
            out.push(CommitInfo {
                hash: commit.id().to_string(),
                date: author_time(&commit),
                added_lines: added,
                deleted_lines: deleted,
                file_size_at_commit: size,
            });
        }
        Ok(out)
    }

    fn last_touch(&self, path: &str, user: &UserIdentity) -> Result<Option<LastTouch>, FamError> {
        let repo = self.open()?;
        let touch = touching_commits(&repo, path, user, Some(1))?
            .first()
            .map(|commit| LastTouch {
                hash: commit.id().to_string(),
                date: author_time(commit),
            });
        Ok(touch)
    }

    fn change_ratio_since(&self, path: &str, commit: &str) -> Result<f64, FamError> {
        let repo = self.open()?;
        let base = repo
            .revparse_single(commit)
            .and_then(|obj| obj.peel_to_tree())
            .map_err(|e| FamError::signal(path, format!("unknown commit {commit}: {e}")))?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_tree())
            .map_err(|e| FamError::signal(path, format!("failed to read HEAD: {e}")))?;

        let (added, deleted) = diff_stats(&repo, Some(&base), Some(&head), path)
            .map_err(|e| FamError::signal(path, format!("failed to compute diff: {e}")))?;
        let current = blob_lines(&repo, &head, path).unwrap_or(0).max(1);
        Ok((added + deleted) as f64 / current as f64)
    }

    fn files_committed_by(&self, user: &UserIdentity) -> Result<HashSet<String>, FamError> {
        let repo = self.open()?;
        let mut files = HashSet::new();
        for oid in walk_all_refs(&repo)? {
            let oid = oid.map_err(|e| FamError::Git(format!("revwalk error: {e}")))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| FamError::Git(format!("failed to find commit: {e}")))?;
            if commit.parent_count() > 1 {
                continue;
            }
            let author = commit.author();
            if user.matches(author.name().unwrap_or(""), author.email().unwrap_or("")) {
                files.extend(changed_paths(&repo, &commit)?);
            }
        }
        Ok(files)
    }
}

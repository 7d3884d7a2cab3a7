//! Repository access and the list of tracked files with their sizes.

use std::path::{Path, PathBuf};

use git2::{Delta, ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use gitfam_core::FamError;
use tracing::debug;

use crate::filter::PathFilter;

/// Open the repository containing `path`.
///
/// # Errors
///
/// Returns [`FamError::Git`] if `path` is not inside a git repository.
pub fn open_repository(path: &Path) -> Result<Repository, FamError> {
    Repository::discover(path).map_err(|e| {
        FamError::Git(format!("\"{}\" is not a git repository: {e}", path.display()))
    })
}

/// Working-tree root of the repository containing `path`.
///
/// # Errors
///
/// Returns [`FamError::Git`] for bare repositories or non-repositories.
pub fn repo_root(path: &Path) -> Result<PathBuf, FamError> {
    let repo = open_repository(path)?;
    repo.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| FamError::Git("bare repositories are not supported".into()))
}

/// Line count of a working-tree file; 0 for binary or unreadable files.
///
/// # Examples
///
/// ```
/// use gitfam_gitpulse::files::count_lines;
///
/// assert_eq!(count_lines(b"one\ntwo\nthree"), 3);
/// assert_eq!(count_lines(b"\x00\x01binary"), 0);
/// assert_eq!(count_lines(b""), 0);
/// ```
pub fn count_lines(content: &[u8]) -> u64 {
    if content.contains(&0) {
        return 0;
    }
    String::from_utf8_lossy(content).lines().count() as u64
}

fn head_paths(repo: &Repository) -> Option<Vec<String>> {
    let tree = repo.head().ok()?.peel_to_tree().ok()?;
    let mut paths = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            if let Some(name) = entry.name() {
                paths.push(format!("{dir}{name}"));
            }
        }
        TreeWalkResult::Ok
    })
    .ok()?;
    Some(paths)
}

fn index_paths(repo: &Repository) -> Result<Vec<String>, FamError> {
    let index = repo
        .index()
        .map_err(|e| FamError::Git(format!("failed to read index: {e}")))?;
    Ok(index
        .iter()
        .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
        .collect())
}

/// Files tracked at HEAD (or staged, before the first commit) that pass
/// `filter`, paired with their current line counts.
///
/// # Errors
///
/// Returns [`FamError::Git`] if the repository cannot be opened or read.
pub fn tracked_files(repo_path: &Path, filter: &PathFilter) -> Result<Vec<(String, u64)>, FamError> {
    let repo = open_repository(repo_path)?;
    let root = repo
        .workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| FamError::Git("bare repositories are not supported".into()))?;

    let paths = match head_paths(&repo) {
        Some(paths) => paths,
        None => index_paths(&repo)?,
    };

    let files: Vec<(String, u64)> = paths
        .into_iter()
        .filter(|p| filter.includes(p))
        .map(|p| {
            let lines = std::fs::read(root.join(&p))
                .map(|bytes| count_lines(&bytes))
                .unwrap_or(0);
            (p, lines)
        })
        .collect();
    debug!(count = files.len(), "tracked files listed");
    Ok(files)
}

/// Paths added or modified on HEAD relative to `base` (any revision
/// expression git understands). Deleted files are left out.
///
/// # Errors
///
/// Returns [`FamError::Git`] if either revision cannot be resolved to a tree.
pub fn changed_files(repo_path: &Path, base: &str) -> Result<Vec<String>, FamError> {
    let repo = open_repository(repo_path)?;
    let base_tree = repo
        .revparse_single(base)
        .and_then(|obj| obj.peel_to_tree())
        .map_err(|e| FamError::Git(format!("failed to resolve {base}: {e}")))?;
    let head_tree = repo
        .head()
        .and_then(|h| h.peel_to_tree())
        .map_err(|e| FamError::Git(format!("failed to resolve HEAD: {e}")))?;
    let diff = repo
        .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
        .map_err(|e| FamError::Git(format!("failed to diff {base}..HEAD: {e}")))?;

    let mut paths: Vec<String> = diff
        .deltas()
        .filter(|d| d.status() != Delta::Deleted)
        .filter_map(|d| d.new_file().path().map(|p| p.to_string_lossy().replace('\\', "/")))
        .collect();
    paths.sort();
    paths.dedup();
    Ok(paths)
}

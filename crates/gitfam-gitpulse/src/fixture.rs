//! Throwaway repositories for tests.

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub(crate) struct Fixture {
    pub dir: TempDir,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit `files` as `author` (`(name, email)`) `days_ago` before [`now`].
    /// A `None` body deletes the file.
    pub fn commit(
        &self,
        author: (&str, &str),
        days_ago: i64,
        files: &[(&str, Option<&str>)],
    ) -> Oid {
        let mut index = self.repo.index().unwrap();
        for (path, body) in files {
            let full = self.path().join(path);
            match body {
                Some(body) => {
                    if let Some(parent) = full.parent() {
                        std::fs::create_dir_all(parent).unwrap();
                    }
                    std::fs::write(&full, body).unwrap();
                    index.add_path(Path::new(path)).unwrap();
                }
                None => {
                    std::fs::remove_file(&full).unwrap();
                    index.remove_path(Path::new(path)).unwrap();
                }
            }
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let when = (now() - Duration::days(days_ago)).timestamp();
        let sig = Signature::new(author.0, author.1, &Time::new(when, 0)).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, "change", &tree, &parents)
            .unwrap()
    }
}

pub(crate) const ANN: (&str, &str) = ("Ann", "ann@example.com");
pub(crate) const BOB: (&str, &str) = ("Bob", "bob@example.com");
pub(crate) const CY: (&str, &str) = ("Cy", "cy@example.com");

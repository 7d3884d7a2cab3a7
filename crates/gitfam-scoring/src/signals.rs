//! The seam between the scoring engine and whatever mines git history.
//!
//! [`SignalSource`] is implemented by `gitfam_gitpulse::GitSignals` for real
//! repositories and by [`StaticSignals`] for pre-parsed data.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use gitfam_core::{CommitInfo, FamError, UserIdentity};
use serde::{Deserialize, Serialize};

/// Blame attribution of a file's current lines.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::signals::BlameTally;
///
/// assert_eq!(BlameTally { owned_lines: 30, total_lines: 200 }.ratio(), 0.15);
/// assert_eq!(BlameTally::default().ratio(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameTally {
    /// Lines attributed to the user.
    pub owned_lines: u64,
    /// All attributed lines in the file.
    pub total_lines: u64,
}

impl BlameTally {
    /// `owned / total`, or 0 for an empty file.
    pub fn ratio(&self) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        self.owned_lines as f64 / self.total_lines as f64
    }
}

/// The user's most recent commit to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastTouch {
    /// Full commit hash.
    pub hash: String,
    /// Author date of that commit.
    pub date: DateTime<Utc>,
}

/// Per-file and per-user git signals consumed by the scoring strategies.
///
/// Implementations are called from blocking worker tasks, several at a time.
/// Per-file failures are reported as errors and treated by the engine as a
/// zero contribution.
pub trait SignalSource: Send + Sync {
    /// Blame tally of `path` for `user`, ignoring whitespace-only changes.
    fn blame(&self, path: &str, user: &UserIdentity) -> Result<BlameTally, FamError>;

    /// Every commit by `user` that touched `path`.
    fn commits(&self, path: &str, user: &UserIdentity) -> Result<Vec<CommitInfo>, FamError>;

    /// The most recent commit by `user` that touched `path`, if any.
    fn last_touch(&self, path: &str, user: &UserIdentity) -> Result<Option<LastTouch>, FamError>;

    /// Lines changed in `path` since `commit`, as a fraction of its current lines.
    fn change_ratio_since(&self, path: &str, commit: &str) -> Result<f64, FamError>;

    /// Every path `user` has ever committed to.
    fn files_committed_by(&self, user: &UserIdentity) -> Result<HashSet<String>, FamError>;

    /// Paths `user` has reviewed, or `None` when no review data is available.
    fn reviewed_files(&self, _user: &UserIdentity) -> Result<Option<HashSet<String>>, FamError> {
        Ok(None)
    }
}

fn user_key(user: &UserIdentity) -> String {
    user.display_name().to_lowercase()
}

/// A [`SignalSource`] over already-parsed data, keyed by user display name
/// (case-insensitive).
///
/// Lookups with no recorded data return neutral values: an empty blame tally,
/// no commits, no last touch. Paths registered with
/// [`StaticSignals::fail_path`] return [`FamError::Signal`] for every lookup.
///
/// # Examples
///
/// ```
/// use gitfam_core::UserIdentity;
/// use gitfam_scoring::signals::{BlameTally, SignalSource, StaticSignals};
///
/// let alice = UserIdentity::from_flag("alice");
/// let signals = StaticSignals::default()
///     .with_blame(&alice, "a.rs", BlameTally { owned_lines: 5, total_lines: 10 })
///     .with_written(&alice, ["a.rs"]);
/// assert_eq!(signals.blame("a.rs", &alice).unwrap().ratio(), 0.5);
/// assert!(signals.files_committed_by(&alice).unwrap().contains("a.rs"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    blame: HashMap<(String, String), BlameTally>,
    commits: HashMap<(String, String), Vec<CommitInfo>>,
    written: HashMap<String, HashSet<String>>,
    reviewed: HashMap<String, HashSet<String>>,
    change_ratio: HashMap<String, f64>,
    failing_paths: HashSet<String>,
    failing_users: HashSet<String>,
    review_error: Option<String>,
}

impl StaticSignals {
    pub fn with_blame(mut self, user: &UserIdentity, path: &str, tally: BlameTally) -> Self {
        self.blame.insert((user_key(user), path.to_string()), tally);
        self
    }

    pub fn with_commits(mut self, user: &UserIdentity, path: &str, commits: Vec<CommitInfo>) -> Self {
        self.commits
            .insert((user_key(user), path.to_string()), commits);
        self
    }

    pub fn with_written<'a>(
        mut self,
        user: &UserIdentity,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.written
            .entry(user_key(user))
            .or_default()
            .extend(paths.into_iter().map(str::to_string));
        self
    }

    pub fn with_reviewed<'a>(
        mut self,
        user: &UserIdentity,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.reviewed
            .entry(user_key(user))
            .or_default()
            .extend(paths.into_iter().map(str::to_string));
        self
    }

    /// Change ratio reported for `path` regardless of the base commit.
    pub fn with_change_ratio(mut self, path: &str, ratio: f64) -> Self {
        self.change_ratio.insert(path.to_string(), ratio);
        self
    }

    /// Make every per-file lookup for `path` fail.
    pub fn fail_path(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    /// Make the whole-user lookup for `user` fail.
    pub fn fail_user(mut self, user: &UserIdentity) -> Self {
        self.failing_users.insert(user_key(user));
        self
    }

    /// Make review lookups report [`FamError::ReviewUnavailable`].
    pub fn without_reviews(mut self, reason: &str) -> Self {
        self.review_error = Some(reason.to_string());
        self
    }

    fn check_path(&self, path: &str) -> Result<(), FamError> {
        if self.failing_paths.contains(path) {
            return Err(FamError::signal(path, "lookup failed"));
        }
        Ok(())
    }
}

impl SignalSource for StaticSignals {
    fn blame(&self, path: &str, user: &UserIdentity) -> Result<BlameTally, FamError> {
        self.check_path(path)?;
        Ok(self
            .blame
            .get(&(user_key(user), path.to_string()))
            .copied()
            .unwrap_or_default())
    }

    fn commits(&self, path: &str, user: &UserIdentity) -> Result<Vec<CommitInfo>, FamError> {
        self.check_path(path)?;
        Ok(self
            .commits
            .get(&(user_key(user), path.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn last_touch(&self, path: &str, user: &UserIdentity) -> Result<Option<LastTouch>, FamError> {
        Ok(self.commits(path, user)?.into_iter().max_by_key(|c| c.date).map(|c| LastTouch {
            hash: c.hash,
            date: c.date,
        }))
    }

    fn change_ratio_since(&self, path: &str, _commit: &str) -> Result<f64, FamError> {
        self.check_path(path)?;
        Ok(self.change_ratio.get(path).copied().unwrap_or(0.0))
    }

    fn files_committed_by(&self, user: &UserIdentity) -> Result<HashSet<String>, FamError> {
        let key = user_key(user);
        if self.failing_users.contains(&key) {
            return Err(FamError::Git(format!("no history for {key}")));
        }
        Ok(self.written.get(&key).cloned().unwrap_or_default())
    }

    fn reviewed_files(&self, user: &UserIdentity) -> Result<Option<HashSet<String>>, FamError> {
        if let Some(reason) = &self.review_error {
            return Err(FamError::ReviewUnavailable(reason.clone()));
        }
        Ok(self.reviewed.get(&user_key(user)).cloned())
    }
}

//! The three per-file scoring strategies and the single-user entry point.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gitfam_core::{CommitInfo, ExpirationConfig, FamError, ScoringMode, UserIdentity, WeightConfig};
use serde::Serialize;
use tracing::{debug, warn};

use crate::batch::{run_blocking_batches, DEFAULT_BATCH_SIZE, USER_BATCH_SIZE};
use crate::expiration::expired_files;
use crate::math::{days_between, normalized_diff, recency_decay, sigmoid};
use crate::math::{DEFAULT_HALF_LIFE_DAYS, DEFAULT_SIGMOID_K};
use crate::signals::SignalSource;
use crate::tree::{rescore, Aggregation, FileScore, FolderScore};

/// Where signals come from and how hard to hit them.
#[derive(Clone)]
pub struct ScoringContext {
    pub source: Arc<dyn SignalSource>,
    /// Per-file lookups in flight at once.
    pub batch_size: usize,
    /// Users or reviewer candidates scored at once.
    pub user_batch_size: usize,
    /// Reference instant for recency and expiration.
    pub now: DateTime<Utc>,
}

impl ScoringContext {
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        Self {
            source,
            batch_size: DEFAULT_BATCH_SIZE,
            user_batch_size: USER_BATCH_SIZE,
            now: Utc::now(),
        }
    }

    pub fn with_batch_sizes(mut self, batch_size: usize, user_batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self.user_batch_size = user_batch_size;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// What to compute for a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringOptions {
    pub mode: ScoringMode,
    pub weights: WeightConfig,
    pub expiration: ExpirationConfig,
}

/// One user's scored tree plus headline counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamiliarityResult {
    pub tree: FolderScore,
    pub user_name: String,
    pub mode: ScoringMode,
    /// Tracked files the user has committed to.
    pub written_count: usize,
    pub total_files: usize,
    /// Tracked files the user has reviewed, when review data exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_count: Option<usize>,
}

/// Accumulated commit activity: `min(1, Σ sigmoid(diff) · decay(age))`.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use gitfam_core::CommitInfo;
/// use gitfam_scoring::strategy::commit_score;
///
/// let now = Utc::now();
/// let rewrite = CommitInfo {
///     hash: "a".into(),
///     date: now,
///     added_lines: 300,
///     deleted_lines: 0,
///     file_size_at_commit: 100,
/// };
/// assert!((commit_score(&[rewrite], now) - 3.0 / 3.3).abs() < 1e-9);
/// assert_eq!(commit_score(&[], now), 0.0);
/// ```
pub fn commit_score(commits: &[CommitInfo], now: DateTime<Utc>) -> f64 {
    let raw: f64 = commits
        .iter()
        .map(|c| {
            let diff = normalized_diff(c.added_lines, c.deleted_lines, c.file_size_at_commit);
            sigmoid(diff, DEFAULT_SIGMOID_K)
                * recency_decay(days_between(now, c.date), DEFAULT_HALF_LIFE_DAYS)
        })
        .sum();
    raw.min(1.0)
}

/// `blame · w.blame + commit · w.commit`. The review weight is not applied.
pub fn weighted_score(weights: &WeightConfig, blame: f64, commit: f64) -> f64 {
    weights.blame * blame + weights.commit * commit
}

fn mark(file: &FileScore, written: &HashSet<String>, expired: &HashSet<String>) -> FileScore {
    let mut file = file.clone();
    file.is_written = Some(written.contains(&file.path));
    if expired.contains(&file.path) {
        file.is_expired = Some(true);
    }
    file
}

/// Binary familiarity: 1 for every written file, 0 otherwise.
///
/// Expired files are forced to 0. Folders use ratio aggregation.
pub fn score_committed(
    tree: &FolderScore,
    written: &HashSet<String>,
    expired: &HashSet<String>,
) -> FolderScore {
    rescore(tree, Aggregation::Ratio, &mut |f| {
        let mut file = mark(f, written, expired);
        file.score = if file.is_expired == Some(true) || !written.contains(&file.path) {
            0.0
        } else {
            1.0
        };
        file
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct FileSignals {
    blame: f64,
    commit: Option<f64>,
}

async fn collect_signals(
    tree: &FolderScore,
    ctx: &ScoringContext,
    user: &UserIdentity,
    with_commits: bool,
    skip: &HashSet<String>,
) -> HashMap<String, FileSignals> {
    let paths: Vec<String> = tree
        .file_paths()
        .into_iter()
        .filter(|p| !skip.contains(p))
        .collect();
    let source = Arc::clone(&ctx.source);
    let user = user.clone();
    let now = ctx.now;

    let results = run_blocking_batches(paths.clone(), ctx.batch_size, move |path: String| {
        let blame = source.blame(&path, &user)?.ratio();
        let commit = if with_commits {
            Some(commit_score(&source.commits(&path, &user)?, now))
        } else {
            None
        };
        Ok(FileSignals { blame, commit })
    })
    .await;

    let mut signals = HashMap::with_capacity(paths.len());
    for (path, result) in paths.into_iter().zip(results) {
        match result {
            Ok(s) => {
                signals.insert(path, s);
            }
            Err(e) => {
                warn!(path = %path, error = %e, "signal lookup failed, scoring as 0");
                let zero = FileSignals {
                    blame: 0.0,
                    commit: with_commits.then_some(0.0),
                };
                signals.insert(path, zero);
            }
        }
    }
    signals
}

/// Blame ownership ratio per file, line-weighted folders.
pub async fn score_code_coverage(
    tree: &FolderScore,
    ctx: &ScoringContext,
    user: &UserIdentity,
    written: &HashSet<String>,
    expired: &HashSet<String>,
) -> FolderScore {
    let signals = collect_signals(tree, ctx, user, false, expired).await;
    rescore(tree, Aggregation::LineWeighted, &mut |f| {
        let mut file = mark(f, written, expired);
        let blame = signals.get(&file.path).map_or(0.0, |s| s.blame);
        file.blame_score = Some(blame);
        file.score = if file.is_expired == Some(true) { 0.0 } else { blame };
        file
    })
}

/// Blend of blame ownership and decayed commit activity.
pub async fn score_weighted(
    tree: &FolderScore,
    ctx: &ScoringContext,
    user: &UserIdentity,
    weights: &WeightConfig,
    written: &HashSet<String>,
    expired: &HashSet<String>,
) -> FolderScore {
    let signals = collect_signals(tree, ctx, user, true, expired).await;
    rescore(tree, Aggregation::LineWeighted, &mut |f| {
        let mut file = mark(f, written, expired);
        let s = signals.get(&file.path).copied().unwrap_or_default();
        let commit = s.commit.unwrap_or(0.0);
        file.blame_score = Some(s.blame);
        file.commit_score = Some(commit);
        file.score = if file.is_expired == Some(true) {
            0.0
        } else {
            weighted_score(weights, s.blame, commit)
        };
        file
    })
}

async fn blocking<R, F>(f: F) -> Result<R, FamError>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, FamError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FamError::Batch(e.to_string()))?
}

/// Score every file in `tree` for `user` under `options`.
///
/// # Errors
///
/// Returns an error when the user's commit history cannot be read at all.
/// Per-file signal failures only zero the affected file.
pub async fn compute_familiarity(
    tree: &FolderScore,
    ctx: &ScoringContext,
    user: &UserIdentity,
    options: &ScoringOptions,
) -> Result<FamiliarityResult, FamError> {
    let source = Arc::clone(&ctx.source);
    let who = user.clone();
    let written = blocking(move || source.files_committed_by(&who)).await?;

    let source = Arc::clone(&ctx.source);
    let who = user.clone();
    let reviewed = match blocking(move || source.reviewed_files(&who)).await {
        Ok(reviewed) => reviewed,
        Err(FamError::ReviewUnavailable(reason)) => {
            debug!(user = user.display_name(), %reason, "scoring without review data");
            None
        }
        Err(e) => {
            warn!(user = user.display_name(), error = %e, "review lookup failed");
            None
        }
    };

    let expired = expired_files(
        Arc::clone(&ctx.source),
        tree.file_paths(),
        user,
        options.expiration,
        ctx.batch_size,
        ctx.now,
    )
    .await;

    let mut scored = match options.mode {
        ScoringMode::Committed => score_committed(tree, &written, &expired),
        ScoringMode::CodeCoverage => score_code_coverage(tree, ctx, user, &written, &expired).await,
        ScoringMode::Weighted => {
            score_weighted(tree, ctx, user, &options.weights, &written, &expired).await
        }
    };

    if let Some(reviewed) = &reviewed {
        scored = rescore(&scored, options.mode.into(), &mut |f| {
            let mut file = f.clone();
            file.is_reviewed = Some(reviewed.contains(&file.path));
            file
        });
    }

    let files = scored.files();
    let written_count = files
        .iter()
        .filter(|f| f.is_written == Some(true))
        .count();
    let reviewed_count = reviewed
        .as_ref()
        .map(|_| files.iter().filter(|f| f.is_reviewed == Some(true)).count());
    let total_files = scored.file_count;
    debug!(
        user = user.display_name(),
        mode = %options.mode,
        written_count,
        expired = expired.len(),
        "familiarity computed"
    );

    Ok(FamiliarityResult {
        user_name: user.display_name().to_string(),
        mode: options.mode,
        written_count,
        total_files,
        reviewed_count,
        tree: scored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{BlameTally, StaticSignals};
    use crate::tree::build_tree;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn tree() -> FolderScore {
        build_tree(vec![
            ("src/a.rs".to_string(), 100),
            ("src/b.rs".to_string(), 300),
            ("docs/c.md".to_string(), 0),
        ])
    }

    fn set(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn ctx(signals: StaticSignals) -> ScoringContext {
        ScoringContext::new(Arc::new(signals)).at(now())
    }

    fn commit(days_ago: i64, added: u64, size: u64) -> CommitInfo {
        CommitInfo {
            hash: format!("h{days_ago}"),
            date: now() - Duration::days(days_ago),
            added_lines: added,
            deleted_lines: 0,
            file_size_at_commit: size,
        }
    }

    #[test]
    fn weighted_example() {
        let weights = WeightConfig {
            blame: 0.5,
            commit: 0.5,
            review: 0.0,
        };
        assert!((weighted_score(&weights, 0.15, 0.49) - 0.32).abs() < 1e-9);
    }

    #[test]
    fn commit_score_decays_and_caps() {
        let fresh = commit_score(&[commit(0, 30, 100)], now());
        assert!((fresh - 0.5).abs() < 1e-9);
        let old = commit_score(&[commit(180, 30, 100)], now());
        assert!((old - 0.25).abs() < 1e-9);
        let many: Vec<_> = (0..10).map(|_| commit(0, 300, 100)).collect();
        assert_eq!(commit_score(&many, now()), 1.0);
    }

    #[test]
    fn committed_scores_are_binary() {
        let scored = score_committed(&tree(), &set(&["src/a.rs"]), &HashSet::new());
        assert_eq!(scored.find_file("src/a.rs").unwrap().score, 1.0);
        assert_eq!(scored.find_file("src/b.rs").unwrap().score, 0.0);
        assert_eq!(scored.find_folder("src").unwrap().score, 0.5);
        assert!((scored.score - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(scored.find_file("src/b.rs").unwrap().is_written, Some(false));
    }

    #[test]
    fn expired_committed_file_scores_zero() {
        let scored = score_committed(&tree(), &set(&["src/a.rs"]), &set(&["src/a.rs"]));
        let a = scored.find_file("src/a.rs").unwrap();
        assert_eq!(a.score, 0.0);
        assert_eq!(a.is_expired, Some(true));
        assert_eq!(a.is_written, Some(true));
        assert_eq!(scored.read_count, Some(0));
    }

    #[tokio::test]
    async fn code_coverage_uses_blame_ratio() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_blame(&alice, "src/a.rs", BlameTally { owned_lines: 100, total_lines: 100 })
            .with_blame(&alice, "src/b.rs", BlameTally { owned_lines: 30, total_lines: 300 });
        let scored =
            score_code_coverage(&tree(), &ctx(signals), &alice, &HashSet::new(), &HashSet::new())
                .await;
        let b = scored.find_file("src/b.rs").unwrap();
        assert!((b.score - 0.1).abs() < 1e-9);
        assert_eq!(b.blame_score, Some(b.score));
        // (100·1.0 + 300·0.1) / 400
        assert!((scored.find_folder("src").unwrap().score - 0.325).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failing_file_scores_zero_without_affecting_siblings() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_blame(&alice, "src/a.rs", BlameTally { owned_lines: 50, total_lines: 100 })
            .fail_path("src/b.rs");
        let scored =
            score_code_coverage(&tree(), &ctx(signals), &alice, &HashSet::new(), &HashSet::new())
                .await;
        assert_eq!(scored.find_file("src/a.rs").unwrap().score, 0.5);
        assert_eq!(scored.find_file("src/b.rs").unwrap().score, 0.0);
    }

    #[tokio::test]
    async fn weighted_records_both_components() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_blame(&alice, "src/a.rs", BlameTally { owned_lines: 40, total_lines: 100 })
            .with_commits(&alice, "src/a.rs", vec![commit(0, 30, 100)]);
        let weights = WeightConfig::default();
        let scored = score_weighted(
            &tree(),
            &ctx(signals),
            &alice,
            &weights,
            &HashSet::new(),
            &HashSet::new(),
        )
        .await;
        let a = scored.find_file("src/a.rs").unwrap();
        assert_eq!(a.blame_score, Some(0.4));
        assert!((a.commit_score.unwrap() - 0.5).abs() < 1e-9);
        assert!((a.score - (0.5 * 0.4 + 0.35 * 0.5)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn expiration_overrides_every_mode() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_written(&alice, ["src/a.rs"])
            .with_blame(&alice, "src/a.rs", BlameTally { owned_lines: 100, total_lines: 100 })
            .with_commits(&alice, "src/a.rs", vec![commit(400, 100, 100)]);
        let ctx = ctx(signals);
        for mode in ScoringMode::ALL {
            let options = ScoringOptions {
                mode,
                weights: WeightConfig::default(),
                expiration: ExpirationConfig::Time { duration_days: 365 },
            };
            let result = compute_familiarity(&tree(), &ctx, &alice, &options).await.unwrap();
            let a = result.tree.find_file("src/a.rs").unwrap();
            assert_eq!(a.score, 0.0, "mode {mode}");
            assert_eq!(a.is_expired, Some(true));
        }
    }

    #[tokio::test]
    async fn compute_familiarity_counts_written_and_reviewed() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_written(&alice, ["src/a.rs", "deleted.rs"])
            .with_reviewed(&alice, ["src/b.rs"]);
        let result = compute_familiarity(&tree(), &ctx(signals), &alice, &ScoringOptions::default())
            .await
            .unwrap();
        assert_eq!(result.written_count, 1);
        assert_eq!(result.total_files, 3);
        assert_eq!(result.reviewed_count, Some(1));
        assert_eq!(result.user_name, "alice");
        assert_eq!(result.tree.find_file("src/b.rs").unwrap().is_reviewed, Some(true));
    }

    #[tokio::test]
    async fn missing_review_data_leaves_reviews_unset() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_written(&alice, ["src/a.rs"])
            .with_reviewed(&alice, ["src/b.rs"])
            .without_reviews("no token");
        let result = compute_familiarity(&tree(), &ctx(signals), &alice, &ScoringOptions::default())
            .await
            .unwrap();
        assert_eq!(result.written_count, 1);
        assert_eq!(result.reviewed_count, None);
        assert_eq!(result.tree.find_file("src/b.rs").unwrap().is_reviewed, None);
    }

    #[tokio::test]
    async fn unreadable_history_is_an_error() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default().fail_user(&alice);
        let err = compute_familiarity(&tree(), &ctx(signals), &alice, &ScoringOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FamError::Git(_)));
    }
}

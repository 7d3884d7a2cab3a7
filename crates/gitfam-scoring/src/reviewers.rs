//! Reviewer suggestion and change-set familiarity analysis.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use gitfam_core::{ExpirationConfig, FamError, ReviewerConfig, ScoringMode, UserIdentity, WeightConfig};
use serde::Serialize;
use tracing::{debug, warn};

use crate::batch::run_async_batches;
use crate::risk::{classify_change_set_risk, CoverageRiskLevel};
use crate::strategy::{compute_familiarity, ScoringContext, ScoringOptions};
use crate::tree::FolderScore;

/// Minimum familiarity with at least one changed file to be suggested.
pub const RELEVANCE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerSuggestion {
    pub user: UserIdentity,
    /// Changed files the candidate knows above the relevance threshold.
    pub relevant_files: Vec<String>,
    /// Mean familiarity across all changed files.
    pub avg_familiarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetAnalysis {
    pub author: String,
    pub changed_files: Vec<String>,
    /// Author familiarity per changed file.
    pub familiarity: BTreeMap<String, f64>,
    /// Changed files below the configured threshold.
    pub unfamiliar_files: Vec<String>,
    pub suggested_reviewers: Vec<ReviewerSuggestion>,
    pub risk_level: CoverageRiskLevel,
}

fn options_for(mode: ScoringMode) -> ScoringOptions {
    ScoringOptions {
        mode,
        weights: WeightConfig::default(),
        expiration: ExpirationConfig::Never,
    }
}

fn changed_scores(tree: &FolderScore, changed_files: &[String]) -> Vec<f64> {
    changed_files
        .iter()
        .map(|path| tree.find_file(path).map_or(0.0, |f| f.score))
        .collect()
}

/// Rank `candidates` by how well they know `changed_files`.
///
/// The author is excluded by name or email, case-insensitively. At most
/// `config.max_candidates` are scored, `ctx.user_batch_size` at a time;
/// candidates that fail to score are skipped. Returns at most `config.count`.
pub async fn suggest_reviewers(
    tree: &FolderScore,
    ctx: &ScoringContext,
    changed_files: &[String],
    author: &UserIdentity,
    candidates: Vec<UserIdentity>,
    mode: ScoringMode,
    config: &ReviewerConfig,
) -> Vec<ReviewerSuggestion> {
    if changed_files.is_empty() {
        return Vec::new();
    }
    let candidates: Vec<UserIdentity> = candidates
        .into_iter()
        .filter(|c| !c.matches(&author.name, &author.email))
        .take(config.max_candidates)
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let shared = Arc::new(tree.clone());
    let changed: Arc<[String]> = changed_files.into();
    let options = options_for(mode);
    let outcomes = run_async_batches(candidates.clone(), ctx.user_batch_size, |user: UserIdentity| {
        let tree = Arc::clone(&shared);
        let changed = Arc::clone(&changed);
        let ctx = ctx.clone();
        let options = options.clone();
        async move {
            let result = compute_familiarity(&tree, &ctx, &user, &options).await?;
            Ok::<_, FamError>((user, changed_scores(&result.tree, &changed)))
        }
    })
    .await;

    let mut suggestions = Vec::new();
    for (candidate, outcome) in candidates.iter().zip(outcomes) {
        let (user, scores) = match outcome {
            Ok(scored) => scored,
            Err(e) => {
                warn!(user = candidate.display_name(), error = %e, "skipping reviewer candidate");
                continue;
            }
        };
        let relevant_files: Vec<String> = changed_files
            .iter()
            .zip(&scores)
            .filter(|(_, score)| **score > RELEVANCE_THRESHOLD)
            .map(|(path, _)| path.clone())
            .collect();
        if relevant_files.is_empty() {
            continue;
        }
        let avg_familiarity = scores.iter().sum::<f64>() / scores.len() as f64;
        suggestions.push(ReviewerSuggestion {
            user,
            relevant_files,
            avg_familiarity,
        });
    }

    suggestions.sort_by(|a, b| {
        b.avg_familiarity
            .partial_cmp(&a.avg_familiarity)
            .unwrap_or(Ordering::Equal)
    });
    suggestions.truncate(config.count);
    debug!(suggested = suggestions.len(), "reviewer suggestion finished");
    suggestions
}

/// Score the author on a change set and suggest reviewers for it.
///
/// Files below `config.threshold` percent familiarity are unfamiliar; the
/// unfamiliar share decides the risk level.
///
/// # Errors
///
/// Returns an error when the author's own history cannot be scored.
pub async fn analyze_change_set(
    tree: &FolderScore,
    ctx: &ScoringContext,
    changed_files: &[String],
    author: &UserIdentity,
    candidates: Vec<UserIdentity>,
    mode: ScoringMode,
    config: &ReviewerConfig,
) -> Result<ChangeSetAnalysis, FamError> {
    let result = compute_familiarity(tree, ctx, author, &options_for(mode)).await?;
    let scores = changed_scores(&result.tree, changed_files);
    let threshold = f64::from(config.threshold) / 100.0;

    let unfamiliar_files: Vec<String> = changed_files
        .iter()
        .zip(&scores)
        .filter(|(_, score)| **score < threshold)
        .map(|(path, _)| path.clone())
        .collect();
    let ratio = if changed_files.is_empty() {
        0.0
    } else {
        unfamiliar_files.len() as f64 / changed_files.len() as f64
    };
    let familiarity = changed_files.iter().cloned().zip(scores).collect();

    let suggested_reviewers =
        suggest_reviewers(tree, ctx, changed_files, author, candidates, mode, config).await;

    Ok(ChangeSetAnalysis {
        author: result.user_name,
        changed_files: changed_files.to_vec(),
        familiarity,
        unfamiliar_files,
        suggested_reviewers,
        risk_level: classify_change_set_risk(ratio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::StaticSignals;
    use crate::tree::build_tree;

    fn tree() -> FolderScore {
        build_tree(vec![
            ("src/a.rs".to_string(), 10),
            ("src/b.rs".to_string(), 10),
            ("src/c.rs".to_string(), 10),
            ("README.md".to_string(), 10),
        ])
    }

    fn changed() -> Vec<String> {
        vec!["src/a.rs".to_string(), "src/b.rs".to_string()]
    }

    fn user(name: &str) -> UserIdentity {
        UserIdentity::new(name, format!("{name}@example.com"))
    }

    #[tokio::test]
    async fn ranks_relevant_candidates_and_excludes_author() {
        let signals = StaticSignals::default()
            .with_written(&user("ann"), ["src/a.rs", "src/b.rs"])
            .with_written(&user("bob"), ["src/a.rs"])
            .with_written(&user("cy"), ["README.md"])
            .with_written(&user("dee"), ["src/a.rs", "src/b.rs"]);
        let ctx = ScoringContext::new(Arc::new(signals));
        let author = UserIdentity::from_flag("DEE");
        let candidates = ["ann", "bob", "cy", "dee"].map(user).to_vec();

        let got = suggest_reviewers(
            &tree(),
            &ctx,
            &changed(),
            &author,
            candidates,
            ScoringMode::Committed,
            &ReviewerConfig::default(),
        )
        .await;

        let names: Vec<_> = got.iter().map(|s| s.user.name.as_str()).collect();
        assert_eq!(names, vec!["ann", "bob"]);
        assert_eq!(got[0].avg_familiarity, 1.0);
        assert_eq!(got[1].relevant_files, vec!["src/a.rs"]);
        assert_eq!(got[1].avg_familiarity, 0.5);
    }

    #[tokio::test]
    async fn respects_count_and_candidate_cap() {
        let signals = StaticSignals::default()
            .with_written(&user("ann"), ["src/a.rs"])
            .with_written(&user("bob"), ["src/a.rs"])
            .with_written(&user("cy"), ["src/a.rs"]);
        let ctx = ScoringContext::new(Arc::new(signals));
        let config = ReviewerConfig {
            count: 5,
            max_candidates: 2,
            ..ReviewerConfig::default()
        };
        let got = suggest_reviewers(
            &tree(),
            &ctx,
            &changed(),
            &user("zed"),
            ["ann", "bob", "cy"].map(user).to_vec(),
            ScoringMode::Committed,
            &config,
        )
        .await;
        assert_eq!(got.len(), 2);
    }

    #[tokio::test]
    async fn failing_candidates_are_skipped() {
        let signals = StaticSignals::default()
            .with_written(&user("ann"), ["src/a.rs"])
            .fail_user(&user("bob"));
        let ctx = ScoringContext::new(Arc::new(signals));
        let got = suggest_reviewers(
            &tree(),
            &ctx,
            &changed(),
            &user("zed"),
            ["bob", "ann"].map(user).to_vec(),
            ScoringMode::Committed,
            &ReviewerConfig::default(),
        )
        .await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].user.name, "ann");
    }

    #[tokio::test]
    async fn change_set_risk_follows_unfamiliar_share() {
        let signals = StaticSignals::default()
            .with_written(&user("ann"), ["src/a.rs"])
            .with_written(&user("bob"), ["src/b.rs"]);
        let ctx = ScoringContext::new(Arc::new(signals));
        let analysis = analyze_change_set(
            &tree(),
            &ctx,
            &changed(),
            &user("ann"),
            ["ann", "bob"].map(user).to_vec(),
            ScoringMode::Committed,
            &ReviewerConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(analysis.unfamiliar_files, vec!["src/b.rs"]);
        assert_eq!(analysis.familiarity["src/a.rs"], 1.0);
        assert_eq!(analysis.risk_level, CoverageRiskLevel::Risk);
        assert_eq!(analysis.suggested_reviewers.len(), 1);
        assert_eq!(analysis.suggested_reviewers[0].user.name, "bob");
    }

    #[tokio::test]
    async fn empty_change_set_is_safe() {
        let ctx = ScoringContext::new(Arc::new(StaticSignals::default()));
        let analysis = analyze_change_set(
            &tree(),
            &ctx,
            &[],
            &user("ann"),
            Vec::new(),
            ScoringMode::Committed,
            &ReviewerConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(analysis.risk_level, CoverageRiskLevel::Safe);
        assert!(analysis.suggested_reviewers.is_empty());
    }
}

//! Side-by-side familiarity of several users over one tree.

use std::collections::HashMap;
use std::sync::Arc;

use gitfam_core::{FamError, ScoringMode, UserIdentity};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::run_async_batches;
use crate::strategy::{compute_familiarity, FamiliarityResult, ScoringContext, ScoringOptions};
use crate::tree::{walk_files, FileScore, FolderScore, TreeNode};

/// One user's score on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScore {
    pub user: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_written: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reviewed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MultiUserTreeNode {
    File(MultiUserFileScore),
    Folder(MultiUserFolderScore),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiUserFileScore {
    pub path: String,
    pub lines: u64,
    /// Mean of `user_scores`.
    pub score: f64,
    pub user_scores: Vec<UserScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiUserFolderScore {
    pub path: String,
    pub lines: u64,
    /// Mean of `user_scores`.
    pub score: f64,
    pub file_count: usize,
    pub user_scores: Vec<UserScore>,
    pub children: Vec<MultiUserTreeNode>,
}

impl MultiUserFolderScore {
    fn empty() -> Self {
        Self {
            path: String::new(),
            lines: 0,
            score: 0.0,
            file_count: 0,
            user_scores: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Find a file by path.
    pub fn find_file(&self, path: &str) -> Option<&MultiUserFileScore> {
        self.children.iter().find_map(|child| match child {
            MultiUserTreeNode::File(f) if f.path == path => Some(f),
            MultiUserTreeNode::Folder(f) => f.find_file(path),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user: String,
    pub written_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_count: Option<usize>,
    /// Root score of the user's own tree.
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiUserResult {
    pub tree: MultiUserFolderScore,
    /// Users in `user_scores` order.
    pub users: Vec<String>,
    pub mode: ScoringMode,
    pub total_files: usize,
    pub user_summaries: Vec<UserSummary>,
}

fn mean(scores: &[UserScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
}

fn file_index(tree: &FolderScore) -> HashMap<&str, &FileScore> {
    let mut index = HashMap::with_capacity(tree.file_count);
    walk_files(tree, &mut |f| {
        index.insert(f.path.as_str(), f);
    });
    index
}

/// Zip N scored trees of the same shape into one.
///
/// The first tree provides the structure. Every node gets one
/// [`UserScore`] per input, in input order, copied from that user's node at
/// the same path (0 when missing). Node scores are the mean across users.
pub fn merge_trees(results: &[FamiliarityResult]) -> MultiUserFolderScore {
    let Some(first) = results.first() else {
        return MultiUserFolderScore::empty();
    };
    let indexes: Vec<_> = results.iter().map(|r| file_index(&r.tree)).collect();
    merge_folder(&first.tree, results, &indexes)
}

fn merge_folder(
    folder: &FolderScore,
    results: &[FamiliarityResult],
    indexes: &[HashMap<&str, &FileScore>],
) -> MultiUserFolderScore {
    let children = folder
        .children
        .iter()
        .map(|child| match child {
            TreeNode::File(f) => {
                let user_scores: Vec<UserScore> = results
                    .iter()
                    .zip(indexes)
                    .map(|(r, index)| match index.get(f.path.as_str()) {
                        Some(own) => UserScore {
                            user: r.user_name.clone(),
                            score: own.score,
                            is_written: own.is_written,
                            is_reviewed: own.is_reviewed,
                        },
                        None => UserScore {
                            user: r.user_name.clone(),
                            score: 0.0,
                            is_written: None,
                            is_reviewed: None,
                        },
                    })
                    .collect();
                MultiUserTreeNode::File(MultiUserFileScore {
                    path: f.path.clone(),
                    lines: f.lines,
                    score: mean(&user_scores),
                    user_scores,
                })
            }
            TreeNode::Folder(f) => MultiUserTreeNode::Folder(merge_folder(f, results, indexes)),
        })
        .collect();

    let user_scores: Vec<UserScore> = results
        .iter()
        .map(|r| UserScore {
            user: r.user_name.clone(),
            score: r.tree.find_folder(&folder.path).map_or(0.0, |f| f.score),
            is_written: None,
            is_reviewed: None,
        })
        .collect();

    MultiUserFolderScore {
        path: folder.path.clone(),
        lines: folder.lines,
        score: mean(&user_scores),
        file_count: folder.file_count,
        user_scores,
        children,
    }
}

/// Score every user, `ctx.user_batch_size` at a time, and merge.
///
/// Users whose scoring fails are logged and left out.
///
/// # Errors
///
/// Returns [`FamError::Batch`] when no user could be scored.
pub async fn compute_multi_user(
    tree: &FolderScore,
    ctx: &ScoringContext,
    users: Vec<UserIdentity>,
    options: &ScoringOptions,
) -> Result<MultiUserResult, FamError> {
    let requested = users.len();
    let shared = Arc::new(tree.clone());
    let outcomes = run_async_batches(users.clone(), ctx.user_batch_size, |user: UserIdentity| {
        let tree = Arc::clone(&shared);
        let ctx = ctx.clone();
        let options = options.clone();
        async move { compute_familiarity(&tree, &ctx, &user, &options).await }
    })
    .await;

    let mut results = Vec::with_capacity(requested);
    for (user, outcome) in users.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => warn!(user = user.display_name(), error = %e, "skipping user"),
        }
    }
    if results.is_empty() {
        return Err(FamError::Batch(format!(
            "none of the {requested} requested users could be scored"
        )));
    }
    debug!(scored = results.len(), requested, "multi-user scoring finished");

    let merged = merge_trees(&results);
    let user_summaries = results
        .iter()
        .map(|r| UserSummary {
            user: r.user_name.clone(),
            written_count: r.written_count,
            reviewed_count: r.reviewed_count,
            overall_score: r.tree.score,
        })
        .collect();

    Ok(MultiUserResult {
        tree: merged,
        users: results.iter().map(|r| r.user_name.clone()).collect(),
        mode: options.mode,
        total_files: results[0].total_files,
        user_summaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::StaticSignals;
    use crate::strategy::score_committed;
    use crate::tree::build_tree;
    use std::collections::HashSet;

    fn base() -> FolderScore {
        build_tree(vec![
            ("src/a.rs".to_string(), 10),
            ("src/b.rs".to_string(), 10),
            ("lib.rs".to_string(), 10),
        ])
    }

    fn result_for(user: &str, written: &[&str]) -> FamiliarityResult {
        let written: HashSet<String> = written.iter().map(|s| s.to_string()).collect();
        let tree = score_committed(&base(), &written, &HashSet::new());
        FamiliarityResult {
            written_count: written.len(),
            total_files: tree.file_count,
            tree,
            user_name: user.to_string(),
            mode: ScoringMode::Committed,
            reviewed_count: None,
        }
    }

    fn check_round_trip(folder: &MultiUserFolderScore, results: &[FamiliarityResult]) {
        for (i, r) in results.iter().enumerate() {
            let own = r.tree.find_folder(&folder.path).unwrap();
            assert_eq!(folder.user_scores[i].score, own.score);
            assert_eq!(folder.user_scores[i].user, r.user_name);
        }
        for child in &folder.children {
            match child {
                MultiUserTreeNode::File(f) => {
                    for (i, r) in results.iter().enumerate() {
                        let own = r.tree.find_file(&f.path).unwrap();
                        assert_eq!(f.user_scores[i].score, own.score);
                        assert_eq!(f.user_scores[i].is_written, own.is_written);
                    }
                }
                MultiUserTreeNode::Folder(sub) => check_round_trip(sub, results),
            }
        }
    }

    #[test]
    fn merge_preserves_every_users_scores() {
        let results = vec![
            result_for("ann", &["src/a.rs"]),
            result_for("bob", &["src/a.rs", "src/b.rs", "lib.rs"]),
            result_for("cy", &[]),
        ];
        let merged = merge_trees(&results);
        check_round_trip(&merged, &results);

        let a = merged.find_file("src/a.rs").unwrap();
        assert!((a.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(merged.file_count, 3);
    }

    #[test]
    fn missing_nodes_score_zero() {
        let mut short = result_for("bob", &["lib.rs"]);
        short.tree = score_committed(
            &build_tree(vec![("lib.rs".to_string(), 10)]),
            &HashSet::from(["lib.rs".to_string()]),
            &HashSet::new(),
        );
        let results = vec![result_for("ann", &["src/a.rs"]), short];
        let merged = merge_trees(&results);
        let a = merged.find_file("src/a.rs").unwrap();
        assert_eq!(a.user_scores[1].score, 0.0);
        assert_eq!(a.user_scores[1].is_written, None);
        assert_eq!(a.score, 0.5);
    }

    #[test]
    fn merging_nothing_gives_empty_tree() {
        let merged = merge_trees(&[]);
        assert!(merged.children.is_empty());
        assert_eq!(merged.score, 0.0);
    }

    #[tokio::test]
    async fn failing_users_are_dropped() {
        let ann = UserIdentity::from_flag("ann");
        let bob = UserIdentity::from_flag("bob");
        let cy = UserIdentity::from_flag("cy");
        let signals = StaticSignals::default()
            .with_written(&ann, ["src/a.rs"])
            .with_written(&cy, ["lib.rs", "src/b.rs"])
            .fail_user(&bob);
        let ctx = ScoringContext::new(Arc::new(signals)).with_batch_sizes(4, 2);

        let result = compute_multi_user(&base(), &ctx, vec![ann, bob, cy], &ScoringOptions::default())
            .await
            .unwrap();

        assert_eq!(result.users, vec!["ann", "cy"]);
        assert_eq!(result.user_summaries[1].written_count, 2);
        assert!((result.user_summaries[1].overall_score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.tree.user_scores.len(), 2);
        assert_eq!(result.total_files, 3);
    }

    #[tokio::test]
    async fn all_users_failing_is_an_error() {
        let ann = UserIdentity::from_flag("ann");
        let signals = StaticSignals::default().fail_user(&ann);
        let ctx = ScoringContext::new(Arc::new(signals));
        let err = compute_multi_user(&base(), &ctx, vec![ann], &ScoringOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FamError::Batch(_)));
    }
}

//! Knowledge coverage: who has touched what, and how few people hold it.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::risk::{classify_bus_factor_risk, classify_coverage_risk, CoverageRiskLevel};
use crate::tree::{FolderScore, TreeNode};

/// Share of files the smallest covering group must reach.
pub const BUS_FACTOR_TARGET: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CoverageTreeNode {
    File(CoverageFileScore),
    Folder(CoverageFolderScore),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageFileScore {
    pub path: String,
    pub lines: u64,
    pub contributor_count: usize,
    /// Sorted contributor names.
    pub contributors: Vec<String>,
    pub risk_level: CoverageRiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageFolderScore {
    pub path: String,
    pub lines: u64,
    pub file_count: usize,
    /// Mean contributors per descendant file, one decimal.
    pub avg_contributors: f64,
    pub bus_factor: usize,
    pub risk_level: CoverageRiskLevel,
    pub children: Vec<CoverageTreeNode>,
}

impl CoverageFolderScore {
    /// All descendant files in tree order.
    pub fn files(&self) -> Vec<&CoverageFileScore> {
        let mut out = Vec::with_capacity(self.file_count);
        collect_files(self, &mut out);
        out
    }
}

fn collect_files<'a>(folder: &'a CoverageFolderScore, out: &mut Vec<&'a CoverageFileScore>) {
    for child in &folder.children {
        match child {
            CoverageTreeNode::File(f) => out.push(f),
            CoverageTreeNode::Folder(f) => collect_files(f, out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCoverageResult {
    pub tree: CoverageFolderScore,
    pub total_contributors: usize,
    pub total_files: usize,
    /// Files with at most one contributor, fewest first.
    pub risk_files: Vec<CoverageFileScore>,
    pub overall_bus_factor: usize,
}

/// Smallest number of people who together touched at least half the files.
///
/// Greedy set cover: repeatedly take the contributor adding the most
/// uncovered files, the lexicographically smallest on ties. Stops once the
/// target is met or nobody adds anything.
///
/// # Examples
///
/// ```
/// use std::collections::{HashMap, HashSet};
/// use gitfam_scoring::coverage::calculate_bus_factor;
///
/// let owners: HashMap<String, HashSet<String>> = ["a", "b", "c", "d"]
///     .iter()
///     .map(|f| (f.to_string(), HashSet::from([format!("dev-{f}")])))
///     .collect();
/// assert_eq!(calculate_bus_factor(&owners), 2);
/// assert_eq!(calculate_bus_factor(&HashMap::new()), 0);
/// ```
pub fn calculate_bus_factor(file_contributors: &HashMap<String, HashSet<String>>) -> usize {
    let total = file_contributors.len();
    if total == 0 {
        return 0;
    }
    let target = (total as f64 * BUS_FACTOR_TARGET).ceil() as usize;

    let mut by_contributor: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for (file, contributors) in file_contributors {
        for contributor in contributors {
            by_contributor
                .entry(contributor.as_str())
                .or_default()
                .insert(file.as_str());
        }
    }

    let mut covered: HashSet<&str> = HashSet::new();
    let mut count = 0;
    while covered.len() < target {
        let best = by_contributor
            .iter()
            .map(|(name, files)| (*name, files.iter().filter(|f| !covered.contains(*f)).count()))
            .fold(None, |best: Option<(&str, usize)>, (name, gain)| match best {
                Some((_, top)) if top >= gain => best,
                _ => Some((name, gain)),
            });
        let Some((name, gain)) = best else { break };
        if gain == 0 {
            break;
        }
        if let Some(files) = by_contributor.remove(name) {
            covered.extend(files);
        }
        count += 1;
    }
    count
}

fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Mirror `tree` with contributor data.
///
/// Files absent from `file_contributors` have no contributors.
pub fn build_coverage_tree(
    tree: &FolderScore,
    file_contributors: &HashMap<String, HashSet<String>>,
) -> CoverageFolderScore {
    let mut children = Vec::with_capacity(tree.children.len());
    for child in &tree.children {
        match child {
            TreeNode::File(f) => {
                let mut contributors: Vec<String> = file_contributors
                    .get(&f.path)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default();
                contributors.sort();
                children.push(CoverageTreeNode::File(CoverageFileScore {
                    path: f.path.clone(),
                    lines: f.lines,
                    contributor_count: contributors.len(),
                    risk_level: classify_coverage_risk(contributors.len()),
                    contributors,
                }));
            }
            TreeNode::Folder(f) => {
                children.push(CoverageTreeNode::Folder(build_coverage_tree(f, file_contributors)));
            }
        }
    }

    let mut folder = CoverageFolderScore {
        path: tree.path.clone(),
        lines: tree.lines,
        file_count: tree.file_count,
        avg_contributors: 0.0,
        bus_factor: 0,
        risk_level: CoverageRiskLevel::Risk,
        children,
    };

    let files = folder.files();
    let local: HashMap<String, HashSet<String>> = files
        .iter()
        .map(|f| (f.path.clone(), f.contributors.iter().cloned().collect()))
        .collect();
    let avg = if files.is_empty() {
        0.0
    } else {
        files.iter().map(|f| f.contributor_count).sum::<usize>() as f64 / files.len() as f64
    };
    let bus_factor = calculate_bus_factor(&local);

    folder.avg_contributors = round_one_decimal(avg);
    folder.bus_factor = bus_factor;
    folder.risk_level = classify_bus_factor_risk(bus_factor);
    folder
}

/// Coverage tree, single-owner files and the repository-wide bus factor.
///
/// `total_contributors` is the size of the contributor roster. The overall bus
/// factor only counts files somebody has committed to.
pub fn compute_team_coverage(
    tree: &FolderScore,
    file_contributors: &HashMap<String, HashSet<String>>,
    total_contributors: usize,
) -> TeamCoverageResult {
    let coverage = build_coverage_tree(tree, file_contributors);

    let mut risk_files: Vec<CoverageFileScore> = coverage
        .files()
        .into_iter()
        .filter(|f| f.contributor_count <= 1)
        .cloned()
        .collect();
    risk_files.sort_by(|a, b| {
        a.contributor_count
            .cmp(&b.contributor_count)
            .then_with(|| a.path.cmp(&b.path))
    });

    let owned: HashMap<String, HashSet<String>> = coverage
        .files()
        .into_iter()
        .filter(|f| f.contributor_count > 0)
        .map(|f| (f.path.clone(), f.contributors.iter().cloned().collect()))
        .collect();

    TeamCoverageResult {
        total_contributors,
        total_files: tree.file_count,
        risk_files,
        overall_bus_factor: calculate_bus_factor(&owned),
        tree: coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_tree;

    fn owners(entries: &[(&str, &[&str])]) -> HashMap<String, HashSet<String>> {
        entries
            .iter()
            .map(|(file, devs)| {
                (
                    file.to_string(),
                    devs.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn single_owner_has_bus_factor_one() {
        let map = owners(&[("a", &["ann"]), ("b", &["ann"]), ("c", &["ann"])]);
        assert_eq!(calculate_bus_factor(&map), 1);
    }

    #[test]
    fn disjoint_owners_need_half() {
        let map = owners(&[("a", &["w"]), ("b", &["x"]), ("c", &["y"]), ("d", &["z"])]);
        assert_eq!(calculate_bus_factor(&map), 2);
    }

    #[test]
    fn files_without_contributors_cannot_be_covered() {
        let map = owners(&[("a", &[]), ("b", &[]), ("c", &["ann"])]);
        // target 2, ann covers 1, then nobody adds anything
        assert_eq!(calculate_bus_factor(&map), 1);
    }

    #[test]
    fn greedy_prefers_widest_then_smallest_name() {
        let map = owners(&[
            ("a", &["zed", "amy"]),
            ("b", &["zed", "amy"]),
            ("c", &["bob"]),
            ("d", &["cat"]),
            ("e", &["dan"]),
            ("f", &["eve"]),
        ]);
        // target 3: amy (tie with zed, smaller name) covers 2, then bob
        assert_eq!(calculate_bus_factor(&map), 2);
    }

    fn sample_tree() -> FolderScore {
        build_tree(vec![
            ("src/a.rs".to_string(), 10),
            ("src/b.rs".to_string(), 20),
            ("src/c.rs".to_string(), 30),
            ("README.md".to_string(), 5),
        ])
    }

    #[test]
    fn coverage_tree_aggregates_folders() {
        let map = owners(&[
            ("src/a.rs", &["ann", "bob"]),
            ("src/b.rs", &["ann"]),
            ("src/c.rs", &["bob", "cy", "dee", "eve"]),
            ("README.md", &["ann"]),
        ]);
        let tree = build_coverage_tree(&sample_tree(), &map);

        let CoverageTreeNode::Folder(src) = &tree.children[0] else {
            panic!("expected src folder first");
        };
        // (2 + 1 + 4) / 3 = 2.333..
        assert_eq!(src.avg_contributors, 2.3);
        assert_eq!(src.bus_factor, 1);
        assert_eq!(src.risk_level, CoverageRiskLevel::Risk);
        assert_eq!(src.file_count, 3);

        let c = src.files()[2];
        assert_eq!(c.contributors, vec!["bob", "cy", "dee", "eve"]);
        assert_eq!(c.risk_level, CoverageRiskLevel::Safe);
    }

    #[test]
    fn team_coverage_reports_risk_files() {
        let map = owners(&[
            ("src/a.rs", &["ann", "bob"]),
            ("src/b.rs", &["ann"]),
            ("README.md", &["bob"]),
        ]);
        let result = compute_team_coverage(&sample_tree(), &map, 2);
        let risky: Vec<_> = result.risk_files.iter().map(|f| f.path.as_str()).collect();
        // src/c.rs has nobody
        assert_eq!(risky, vec!["src/c.rs", "README.md", "src/b.rs"]);
        assert_eq!(result.total_files, 4);
        assert_eq!(result.total_contributors, 2);
        assert_eq!(result.overall_bus_factor, result.tree.bus_factor);
        assert_eq!(result.overall_bus_factor, 1);
    }

    #[test]
    fn overall_bus_factor_skips_unowned_files() {
        let map = owners(&[("src/a.rs", &["ann"]), ("src/b.rs", &["bob"])]);
        let result = compute_team_coverage(&sample_tree(), &map, 2);
        // the root counts all four files and needs both owners
        assert_eq!(result.tree.bus_factor, 2);
        assert_eq!(result.overall_bus_factor, 1);
    }

    #[test]
    fn folder_risk_uses_bus_factor_rule() {
        let map = owners(&[
            ("src/a.rs", &["ann"]),
            ("src/b.rs", &["bob"]),
            ("src/c.rs", &["cy"]),
            ("README.md", &["dee"]),
        ]);
        let tree = build_coverage_tree(&sample_tree(), &map);
        assert_eq!(tree.bus_factor, 2);
        assert_eq!(tree.risk_level, CoverageRiskLevel::Moderate);
    }
}

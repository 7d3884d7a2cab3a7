//! Folder/file familiarity tree and its bottom-up aggregation.
//!
//! [`build_tree`] turns a flat list of `(path, lines)` pairs into a
//! [`FolderScore`] root with line and file totals. Scores are never written in
//! place: [`rescore`] folds an existing tree into a new one, applying a
//! per-file scorer and recomputing every folder after its children.

use std::collections::BTreeMap;

use gitfam_core::ScoringMode;
use serde::{Deserialize, Serialize};

/// A file or folder in the familiarity tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File(FileScore),
    Folder(FolderScore),
}

impl TreeNode {
    pub fn path(&self) -> &str {
        match self {
            TreeNode::File(f) => &f.path,
            TreeNode::Folder(f) => &f.path,
        }
    }

    pub fn lines(&self) -> u64 {
        match self {
            TreeNode::File(f) => f.lines,
            TreeNode::Folder(f) => f.lines,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            TreeNode::File(f) => f.score,
            TreeNode::Folder(f) => f.score,
        }
    }
}

/// Familiarity of a single tracked file.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::tree::FileScore;
///
/// let file = FileScore::new("src/main.rs", 120);
/// assert_eq!(file.score, 0.0);
/// assert!(file.is_expired.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileScore {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// Current line count.
    pub lines: u64,
    /// Familiarity in `[0, 1]`.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_written: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reviewed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blame_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
}

impl FileScore {
    pub fn new(path: impl Into<String>, lines: u64) -> Self {
        Self {
            path: path.into(),
            lines,
            score: 0.0,
            is_written: None,
            is_reviewed: None,
            blame_score: None,
            commit_score: None,
            is_expired: None,
        }
    }
}

/// Aggregated familiarity of a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderScore {
    /// Slash-separated path; the root is `""`.
    pub path: String,
    /// Sum of descendant file lines.
    pub lines: u64,
    /// Aggregated familiarity in `[0, 1]`.
    pub score: f64,
    /// Number of descendant files.
    pub file_count: usize,
    /// Descendant files with a positive score, once scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_count: Option<usize>,
    /// Sub-folders first, then files, each sorted by path.
    pub children: Vec<TreeNode>,
}

impl FolderScore {
    fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lines: 0,
            score: 0.0,
            file_count: 0,
            read_count: None,
            children: Vec::new(),
        }
    }

    /// All descendant files in tree order.
    pub fn files(&self) -> Vec<&FileScore> {
        let mut out = Vec::with_capacity(self.file_count);
        walk_files(self, &mut |f| out.push(f));
        out
    }

    /// All descendant file paths in tree order.
    pub fn file_paths(&self) -> Vec<String> {
        self.files().into_iter().map(|f| f.path.clone()).collect()
    }

    /// Find a folder (including `self`) by path.
    pub fn find_folder(&self, path: &str) -> Option<&FolderScore> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            TreeNode::Folder(f) if is_ancestor_or_self(&f.path, path) => f.find_folder(path),
            _ => None,
        })
    }

    /// Find a file by path.
    pub fn find_file(&self, path: &str) -> Option<&FileScore> {
        self.children.iter().find_map(|child| match child {
            TreeNode::File(f) if f.path == path => Some(f),
            TreeNode::Folder(f) if is_ancestor_or_self(&f.path, path) => f.find_file(path),
            _ => None,
        })
    }
}

fn is_ancestor_or_self(folder: &str, path: &str) -> bool {
    folder.is_empty()
        || path == folder
        || (path.starts_with(folder) && path.as_bytes().get(folder.len()) == Some(&b'/'))
}

/// Visit every file below `folder`.
pub fn walk_files<'a>(folder: &'a FolderScore, visitor: &mut impl FnMut(&'a FileScore)) {
    for child in &folder.children {
        match child {
            TreeNode::File(f) => visitor(f),
            TreeNode::Folder(f) => walk_files(f, visitor),
        }
    }
}

#[derive(Default)]
struct DirBuilder {
    dirs: BTreeMap<String, DirBuilder>,
    files: BTreeMap<String, u64>,
}

impl DirBuilder {
    fn insert(&mut self, segments: &[&str], full_path: &str, lines: u64) {
        match segments {
            [] => {}
            [_file] => {
                self.files.insert(full_path.to_string(), lines);
            }
            [dir, rest @ ..] => self
                .dirs
                .entry((*dir).to_string())
                .or_default()
                .insert(rest, full_path, lines),
        }
    }

    fn finish(self, path: String) -> FolderScore {
        let mut folder = FolderScore::empty(path);
        for (name, dir) in self.dirs {
            let child_path = if folder.path.is_empty() {
                name
            } else {
                format!("{}/{name}", folder.path)
            };
            let child = dir.finish(child_path);
            folder.lines += child.lines;
            folder.file_count += child.file_count;
            folder.children.push(TreeNode::Folder(child));
        }
        for (file_path, lines) in self.files {
            folder.lines += lines;
            folder.file_count += 1;
            folder.children.push(TreeNode::File(FileScore::new(file_path, lines)));
        }
        folder
    }
}

/// Build a folder tree from tracked files and their line counts.
///
/// Every ancestor directory is materialised; `lines` and `file_count` are
/// summed bottom-up. All scores start at 0. The result does not depend on
/// input order; if a path appears twice the last line count wins.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::tree::build_tree;
///
/// let tree = build_tree(vec![
///     ("src/main.rs".to_string(), 100),
///     ("src/core/lib.rs".to_string(), 50),
///     ("README.md".to_string(), 10),
/// ]);
/// assert_eq!(tree.path, "");
/// assert_eq!(tree.file_count, 3);
/// assert_eq!(tree.lines, 160);
/// assert_eq!(tree.find_folder("src").unwrap().lines, 150);
/// ```
pub fn build_tree(files: impl IntoIterator<Item = (String, u64)>) -> FolderScore {
    let mut root = DirBuilder::default();
    for (path, lines) in files {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let normalized = segments.join("/");
        root.insert(&segments, &normalized, lines);
    }
    root.finish(String::new())
}

/// How folder scores are derived from their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// `read_count / file_count`: share of files touched at all.
    Ratio,
    /// `Σ(lines · score) / Σ lines`: share of the code mass known.
    LineWeighted,
}

impl From<ScoringMode> for Aggregation {
    fn from(mode: ScoringMode) -> Self {
        match mode {
            ScoringMode::Committed => Aggregation::Ratio,
            ScoringMode::CodeCoverage | ScoringMode::Weighted => Aggregation::LineWeighted,
        }
    }
}

/// Fold `folder` into a new tree, scoring each file with `score_file` and
/// recomputing every folder strictly after its descendants.
///
/// `read_count` is propagated by summation under both rules.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::tree::{build_tree, rescore, Aggregation};
///
/// let tree = build_tree(vec![("a.rs".to_string(), 30), ("b.rs".to_string(), 10)]);
/// let scored = rescore(&tree, Aggregation::LineWeighted, &mut |f| {
///     let mut f = f.clone();
///     f.score = if f.path == "a.rs" { 1.0 } else { 0.0 };
///     f
/// });
/// assert_eq!(scored.score, 0.75);
/// assert_eq!(scored.read_count, Some(1));
/// ```
pub fn rescore<F>(folder: &FolderScore, aggregation: Aggregation, score_file: &mut F) -> FolderScore
where
    F: FnMut(&FileScore) -> FileScore,
{
    let mut children = Vec::with_capacity(folder.children.len());
    let mut file_count = 0usize;
    let mut read_count = 0usize;
    let mut lines = 0u64;
    let mut weighted = 0.0f64;

    for child in &folder.children {
        match child {
            TreeNode::File(f) => {
                let scored = score_file(f);
                file_count += 1;
                lines += scored.lines;
                weighted += scored.score * scored.lines as f64;
                if scored.score > 0.0 {
                    read_count += 1;
                }
                children.push(TreeNode::File(scored));
            }
            TreeNode::Folder(f) => {
                let sub = rescore(f, aggregation, score_file);
                file_count += sub.file_count;
                lines += sub.lines;
                weighted += sub.score * sub.lines as f64;
                read_count += sub.read_count.unwrap_or(0);
                children.push(TreeNode::Folder(sub));
            }
        }
    }

    let score = match aggregation {
        Aggregation::Ratio if file_count > 0 => read_count as f64 / file_count as f64,
        Aggregation::LineWeighted if lines > 0 => weighted / lines as f64,
        _ => 0.0,
    };

    FolderScore {
        path: folder.path.clone(),
        lines,
        score,
        file_count,
        read_count: Some(read_count),
        children,
    }
}

/// Recompute folder scores from the file scores already in the tree.
pub fn aggregate(folder: &FolderScore, aggregation: Aggregation) -> FolderScore {
    rescore(folder, aggregation, &mut FileScore::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FolderScore {
        build_tree(vec![
            ("src/main.rs".to_string(), 100),
            ("src/util/math.rs".to_string(), 40),
            ("src/util/fmt.rs".to_string(), 60),
            ("docs/guide.md".to_string(), 0),
            ("README.md".to_string(), 20),
        ])
    }

    fn assert_totals(folder: &FolderScore) {
        let mut files = 0usize;
        let mut lines = 0u64;
        for child in &folder.children {
            match child {
                TreeNode::File(f) => {
                    files += 1;
                    lines += f.lines;
                    assert!(f.path.starts_with(&folder.path));
                }
                TreeNode::Folder(f) => {
                    assert_totals(f);
                    files += f.file_count;
                    lines += f.lines;
                    assert!(f.path.starts_with(&folder.path));
                }
            }
        }
        assert_eq!(folder.file_count, files, "file_count of {:?}", folder.path);
        assert_eq!(folder.lines, lines, "lines of {:?}", folder.path);
    }

    #[test]
    fn builds_all_ancestor_folders() {
        let tree = sample();
        assert_eq!(tree.file_count, 5);
        assert_eq!(tree.lines, 220);
        let util = tree.find_folder("src/util").unwrap();
        assert_eq!(util.file_count, 2);
        assert_eq!(util.lines, 100);
        assert_eq!(tree.find_folder("src").unwrap().file_count, 3);
        assert!(tree.find_folder("src/u").is_none());
        assert_totals(&tree);
    }

    #[test]
    fn build_is_order_independent() {
        let mut input = vec![
            ("b/x.rs".to_string(), 1),
            ("a/y.rs".to_string(), 2),
            ("a/b/z.rs".to_string(), 3),
            ("top.rs".to_string(), 4),
        ];
        let forward = build_tree(input.clone());
        input.reverse();
        assert_eq!(forward, build_tree(input));
    }

    #[test]
    fn folders_precede_files() {
        let tree = sample();
        let kinds: Vec<&str> = tree.children.iter().map(TreeNode::path).collect();
        assert_eq!(kinds, vec!["docs", "src", "README.md"]);
    }

    #[test]
    fn empty_input_gives_empty_root() {
        let tree = build_tree(Vec::new());
        assert_eq!(tree.file_count, 0);
        assert_eq!(tree.lines, 0);
        let scored = aggregate(&tree, Aggregation::LineWeighted);
        assert_eq!(scored.score, 0.0);
        let scored = aggregate(&tree, Aggregation::Ratio);
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn find_file_descends_by_prefix() {
        let tree = sample();
        assert_eq!(tree.find_file("src/util/fmt.rs").unwrap().lines, 60);
        assert!(tree.find_file("src/util").is_none());
        assert!(tree.find_file("nope.rs").is_none());
    }

    fn score_by<'a>(map: &'a [(&'a str, f64)]) -> impl FnMut(&FileScore) -> FileScore + 'a {
        move |f| {
            let mut f = f.clone();
            f.score = map
                .iter()
                .find(|(p, _)| *p == f.path)
                .map_or(0.0, |(_, s)| *s);
            f
        }
    }

    fn check_line_weighted(folder: &FolderScore) {
        let mut lines = 0u64;
        let mut weighted = 0.0;
        for child in &folder.children {
            if let TreeNode::Folder(f) = child {
                check_line_weighted(f);
            }
            lines += child.lines();
            weighted += child.lines() as f64 * child.score();
        }
        let expected = if lines == 0 { 0.0 } else { weighted / lines as f64 };
        assert!((folder.score - expected).abs() < 1e-12);
    }

    fn check_ratio(folder: &FolderScore) {
        let positive = folder.files().iter().filter(|f| f.score > 0.0).count();
        assert_eq!(folder.read_count, Some(positive));
        let expected = if folder.file_count == 0 {
            0.0
        } else {
            positive as f64 / folder.file_count as f64
        };
        assert!((folder.score - expected).abs() < 1e-12);
        for child in &folder.children {
            if let TreeNode::Folder(f) = child {
                check_ratio(f);
            }
        }
    }

    #[test]
    fn line_weighted_aggregation() {
        let scores = [
            ("src/main.rs", 0.5),
            ("src/util/math.rs", 1.0),
            ("README.md", 0.25),
        ];
        let scored = rescore(&sample(), Aggregation::LineWeighted, &mut score_by(&scores));
        // util: 40*1.0 / 100
        assert!((scored.find_folder("src/util").unwrap().score - 0.4).abs() < 1e-12);
        // src: (100*0.5 + 100*0.4) / 200
        assert!((scored.find_folder("src").unwrap().score - 0.45).abs() < 1e-12);
        // docs has no lines
        assert_eq!(scored.find_folder("docs").unwrap().score, 0.0);
        check_line_weighted(&scored);
        assert_eq!(scored.read_count, Some(3));
        assert_totals(&scored);
    }

    #[test]
    fn ratio_aggregation_ignores_file_size() {
        let scores = [("docs/guide.md", 1.0), ("src/util/fmt.rs", 1.0)];
        let scored = rescore(&sample(), Aggregation::Ratio, &mut score_by(&scores));
        assert_eq!(scored.read_count, Some(2));
        assert!((scored.score - 0.4).abs() < 1e-12);
        assert_eq!(scored.find_folder("docs").unwrap().score, 1.0);
        assert!((scored.find_folder("src").unwrap().score - 1.0 / 3.0).abs() < 1e-12);
        check_ratio(&scored);
    }

    #[test]
    fn rescore_leaves_input_untouched() {
        let tree = sample();
        let before = tree.clone();
        let _ = rescore(&tree, Aggregation::Ratio, &mut |f| {
            let mut f = f.clone();
            f.score = 1.0;
            f
        });
        assert_eq!(tree, before);
    }

    #[test]
    fn mode_selects_aggregation() {
        assert_eq!(Aggregation::from(ScoringMode::Committed), Aggregation::Ratio);
        assert_eq!(
            Aggregation::from(ScoringMode::CodeCoverage),
            Aggregation::LineWeighted
        );
        assert_eq!(
            Aggregation::from(ScoringMode::Weighted),
            Aggregation::LineWeighted
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let tree = build_tree(vec![("a/b.rs".to_string(), 3)]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["children"][0]["type"], "folder");
        assert_eq!(json["children"][0]["children"][0]["type"], "file");
        assert_eq!(json["fileCount"], 1);
    }
}

//! Change frequency × unfamiliarity hotspot ranking.
//!
//! A hotspot is a file that changes often and that few people (or the
//! current user) know well: `risk = (freq / max_freq) · (1 − familiarity)`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::{classify_hotspot_risk, HotspotRiskLevel};
use crate::tree::{walk_files, FolderScore};

/// Default look-back window for change frequency.
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// Default share of the team that counts as "everyone knows this file".
pub const DEFAULT_TEAM_PROXY_FACTOR: f64 = 0.3;

/// How often a file changed inside the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFrequency {
    pub commit_count: u32,
    pub last_changed: Option<DateTime<Utc>>,
}

/// Whose familiarity offsets change frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotMode {
    /// One user's scored tree.
    #[default]
    Personal,
    /// Contributor-count proxy across the whole team.
    Team,
}

impl fmt::Display for HotspotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotspotMode::Personal => write!(f, "personal"),
            HotspotMode::Team => write!(f, "team"),
        }
    }
}

/// A ranked file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotFileScore {
    pub path: String,
    pub lines: u64,
    pub familiarity: f64,
    /// Commits touching the file inside the window.
    pub change_frequency: u32,
    pub last_changed: Option<DateTime<Utc>>,
    pub risk: f64,
    pub risk_level: HotspotRiskLevel,
}

/// File counts per risk level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl HotspotSummary {
    fn count(&mut self, level: HotspotRiskLevel) {
        match level {
            HotspotRiskLevel::Critical => self.critical += 1,
            HotspotRiskLevel::High => self.high += 1,
            HotspotRiskLevel::Medium => self.medium += 1,
            HotspotRiskLevel::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotResult {
    /// Every tracked file, riskiest first.
    pub files: Vec<HotspotFileScore>,
    /// Set in personal mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub hotspot_mode: HotspotMode,
    /// Window in days.
    pub time_window: u32,
    pub summary: HotspotSummary,
}

/// Per-file scores taken from a single user's scored tree.
pub fn personal_familiarity(tree: &FolderScore) -> HashMap<String, f64> {
    let mut map = HashMap::with_capacity(tree.file_count);
    walk_files(tree, &mut |f| {
        map.insert(f.path.clone(), f.score);
    });
    map
}

/// Team familiarity proxy: `min(1, contributors / max(1, total · factor))`.
///
/// # Examples
///
/// ```
/// use std::collections::{HashMap, HashSet};
/// use gitfam_scoring::hotspots::team_proxy_familiarity;
///
/// let contributors = HashMap::from([
///     ("a.rs".to_string(), HashSet::from(["ann".to_string(), "bo".to_string()])),
/// ]);
/// let files = vec!["a.rs".to_string(), "b.rs".to_string()];
/// let fam = team_proxy_familiarity(&files, &contributors, 10, 0.3);
/// assert!((fam["a.rs"] - 2.0 / 3.0).abs() < 1e-9);
/// assert_eq!(fam["b.rs"], 0.0);
/// ```
pub fn team_proxy_familiarity(
    files: &[String],
    contributors: &HashMap<String, HashSet<String>>,
    total_contributors: usize,
    factor: f64,
) -> HashMap<String, f64> {
    let denom = (total_contributors as f64 * factor).max(1.0);
    files
        .iter()
        .map(|path| {
            let count = contributors.get(path).map_or(0, HashSet::len);
            (path.clone(), (count as f64 / denom).min(1.0))
        })
        .collect()
}

/// `(freq / max_freq) · (1 − familiarity)`; 0 when nothing changed.
pub fn hotspot_risk(change_frequency: u32, max_frequency: u32, familiarity: f64) -> f64 {
    if max_frequency == 0 {
        return 0.0;
    }
    f64::from(change_frequency) / f64::from(max_frequency) * (1.0 - familiarity)
}

/// Rank every file in `tree` by hotspot risk.
///
/// Files missing from `frequencies` have not changed in the window; files
/// missing from `familiarity` are unknown to everyone. Ties on risk are
/// ordered by path.
pub fn compute_hotspots(
    tree: &FolderScore,
    frequencies: &HashMap<String, ChangeFrequency>,
    familiarity: &HashMap<String, f64>,
    mode: HotspotMode,
    user_name: Option<String>,
    time_window: u32,
) -> HotspotResult {
    let max_frequency = tree
        .files()
        .iter()
        .filter_map(|f| frequencies.get(&f.path))
        .map(|f| f.commit_count)
        .max()
        .unwrap_or(0);

    let mut files = Vec::with_capacity(tree.file_count);
    walk_files(tree, &mut |f| {
        let freq = frequencies.get(&f.path).copied().unwrap_or_default();
        let fam = familiarity.get(&f.path).copied().unwrap_or(0.0);
        let risk = hotspot_risk(freq.commit_count, max_frequency, fam);
        files.push(HotspotFileScore {
            path: f.path.clone(),
            lines: f.lines,
            familiarity: fam,
            change_frequency: freq.commit_count,
            last_changed: freq.last_changed,
            risk,
            risk_level: classify_hotspot_risk(risk),
        });
    });

    files.sort_by(|a, b| {
        b.risk
            .partial_cmp(&a.risk)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut summary = HotspotSummary::default();
    for f in &files {
        summary.count(f.risk_level);
    }

    HotspotResult {
        files,
        user_name,
        hotspot_mode: mode,
        time_window,
        summary,
    }
}

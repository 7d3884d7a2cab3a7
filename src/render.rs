//! Text and Markdown views of engine results.
//!
//! JSON output is plain `serde_json` on the result types and lives in
//! `main.rs`; everything here is for humans.

use std::fmt::Write as _;

use gitfam_core::ScoringMode;
use gitfam_scoring::coverage::{CoverageFolderScore, CoverageTreeNode, TeamCoverageResult};
use gitfam_scoring::hotspots::{HotspotMode, HotspotResult};
use gitfam_scoring::multi_user::{MultiUserFolderScore, MultiUserResult, MultiUserTreeNode};
use gitfam_scoring::reviewers::ChangeSetAnalysis;
use gitfam_scoring::risk::{CoverageRiskLevel, HotspotRiskLevel};
use gitfam_scoring::strategy::FamiliarityResult;
use gitfam_scoring::tree::{FolderScore, TreeNode};

const BAR_WIDTH: usize = 10;
const NAME_COLUMN_WIDTH: usize = 24;
const FOLDER_DEPTH: usize = 2;
const HOTSPOT_ROWS: usize = 30;
const RISK_FILE_ROWS: usize = 20;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const GRAY: &str = "\x1b[90m";
const BRIGHT_RED: &str = "\x1b[91m";

fn paint(use_color: bool, style: &str, text: &str) -> String {
    if use_color {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn score_color(score: f64) -> &'static str {
    if score >= 0.8 {
        GREEN
    } else if score >= 0.5 {
        YELLOW
    } else if score > 0.0 {
        RED
    } else {
        GRAY
    }
}

/// `█` per tenth of `score`, `░` for the rest.
pub fn bar(score: f64, use_color: bool) -> String {
    let filled = ((score * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let text = format!(
        "{}{}",
        "\u{2588}".repeat(filled),
        "\u{2591}".repeat(BAR_WIDTH - filled)
    );
    paint(use_color, score_color(score), &text)
}

pub fn percent(score: f64) -> String {
    format!("{}%", (score * 100.0).round() as i64)
}

pub fn mode_label(mode: ScoringMode) -> &'static str {
    match mode {
        ScoringMode::Committed => "Committed mode",
        ScoringMode::CodeCoverage => "Code Coverage mode",
        ScoringMode::Weighted => "Weighted mode",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

fn folder_name(path: &str) -> String {
    format!("{}/", path.rsplit('/').next().unwrap_or(path))
}

fn score_folders(folder: &FolderScore, indent: usize, mode: ScoringMode, use_color: bool, out: &mut String) {
    let prefix = "  ".repeat(indent);
    for child in &folder.children {
        let TreeNode::Folder(sub) = child else { continue };
        let name = folder_name(&sub.path);
        let pad = NAME_COLUMN_WIDTH
            .saturating_sub(indent * 2 + name.chars().count())
            .max(1);
        let _ = write!(
            out,
            "{prefix}{}{} {}  {:>4}",
            paint(use_color, BOLD, &name),
            " ".repeat(pad),
            bar(sub.score, use_color),
            percent(sub.score)
        );
        if mode == ScoringMode::Committed {
            let _ = write!(out, " ({}/{} files)", sub.read_count.unwrap_or(0), sub.file_count);
        }
        out.push('\n');
        if indent < FOLDER_DEPTH {
            score_folders(sub, indent + 1, mode, use_color, out);
        }
    }
}

/// Single-user familiarity overview, two folder levels deep.
pub fn score_text(result: &FamiliarityResult, repo_name: &str, use_color: bool) -> String {
    let mut out = String::new();
    let tree = &result.tree;
    let _ = writeln!(
        out,
        "{}\n",
        paint(
            use_color,
            BOLD,
            &format!("gitfam \u{2014} {repo_name} ({})", mode_label(result.mode))
        )
    );
    if result.mode == ScoringMode::Committed {
        let _ = writeln!(
            out,
            "Overall: {}/{} files ({})\n",
            tree.read_count.unwrap_or(0),
            tree.file_count,
            percent(tree.score)
        );
    } else {
        let _ = writeln!(out, "Overall: {}\n", percent(tree.score));
    }
    score_folders(tree, 1, result.mode, use_color, &mut out);
    if result.mode == ScoringMode::Committed {
        let _ = writeln!(out, "\nWritten: {} files", result.written_count);
    }
    if let Some(reviewed) = result.reviewed_count {
        let _ = writeln!(out, "Reviewed: {reviewed} files");
    }
    out
}

fn score_rows(folder: &FolderScore, depth: usize, out: &mut String) {
    for child in &folder.children {
        let TreeNode::Folder(sub) = child else { continue };
        let _ = writeln!(
            out,
            "| `{}/` | {} | {}/{} |",
            sub.path,
            percent(sub.score),
            sub.read_count.unwrap_or(0),
            sub.file_count
        );
        if depth < FOLDER_DEPTH {
            score_rows(sub, depth + 1, out);
        }
    }
}

pub fn score_markdown(result: &FamiliarityResult, repo_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Familiarity: {repo_name}\n");
    let _ = writeln!(
        out,
        "**User:** {} | **Mode:** {} | **Overall:** {} | **Written:** {}/{} files\n",
        result.user_name,
        result.mode,
        percent(result.tree.score),
        result.written_count,
        result.total_files
    );
    let _ = writeln!(out, "| Folder | Familiarity | Files read |");
    let _ = writeln!(out, "|--------|-------------|------------|");
    score_rows(&result.tree, 1, &mut out);
    out
}

fn hotspot_badge(level: HotspotRiskLevel) -> &'static str {
    match level {
        HotspotRiskLevel::Critical => " CRIT ",
        HotspotRiskLevel::High => " HIGH ",
        HotspotRiskLevel::Medium => "  MED ",
        HotspotRiskLevel::Low => "  LOW ",
    }
}

fn hotspot_color(level: HotspotRiskLevel) -> &'static str {
    match level {
        HotspotRiskLevel::Critical => RED,
        HotspotRiskLevel::High => BRIGHT_RED,
        HotspotRiskLevel::Medium => YELLOW,
        HotspotRiskLevel::Low => GREEN,
    }
}

fn hotspot_title(result: &HotspotResult) -> String {
    let label = match result.hotspot_mode {
        HotspotMode::Team => "Team Hotspots",
        HotspotMode::Personal => "Personal Hotspots",
    };
    match &result.user_name {
        Some(user) => format!("{label} ({user})"),
        None => label.to_string(),
    }
}

/// Ranked table of files that changed inside the window.
pub fn hotspots_text(result: &HotspotResult, repo_name: &str, use_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        paint(
            use_color,
            BOLD,
            &format!("gitfam \u{2014} {} \u{2014} {repo_name}", hotspot_title(result))
        )
    );
    let _ = writeln!(
        out,
        "{}\n",
        paint(use_color, GRAY, &format!("  Time window: last {} days", result.time_window))
    );

    let active: Vec<_> = result.files.iter().filter(|f| f.change_frequency > 0).collect();
    if active.is_empty() {
        let _ = writeln!(out, "{}", paint(use_color, GRAY, "  No files changed in the time window."));
        return out;
    }

    let header = format!(
        "  {:<5} {:<42} {:>11} {:>8} {:>6}  Level",
        "Rank", "File", "Familiarity", "Changes", "Risk"
    );
    let _ = writeln!(out, "{}", paint(use_color, GRAY, &header));
    let _ = writeln!(out, "{}", paint(use_color, GRAY, &format!("  {}", "\u{2500}".repeat(90))));
    for (i, f) in active.iter().take(HOTSPOT_ROWS).enumerate() {
        let color = hotspot_color(f.risk_level);
        let _ = writeln!(
            out,
            "  {}{:<42} {:>11} {:>8} {}  {}",
            paint(use_color, color, &format!("{:<5}", i + 1)),
            truncate(&f.path, 42),
            percent(f.familiarity),
            f.change_frequency,
            paint(use_color, color, &format!("{:>6.2}", f.risk)),
            paint(use_color, color, hotspot_badge(f.risk_level))
        );
    }
    if active.len() > HOTSPOT_ROWS {
        let more = format!("  ... and {} more files", active.len() - HOTSPOT_ROWS);
        let _ = writeln!(out, "{}", paint(use_color, GRAY, &more));
    }

    let s = &result.summary;
    let _ = writeln!(out, "\n{}", paint(use_color, BOLD, "Summary:"));
    if s.critical > 0 {
        let _ = writeln!(out, "  {}", paint(use_color, RED, &format!("Critical Risk: {} files", s.critical)));
    }
    if s.high > 0 {
        let _ = writeln!(out, "  {}", paint(use_color, BRIGHT_RED, &format!("High Risk: {} files", s.high)));
    }
    if s.medium > 0 {
        let _ = writeln!(out, "  {}", paint(use_color, YELLOW, &format!("Medium Risk: {} files", s.medium)));
    }
    let _ = writeln!(out, "  {}", paint(use_color, GREEN, &format!("Low Risk: {} files", s.low)));
    if s.critical > 0 || s.high > 0 {
        let tip = "  Recommendation: focus review and knowledge transfer on critical/high risk files.";
        let _ = writeln!(out, "\n{}", paint(use_color, GRAY, tip));
    }
    out
}

pub fn hotspots_markdown(result: &HotspotResult, repo_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}: {repo_name}\n", hotspot_title(result));
    let _ = writeln!(out, "Time window: last {} days\n", result.time_window);
    let active: Vec<_> = result.files.iter().filter(|f| f.change_frequency > 0).collect();
    if active.is_empty() {
        let _ = writeln!(out, "No files changed in the time window.");
        return out;
    }
    let _ = writeln!(out, "| # | File | Familiarity | Changes | Risk | Level |");
    let _ = writeln!(out, "|---|------|-------------|---------|------|-------|");
    for (i, f) in active.iter().take(HOTSPOT_ROWS).enumerate() {
        let _ = writeln!(
            out,
            "| {} | `{}` | {} | {} | {:.2} | {} |",
            i + 1,
            f.path,
            percent(f.familiarity),
            f.change_frequency,
            f.risk,
            f.risk_level
        );
    }
    let s = &result.summary;
    let _ = writeln!(
        out,
        "\n**Summary:** {} critical, {} high, {} medium, {} low",
        s.critical, s.high, s.medium, s.low
    );
    out
}

fn coverage_badge(level: CoverageRiskLevel) -> &'static str {
    match level {
        CoverageRiskLevel::Risk => " RISK ",
        CoverageRiskLevel::Moderate => " MOD  ",
        CoverageRiskLevel::Safe => " SAFE ",
    }
}

fn coverage_color(level: CoverageRiskLevel) -> &'static str {
    match level {
        CoverageRiskLevel::Risk => RED,
        CoverageRiskLevel::Moderate => YELLOW,
        CoverageRiskLevel::Safe => GREEN,
    }
}

fn bus_factor_color(bus_factor: usize) -> &'static str {
    match bus_factor {
        0 | 1 => RED,
        2 => YELLOW,
        _ => GREEN,
    }
}

fn coverage_folders(folder: &CoverageFolderScore, indent: usize, use_color: bool, out: &mut String) {
    let prefix = "  ".repeat(indent);
    for child in &folder.children {
        let CoverageTreeNode::Folder(sub) = child else { continue };
        let _ = writeln!(
            out,
            "{prefix}{} {:>4} avg    {:>2}       {}",
            paint(use_color, BOLD, &format!("{:<24}", folder_name(&sub.path))),
            sub.avg_contributors,
            sub.bus_factor,
            paint(use_color, coverage_color(sub.risk_level), coverage_badge(sub.risk_level))
        );
        if indent < FOLDER_DEPTH {
            coverage_folders(sub, indent + 1, use_color, out);
        }
    }
}

/// Bus factor, single-owner files, and per-folder coverage.
pub fn coverage_text(result: &TeamCoverageResult, use_color: bool) -> String {
    let mut out = String::new();
    let title = format!(
        "gitfam \u{2014} Team Coverage ({} files, {} contributors)",
        result.total_files, result.total_contributors
    );
    let _ = writeln!(out, "{}\n", paint(use_color, BOLD, &title));
    let _ = writeln!(
        out,
        "Overall Bus Factor: {}\n",
        paint(
            use_color,
            bus_factor_color(result.overall_bus_factor),
            &result.overall_bus_factor.to_string()
        )
    );

    if result.risk_files.is_empty() {
        let _ = writeln!(out, "{}\n", paint(use_color, GREEN, "No high-risk files found."));
    } else {
        let _ = writeln!(out, "{}", paint(use_color, RED, "Risk Files (0-1 contributors):"));
        for f in result.risk_files.iter().take(RISK_FILE_ROWS) {
            let label = if f.contributor_count == 0 {
                paint(use_color, RED, "0 people")
            } else {
                paint(use_color, YELLOW, &format!("1 person  ({})", f.contributors.join(", ")))
            };
            let _ = writeln!(out, "  {:<40} {label}", f.path);
        }
        if result.risk_files.len() > RISK_FILE_ROWS {
            let more = format!("  ... and {} more", result.risk_files.len() - RISK_FILE_ROWS);
            let _ = writeln!(out, "{}", paint(use_color, GRAY, &more));
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{}", paint(use_color, BOLD, "Folder Coverage:"));
    let header = format!("  {:<24} {:>11}  {:>10}   Risk", "Folder", "Avg Contrib", "Bus Factor");
    let _ = writeln!(out, "{}", paint(use_color, GRAY, &header));
    coverage_folders(&result.tree, 1, use_color, &mut out);
    out
}

fn coverage_rows(folder: &CoverageFolderScore, depth: usize, out: &mut String) {
    for child in &folder.children {
        let CoverageTreeNode::Folder(sub) = child else { continue };
        let _ = writeln!(
            out,
            "| `{}/` | {} | {} | {} |",
            sub.path, sub.avg_contributors, sub.bus_factor, sub.risk_level
        );
        if depth < FOLDER_DEPTH {
            coverage_rows(sub, depth + 1, out);
        }
    }
}

pub fn coverage_markdown(result: &TeamCoverageResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Team Coverage\n");
    let _ = writeln!(
        out,
        "**Files:** {} | **Contributors:** {} | **Bus factor:** {}\n",
        result.total_files, result.total_contributors, result.overall_bus_factor
    );
    if !result.risk_files.is_empty() {
        let _ = writeln!(out, "## Risk files\n");
        for f in result.risk_files.iter().take(RISK_FILE_ROWS) {
            let owners = if f.contributors.is_empty() {
                "nobody".to_string()
            } else {
                f.contributors.join(", ")
            };
            let _ = writeln!(out, "- `{}` ({owners})", f.path);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "| Folder | Avg contributors | Bus factor | Risk |");
    let _ = writeln!(out, "|--------|------------------|------------|------|");
    coverage_rows(&result.tree, 1, &mut out);
    out
}

fn compare_folders(
    folder: &MultiUserFolderScore,
    indent: usize,
    name_width: usize,
    use_color: bool,
    out: &mut String,
) {
    let prefix = "  ".repeat(indent);
    for child in &folder.children {
        let MultiUserTreeNode::Folder(sub) = child else { continue };
        let name = format!("{:<name_width$}", truncate(&folder_name(&sub.path), name_width));
        let scores: Vec<String> = sub
            .user_scores
            .iter()
            .map(|s| format!("{:>7}", percent(s.score)))
            .collect();
        let _ = writeln!(out, "{prefix}{}  {}", paint(use_color, BOLD, &name), scores.join("  "));
        if indent < FOLDER_DEPTH {
            compare_folders(sub, indent + 1, name_width, use_color, out);
        }
    }
}

/// Side-by-side folder familiarity for several users.
pub fn compare_text(result: &MultiUserResult, repo_name: &str, use_color: bool) -> String {
    let mut out = String::new();
    let title = format!(
        "gitfam \u{2014} {repo_name} ({}, {} users)",
        mode_label(result.mode),
        result.user_summaries.len()
    );
    let _ = writeln!(out, "{}\n", paint(use_color, BOLD, &title));
    let _ = writeln!(out, "{}", paint(use_color, BOLD, "Overall:"));
    for summary in &result.user_summaries {
        let _ = write!(
            out,
            "  {:<14} {}  {:>4}",
            truncate(&summary.user, 14),
            bar(summary.overall_score, use_color),
            percent(summary.overall_score)
        );
        if result.mode == ScoringMode::Committed {
            let _ = write!(out, " ({}/{} files)", summary.written_count, result.total_files);
        }
        out.push('\n');
    }

    let name_width = 20;
    let names: Vec<String> = result
        .users
        .iter()
        .map(|u| format!("{:>7}", truncate(u, 7)))
        .collect();
    let _ = writeln!(
        out,
        "\n{}{}{}",
        paint(use_color, BOLD, "Folders:"),
        " ".repeat(name_width - 4),
        names.join("  ")
    );
    compare_folders(&result.tree, 1, name_width, use_color, &mut out);
    out
}

fn compare_rows(folder: &MultiUserFolderScore, depth: usize, out: &mut String) {
    for child in &folder.children {
        let MultiUserTreeNode::Folder(sub) = child else { continue };
        let scores: Vec<String> = sub.user_scores.iter().map(|s| percent(s.score)).collect();
        let _ = writeln!(out, "| `{}/` | {} |", sub.path, scores.join(" | "));
        if depth < FOLDER_DEPTH {
            compare_rows(sub, depth + 1, out);
        }
    }
}

pub fn compare_markdown(result: &MultiUserResult, repo_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Familiarity comparison: {repo_name}\n");
    let _ = writeln!(out, "**Mode:** {} | **Files:** {}\n", result.mode, result.total_files);
    let _ = writeln!(out, "| User | Overall | Written |");
    let _ = writeln!(out, "|------|---------|---------|");
    for s in &result.user_summaries {
        let _ = writeln!(out, "| {} | {} | {} |", s.user, percent(s.overall_score), s.written_count);
    }
    let _ = writeln!(out, "\n| Folder | {} |", result.users.join(" | "));
    let _ = writeln!(out, "|--------|{}", "---|".repeat(result.users.len()));
    compare_rows(&result.tree, 1, &mut out);
    out
}

/// Author familiarity with a change set and who else knows it.
pub fn reviewers_text(analysis: &ChangeSetAnalysis, use_color: bool) -> String {
    let mut out = String::new();
    let title = format!(
        "gitfam \u{2014} Change set by {} ({} files)",
        analysis.author,
        analysis.changed_files.len()
    );
    let _ = writeln!(out, "{}\n", paint(use_color, BOLD, &title));
    let _ = writeln!(
        out,
        "Risk: {}\n",
        paint(
            use_color,
            coverage_color(analysis.risk_level),
            coverage_badge(analysis.risk_level).trim()
        )
    );

    let _ = writeln!(out, "{}", paint(use_color, BOLD, "Author familiarity:"));
    for path in &analysis.changed_files {
        let score = analysis.familiarity.get(path).copied().unwrap_or(0.0);
        let _ = writeln!(out, "  {:<40} {}  {:>4}", truncate(path, 40), bar(score, use_color), percent(score));
    }

    out.push('\n');
    if analysis.suggested_reviewers.is_empty() {
        let _ = writeln!(out, "{}", paint(use_color, GRAY, "No reviewers know these files."));
        return out;
    }
    let _ = writeln!(out, "{}", paint(use_color, BOLD, "Suggested reviewers:"));
    for (i, r) in analysis.suggested_reviewers.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {:<20} {:>4} avg, knows {}",
            i + 1,
            truncate(r.user.display_name(), 20),
            percent(r.avg_familiarity),
            r.relevant_files.join(", ")
        );
    }
    out
}

pub fn reviewers_markdown(analysis: &ChangeSetAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Change set familiarity\n");
    let _ = writeln!(
        out,
        "**Author:** {} | **Files:** {} | **Risk:** {}\n",
        analysis.author,
        analysis.changed_files.len(),
        analysis.risk_level
    );
    let _ = writeln!(out, "| File | Author familiarity |");
    let _ = writeln!(out, "|------|--------------------|");
    for path in &analysis.changed_files {
        let score = analysis.familiarity.get(path).copied().unwrap_or(0.0);
        let _ = writeln!(out, "| `{path}` | {} |", percent(score));
    }
    if !analysis.suggested_reviewers.is_empty() {
        let _ = writeln!(out, "\n## Suggested reviewers\n");
        for r in &analysis.suggested_reviewers {
            let _ = writeln!(
                out,
                "- **{}** ({} avg): {}",
                r.user.display_name(),
                percent(r.avg_familiarity),
                r.relevant_files.join(", ")
            );
        }
    }
    out
}

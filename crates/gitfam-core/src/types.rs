use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FamError;

/// A git author identity.
///
/// Matching is a case-insensitive substring test, by email first and name
/// second, so a bare `ann` matches `Ann Smith`.
///
/// # Examples
///
/// ```
/// use gitfam_core::UserIdentity;
///
/// let user = UserIdentity::new("Alice", "alice@example.com");
/// assert!(user.matches("ALICE", "other@example.com"));
/// assert!(user.matches("someone", "Alice@Example.com"));
/// assert!(!user.matches("bob", "bob@example.com"));
///
/// let flag = UserIdentity::from_flag("ann");
/// assert!(flag.matches("Ann Smith", "asmith@example.com"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Author name.
    pub name: String,
    /// Author email.
    pub email: String,
}

impl UserIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Identity from a single `--user` value, used as both name and email.
    pub fn from_flag(value: &str) -> Self {
        Self::new(value, value)
    }

    /// Name if set, otherwise email.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    /// Whether an author (name, email) pair refers to this identity.
    pub fn matches(&self, author_name: &str, author_email: &str) -> bool {
        fn contains(haystack: &str, needle: &str) -> bool {
            !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
        }
        contains(author_email, &self.email) || contains(author_name, &self.name)
    }
}

/// One qualifying commit by a user to a file.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use gitfam_core::CommitInfo;
///
/// let commit = CommitInfo {
///     hash: "abc123".into(),
///     date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
///     added_lines: 30,
///     deleted_lines: 0,
///     file_size_at_commit: 200,
/// };
/// assert_eq!(commit.added_lines, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// Commit hash.
    pub hash: String,
    /// Author date.
    pub date: DateTime<Utc>,
    /// Lines added to the file in this commit.
    pub added_lines: u64,
    /// Lines deleted from the file in this commit.
    pub deleted_lines: u64,
    /// Line count of the file as of this commit.
    pub file_size_at_commit: u64,
}

/// How per-file familiarity is derived.
///
/// # Examples
///
/// ```
/// use gitfam_core::ScoringMode;
///
/// let mode: ScoringMode = "code-coverage".parse().unwrap();
/// assert_eq!(mode, ScoringMode::CodeCoverage);
/// assert!("binary".parse::<ScoringMode>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    /// 1 if the user ever committed to the file, else 0.
    #[default]
    Committed,
    /// Fraction of current lines attributed to the user by blame.
    CodeCoverage,
    /// Weighted blend of blame and decayed commit activity.
    Weighted,
}

impl ScoringMode {
    pub const ALL: [ScoringMode; 3] = [
        ScoringMode::Committed,
        ScoringMode::CodeCoverage,
        ScoringMode::Weighted,
    ];
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMode::Committed => write!(f, "committed"),
            ScoringMode::CodeCoverage => write!(f, "code-coverage"),
            ScoringMode::Weighted => write!(f, "weighted"),
        }
    }
}

impl FromStr for ScoringMode {
    type Err = FamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "committed" => Ok(ScoringMode::Committed),
            "code-coverage" => Ok(ScoringMode::CodeCoverage),
            "weighted" => Ok(ScoringMode::Weighted),
            other => Err(FamError::Config(format!(
                "invalid mode: \"{other}\". Valid modes: committed, code-coverage, weighted"
            ))),
        }
    }
}

/// Signal weights for the weighted scoring mode.
///
/// The three weights must sum to 1.0 within ±0.01. The weighted strategy
/// combines `blame` and `commit`; `review` is validated as part of the sum
/// but carries no signal of its own.
///
/// # Examples
///
/// ```
/// use gitfam_core::WeightConfig;
///
/// let w: WeightConfig = "0.5,0.35,0.15".parse().unwrap();
/// assert_eq!(w.commit, 0.35);
/// assert!("0.5,0.5,0.5".parse::<WeightConfig>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightConfig {
    pub blame: f64,
    pub commit: f64,
    pub review: f64,
}

impl WeightConfig {
    /// Allowed deviation of the weight sum from 1.0.
    pub const SUM_TOLERANCE: f64 = 0.01;

    /// Check that the weights are finite, non-negative, and sum to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`FamError::Config`] when the invariant does not hold.
    pub fn validate(&self) -> Result<(), FamError> {
        let parts = [self.blame, self.commit, self.review];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FamError::Config(format!(
                "weights must be non-negative numbers, got {},{},{}",
                self.blame, self.commit, self.review
            )));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(FamError::Config(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            blame: 0.5,
            commit: 0.35,
            review: 0.15,
        }
    }
}

impl fmt::Display for WeightConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.blame, self.commit, self.review)
    }
}

impl FromStr for WeightConfig {
    type Err = FamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid_weights(s))?;
        let &[blame, commit, review] = parts.as_slice() else {
            return Err(invalid_weights(s));
        };
        let weights = Self {
            blame,
            commit,
            review,
        };
        weights.validate()?;
        Ok(weights)
    }
}

fn invalid_weights(s: &str) -> FamError {
    FamError::Config(format!(
        "invalid weights: \"{s}\". Expected format: \"0.5,0.35,0.15\""
    ))
}

/// When previously earned familiarity stops counting.
///
/// # Examples
///
/// ```
/// use gitfam_core::ExpirationConfig;
///
/// let cfg: ExpirationConfig = "combined:365d:50%".parse().unwrap();
/// assert_eq!(
///     cfg,
///     ExpirationConfig::Combined { duration_days: 365, threshold: 0.5 }
/// );
/// assert_eq!(cfg.to_string(), "combined:365d:50%");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum ExpirationConfig {
    /// Familiarity never expires.
    #[default]
    Never,
    /// Expires when the user's last commit is older than `duration_days`.
    Time { duration_days: u32 },
    /// Expires when more than `threshold` of the file changed since the user's last commit.
    Change { threshold: f64 },
    /// Expires when either rule fires.
    Combined { duration_days: u32, threshold: f64 },
}

impl ExpirationConfig {
    /// Age limit in days, if the policy has one. A zero limit disables the rule.
    pub fn duration_days(&self) -> Option<u32> {
        match self {
            ExpirationConfig::Time { duration_days }
            | ExpirationConfig::Combined { duration_days, .. } => {
                Some(*duration_days).filter(|d| *d > 0)
            }
            _ => None,
        }
    }

    /// Change-ratio limit, if the policy has one. A zero limit disables the rule.
    pub fn threshold(&self) -> Option<f64> {
        match self {
            ExpirationConfig::Change { threshold }
            | ExpirationConfig::Combined { threshold, .. } => {
                Some(*threshold).filter(|t| *t > 0.0)
            }
            _ => None,
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, ExpirationConfig::Never)
    }
}

impl fmt::Display for ExpirationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationConfig::Never => write!(f, "never"),
            ExpirationConfig::Time { duration_days } => write!(f, "time:{duration_days}d"),
            ExpirationConfig::Change { threshold } => {
                write!(f, "change:{}%", (threshold * 100.0).round())
            }
            ExpirationConfig::Combined {
                duration_days,
                threshold,
            } => write!(
                f,
                "combined:{duration_days}d:{}%",
                (threshold * 100.0).round()
            ),
        }
    }
}

impl FromStr for ExpirationConfig {
    type Err = FamError;

    /// Accepts `never`, `time:180d`, `change:50%`, and `combined:365d[:50%]`.
    /// Empty input and unknown policies mean `never`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("time:") {
            return Ok(ExpirationConfig::Time {
                duration_days: parse_days(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix("change:") {
            return Ok(ExpirationConfig::Change {
                threshold: parse_percentage(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix("combined:") {
            let mut parts = rest.splitn(2, ':');
            let duration_days = parse_days(parts.next().unwrap_or(""))?;
            let threshold = match parts.next() {
                Some(p) if !p.is_empty() => parse_percentage(p)?,
                _ => 0.5,
            };
            return Ok(ExpirationConfig::Combined {
                duration_days,
                threshold,
            });
        }
        Ok(ExpirationConfig::Never)
    }
}

fn parse_days(s: &str) -> Result<u32, FamError> {
    s.strip_suffix('d')
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| {
            FamError::Config(format!(
                "invalid duration format: \"{s}\". Expected format like \"180d\"."
            ))
        })
}

fn parse_percentage(s: &str) -> Result<f64, FamError> {
    s.strip_suffix('%')
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| f64::from(n) / 100.0)
        .ok_or_else(|| {
            FamError::Config(format!(
                "invalid percentage format: \"{s}\". Expected format like \"50%\"."
            ))
        })
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use gitfam_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

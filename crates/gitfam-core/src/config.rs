use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FamError;
use crate::types::{ExpirationConfig, ScoringMode, WeightConfig};

/// Top-level configuration loaded from `.gitfam.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use gitfam_core::FamConfig;
///
/// let config = FamConfig::default();
/// assert_eq!(config.hotspot.window_days, 90);
/// assert_eq!(config.batch.size, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FamConfig {
    /// Scoring mode, weights, and expiration policy.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Hotspot analysis settings.
    #[serde(default)]
    pub hotspot: HotspotConfig,
    /// Concurrency limits for per-file and per-user lookups.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Reviewer suggestion settings.
    #[serde(default)]
    pub reviewers: ReviewerConfig,
}

impl FamConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FamError::Io`] if the file cannot be read, [`FamError::Toml`]
    /// if the content is not valid TOML, or [`FamError::Config`] if a value is
    /// malformed.
    pub fn from_file(path: &Path) -> Result<Self, FamError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`FamError::Toml`] if parsing fails or [`FamError::Config`] if
    /// validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitfam_core::{FamConfig, ScoringMode};
    ///
    /// let toml = r#"
    /// [scoring]
    /// mode = "weighted"
    /// weights = "0.6,0.3,0.1"
    /// "#;
    /// let config = FamConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.scoring.mode().unwrap(), ScoringMode::Weighted);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, FamError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every string-encoded and numeric setting.
    ///
    /// # Errors
    ///
    /// Returns the first [`FamError::Config`] encountered.
    pub fn validate(&self) -> Result<(), FamError> {
        self.scoring.mode()?;
        self.scoring.weights()?;
        self.scoring.expiration()?;
        if self.hotspot.window_days == 0 {
            return Err(FamError::Config("hotspot.window_days must be > 0".into()));
        }
        if self.hotspot.team_proxy_factor.is_nan() || self.hotspot.team_proxy_factor <= 0.0 {
            return Err(FamError::Config(
                "hotspot.team_proxy_factor must be > 0".into(),
            ));
        }
        if self.batch.size == 0 || self.batch.user_size == 0 {
            return Err(FamError::Config("batch sizes must be > 0".into()));
        }
        if self.reviewers.threshold > 100 {
            return Err(FamError::Config(
                "reviewers.threshold is a percentage (0-100)".into(),
            ));
        }
        Ok(())
    }
}

/// Scoring settings, stored in their string form.
///
/// # Examples
///
/// ```
/// use gitfam_core::{ExpirationConfig, ScoringConfig};
///
/// let config = ScoringConfig::default();
/// assert_eq!(config.mode, "committed");
/// assert_eq!(config.expiration().unwrap(), ExpirationConfig::Never);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// `committed`, `code-coverage`, or `weighted` (default: committed).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Comma-separated blame,commit,review weights (default: 0.5,0.35,0.15).
    #[serde(default = "default_weights")]
    pub weights: String,
    /// Expiration policy string (default: never).
    #[serde(default = "default_expiration")]
    pub expiration: String,
}

impl ScoringConfig {
    /// # Errors
    ///
    /// Returns [`FamError::Config`] for an unknown mode.
    pub fn mode(&self) -> Result<ScoringMode, FamError> {
        self.mode.parse()
    }

    /// # Errors
    ///
    /// Returns [`FamError::Config`] for malformed weights.
    pub fn weights(&self) -> Result<WeightConfig, FamError> {
        self.weights.parse()
    }

    /// # Errors
    ///
    /// Returns [`FamError::Config`] for a malformed policy.
    pub fn expiration(&self) -> Result<ExpirationConfig, FamError> {
        self.expiration.parse()
    }
}

fn default_mode() -> String {
    "committed".into()
}

fn default_weights() -> String {
    WeightConfig::default().to_string()
}

fn default_expiration() -> String {
    "never".into()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            weights: default_weights(),
            expiration: default_expiration(),
        }
    }
}

/// Hotspot analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotConfig {
    /// Trailing window for change frequency, in days (default: 90).
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Share of the team a file must be known by to count as fully familiar
    /// in team mode (default: 0.3).
    #[serde(default = "default_team_proxy_factor")]
    pub team_proxy_factor: f64,
}

fn default_window_days() -> u32 {
    90
}

fn default_team_proxy_factor() -> f64 {
    0.3
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            team_proxy_factor: default_team_proxy_factor(),
        }
    }
}

/// Batch sizes for concurrent git lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Files looked up at once (default: 10).
    #[serde(default = "default_batch_size")]
    pub size: usize,
    /// Users or reviewer candidates scored at once (default: 3).
    #[serde(default = "default_user_batch_size")]
    pub user_size: usize,
}

fn default_batch_size() -> usize {
    10
}

fn default_user_batch_size() -> usize {
    3
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            user_size: default_user_batch_size(),
        }
    }
}

/// Reviewer suggestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerConfig {
    /// Number of reviewers to suggest (default: 3).
    #[serde(default = "default_reviewer_count")]
    pub count: usize,
    /// Familiarity percentage below which a changed file is unfamiliar (default: 50).
    #[serde(default = "default_reviewer_threshold")]
    pub threshold: u32,
    /// Most active contributors considered as candidates (default: 20).
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Minimum commits for a contributor to be a candidate (default: 3).
    #[serde(default = "default_min_commits")]
    pub min_commits: usize,
}

fn default_reviewer_count() -> usize {
    3
}

fn default_reviewer_threshold() -> u32 {
    50
}

fn default_max_candidates() -> usize {
    20
}

fn default_min_commits() -> usize {
    3
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            count: default_reviewer_count(),
            threshold: default_reviewer_threshold(),
            max_candidates: default_max_candidates(),
            min_commits: default_min_commits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = FamConfig::default();
        assert_eq!(config.scoring.mode().unwrap(), ScoringMode::Committed);
        assert_eq!(config.scoring.weights().unwrap(), WeightConfig::default());
        assert_eq!(config.scoring.expiration().unwrap(), ExpirationConfig::Never);
        assert_eq!(config.hotspot.window_days, 90);
        assert_eq!(config.hotspot.team_proxy_factor, 0.3);
        assert_eq!(config.batch.size, 10);
        assert_eq!(config.batch.user_size, 3);
        assert_eq!(config.reviewers.count, 3);
        assert_eq!(config.reviewers.threshold, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = FamConfig::from_toml("").unwrap();
        assert_eq!(config.scoring.mode, "committed");
        assert_eq!(config.batch.size, 10);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[scoring]
mode = "code-coverage"
expiration = "combined:365d:40%"

[hotspot]
window_days = 30
team_proxy_factor = 0.5

[batch]
size = 4

[reviewers]
count = 2
threshold = 70
"#;
        let config = FamConfig::from_toml(toml).unwrap();
        assert_eq!(config.scoring.mode().unwrap(), ScoringMode::CodeCoverage);
        assert_eq!(
            config.scoring.expiration().unwrap(),
            ExpirationConfig::Combined {
                duration_days: 365,
                threshold: 0.4
            }
        );
        assert_eq!(config.hotspot.window_days, 30);
        assert_eq!(config.batch.size, 4);
        assert_eq!(config.batch.user_size, 3);
        assert_eq!(config.reviewers.threshold, 70);
    }

    #[test]
    fn bad_weights_fail_at_parse_time() {
        let toml = r#"
[scoring]
weights = "0.9,0.9,0.9"
"#;
        let err = FamConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, FamError::Config(_)));
    }

    #[test]
    fn bad_mode_fails_at_parse_time() {
        let err = FamConfig::from_toml("[scoring]\nmode = \"fuzzy\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid mode"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(FamConfig::from_toml("[batch]\nsize = 0\n").is_err());
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(FamConfig::from_toml("{{invalid}}").is_err());
    }
}

/// Errors that can occur across gitfam.
///
/// Only [`FamError::Config`] and [`FamError::Toml`] are fatal to a run. Signal,
/// review and batch failures are caught by the engine and degrade to a zero or
/// absent contribution.
///
/// # Examples
///
/// ```
/// use gitfam_core::FamError;
///
/// let err = FamError::Config("weights must sum to 1.0".into());
/// assert!(err.to_string().contains("weights must sum to 1.0"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum FamError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid mode, weight string, expiration string, or config value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// A per-file blame, commit, or review lookup failed.
    #[error("signal unavailable for {path}: {reason}")]
    Signal {
        /// File the lookup was made for.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Review data could not be obtained (no token, no remote match, no results).
    /// Scoring continues without the review signal.
    #[error("review data unavailable: {0}")]
    ReviewUnavailable(String),

    /// A batched task failed or panicked.
    #[error("batch item failed: {0}")]
    Batch(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FamError {
    /// Build a [`FamError::Signal`] for `path`.
    pub fn signal(path: impl Into<String>, reason: impl ToString) -> Self {
        FamError::Signal {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

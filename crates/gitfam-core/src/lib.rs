//! Core types, configuration, and error handling for gitfam.
//!
//! This crate provides the shared foundation used by all other gitfam crates:
//! - [`FamError`]: unified error type using `thiserror`
//! - [`FamConfig`]: configuration loaded from `.gitfam.toml`
//! - Shared types: [`UserIdentity`], [`CommitInfo`], [`ScoringMode`],
//!   [`WeightConfig`], [`ExpirationConfig`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{BatchConfig, FamConfig, HotspotConfig, ReviewerConfig, ScoringConfig};
pub use error::FamError;
pub use types::{
    CommitInfo, ExpirationConfig, OutputFormat, ScoringMode, UserIdentity, WeightConfig,
};

/// A convenience `Result` type for gitfam operations.
pub type Result<T> = std::result::Result<T, FamError>;

//! Familiarity scoring, aggregation, and risk analysis.
//!
//! Turns per-file git signals (blame tallies, commit lists, contributor sets,
//! change frequency) into a folder tree of familiarity scores, then derives
//! hotspots, bus factor coverage, multi-user comparisons, and reviewer
//! suggestions from it. All git access goes through [`signals::SignalSource`].

pub mod batch;
pub mod coverage;
pub mod expiration;
pub mod hotspots;
pub mod math;
pub mod multi_user;
pub mod reviewers;
pub mod risk;
pub mod signals;
pub mod strategy;
pub mod tree;

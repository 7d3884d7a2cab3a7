//! Git-backed collaborators for the familiarity engine.
//!
//! Lists tracked files, mines whole-history contributor and change-frequency
//! data, and implements [`gitfam_scoring::signals::SignalSource`] on top of
//! git2 so the scoring crate never touches a repository directly.

pub mod files;
pub mod filter;
pub mod history;
pub mod identity;
pub mod signals;

#[cfg(test)]
mod fixture;

pub use files::{changed_files, open_repository, repo_root, tracked_files};
pub use filter::PathFilter;
pub use history::{contributors, scan_history, Contributor, HistoryScan};
pub use identity::resolve_user;
pub use signals::GitSignals;

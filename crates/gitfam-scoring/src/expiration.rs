//! Decide when earned familiarity should no longer count.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gitfam_core::{ExpirationConfig, FamError, UserIdentity};
use tracing::{debug, warn};

use crate::batch::run_blocking_batches;
use crate::math::days_between;
use crate::signals::{LastTouch, SignalSource};

/// Pure staleness rule over already-fetched signals.
///
/// `last_touch` is the user's most recent commit to the file and
/// `change_ratio` the share of the file changed since then. A file the user
/// never touched is never stale.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use gitfam_core::ExpirationConfig;
/// use gitfam_scoring::expiration::is_stale;
/// use gitfam_scoring::signals::LastTouch;
///
/// let now = Utc::now();
/// let touch = LastTouch { hash: "abc".into(), date: now - Duration::days(200) };
/// let policy = ExpirationConfig::Time { duration_days: 180 };
/// assert!(is_stale(&policy, Some(&touch), None, now));
/// assert!(!is_stale(&ExpirationConfig::Never, Some(&touch), Some(1.0), now));
/// ```
pub fn is_stale(
    config: &ExpirationConfig,
    last_touch: Option<&LastTouch>,
    change_ratio: Option<f64>,
    now: DateTime<Utc>,
) -> bool {
    let Some(touch) = last_touch else {
        return false;
    };
    let too_old = config
        .duration_days()
        .is_some_and(|limit| days_between(touch.date, now) > f64::from(limit));
    let too_changed = match (config.threshold(), change_ratio) {
        (Some(limit), Some(ratio)) => ratio > limit,
        _ => false,
    };
    too_old || too_changed
}

/// Evaluate the policy for one file, fetching only the signals it needs.
///
/// Lookup failures count as fresh.
pub fn is_expired(
    source: &dyn SignalSource,
    path: &str,
    user: &UserIdentity,
    config: &ExpirationConfig,
    now: DateTime<Utc>,
) -> bool {
    if config.is_never() {
        return false;
    }
    let touch = match source.last_touch(path, user) {
        Ok(touch) => touch,
        Err(e) => {
            debug!(path, error = %e, "last touch unavailable, treating as fresh");
            return false;
        }
    };
    let Some(touch) = touch else {
        return false;
    };
    let change_ratio = match config.threshold() {
        Some(_) => match source.change_ratio_since(path, &touch.hash) {
            Ok(ratio) => Some(ratio),
            Err(e) => {
                debug!(path, error = %e, "change ratio unavailable");
                None
            }
        },
        None => None,
    };
    is_stale(config, Some(&touch), change_ratio, now)
}

/// Collect every stale path among `files`, checking `batch_size` at a time.
pub async fn expired_files(
    source: Arc<dyn SignalSource>,
    files: Vec<String>,
    user: &UserIdentity,
    config: ExpirationConfig,
    batch_size: usize,
    now: DateTime<Utc>,
) -> HashSet<String> {
    if config.is_never() {
        return HashSet::new();
    }
    let user = user.clone();
    let results = run_blocking_batches(files, batch_size, move |path: String| {
        let stale = is_expired(source.as_ref(), &path, &user, &config, now);
        Ok::<_, FamError>((path, stale))
    })
    .await;

    let mut expired = HashSet::new();
    for result in results {
        match result {
            Ok((path, true)) => {
                expired.insert(path);
            }
            Ok((_, false)) => {}
            Err(e) => warn!(error = %e, "expiration check failed"),
        }
    }
    debug!(count = expired.len(), policy = %config, "expired files");
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::StaticSignals;
    use chrono::{Duration, TimeZone};
    use gitfam_core::CommitInfo;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn touch(days_ago: i64) -> LastTouch {
        LastTouch {
            hash: "h".into(),
            date: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn never_is_always_fresh() {
        assert!(!is_stale(&ExpirationConfig::Never, Some(&touch(10_000)), Some(1.0), now()));
    }

    #[test]
    fn time_policy_uses_strict_exceed() {
        let policy = ExpirationConfig::Time { duration_days: 180 };
        assert!(!is_stale(&policy, Some(&touch(180)), None, now()));
        assert!(is_stale(&policy, Some(&touch(181)), None, now()));
        assert!(!is_stale(&policy, None, None, now()));
    }

    #[test]
    fn change_policy_compares_ratio() {
        let policy = ExpirationConfig::Change { threshold: 0.5 };
        assert!(!is_stale(&policy, Some(&touch(1)), Some(0.5), now()));
        assert!(is_stale(&policy, Some(&touch(1)), Some(0.51), now()));
        assert!(!is_stale(&policy, Some(&touch(1)), None, now()));
    }

    #[test]
    fn combined_policy_fires_on_either_rule() {
        let policy = ExpirationConfig::Combined {
            duration_days: 30,
            threshold: 0.5,
        };
        assert!(is_stale(&policy, Some(&touch(40)), Some(0.0), now()));
        assert!(is_stale(&policy, Some(&touch(1)), Some(0.9), now()));
        assert!(!is_stale(&policy, Some(&touch(1)), Some(0.1), now()));
    }

    #[test]
    fn zero_limits_disable_their_rule() {
        let change = ExpirationConfig::Change { threshold: 0.0 };
        assert!(!is_stale(&change, Some(&touch(1)), Some(0.01), now()));
        let time = ExpirationConfig::Time { duration_days: 0 };
        assert!(!is_stale(&time, Some(&touch(400)), None, now()));
        let combined = ExpirationConfig::Combined {
            duration_days: 0,
            threshold: 0.5,
        };
        assert!(!is_stale(&combined, Some(&touch(400)), Some(0.1), now()));
        assert!(is_stale(&combined, Some(&touch(1)), Some(0.9), now()));
    }

    fn commit_days_ago(days: i64) -> CommitInfo {
        CommitInfo {
            hash: format!("c{days}"),
            date: now() - Duration::days(days),
            added_lines: 10,
            deleted_lines: 0,
            file_size_at_commit: 10,
        }
    }

    #[tokio::test]
    async fn expired_files_collects_stale_paths() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default()
            .with_commits(&alice, "old.rs", vec![commit_days_ago(400)])
            .with_commits(&alice, "fresh.rs", vec![commit_days_ago(5)])
            .with_commits(&alice, "churned.rs", vec![commit_days_ago(5)])
            .with_change_ratio("churned.rs", 0.8)
            .fail_path("broken.rs");
        let files = ["old.rs", "fresh.rs", "churned.rs", "untouched.rs", "broken.rs"]
            .map(String::from)
            .to_vec();
        let policy = ExpirationConfig::Combined {
            duration_days: 365,
            threshold: 0.5,
        };

        let expired = expired_files(Arc::new(signals), files, &alice, policy, 2, now()).await;

        let mut got: Vec<_> = expired.into_iter().collect();
        got.sort();
        assert_eq!(got, vec!["churned.rs", "old.rs"]);
    }

    #[tokio::test]
    async fn never_policy_skips_lookups() {
        let alice = UserIdentity::from_flag("alice");
        let signals = StaticSignals::default().fail_path("a.rs");
        let expired = expired_files(
            Arc::new(signals),
            vec!["a.rs".into()],
            &alice,
            ExpirationConfig::Never,
            10,
            now(),
        )
        .await;
        assert!(expired.is_empty());
    }
}

//! Saturation, decay, and normalization helpers for the weighted mode.

use chrono::{DateTime, Utc};

/// Default saturation constant: a commit touching 30% of a file scores 0.5.
pub const DEFAULT_SIGMOID_K: f64 = 0.3;

/// Default half-life of familiarity, in days.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 180.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Saturating transform `x / (x + k)`, 0 for non-positive input.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::math::sigmoid;
///
/// assert_eq!(sigmoid(0.0, 0.3), 0.0);
/// assert_eq!(sigmoid(0.3, 0.3), 0.5);
/// ```
pub fn sigmoid(x: f64, k: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    x / (x + k)
}

/// Exponential decay with the given half-life; 1 for `days <= 0`.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::math::recency_decay;
///
/// assert_eq!(recency_decay(0.0, 180.0), 1.0);
/// assert_eq!(recency_decay(180.0, 180.0), 0.5);
/// ```
pub fn recency_decay(days: f64, half_life: f64) -> f64 {
    if days <= 0.0 {
        return 1.0;
    }
    // 2^(-t/h) == e^(-ln2/h * t), and is exact at t == h
    0.5_f64.powf(days / half_life)
}

/// Size of a change relative to the file: `(added + 0.5 * deleted) / size`.
///
/// Returns 0 when the file size is 0.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::math::normalized_diff;
///
/// assert!((normalized_diff(30, 0, 200) - 0.15).abs() < 1e-12);
/// assert_eq!(normalized_diff(10, 10, 0), 0.0);
/// ```
pub fn normalized_diff(added: u64, deleted: u64, file_size: u64) -> f64 {
    if file_size == 0 {
        return 0.0;
    }
    (added as f64 + 0.5 * deleted as f64) / file_size as f64
}

/// Absolute distance between two instants in fractional days.
pub fn days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let millis = (b - a).num_milliseconds().unsigned_abs();
    millis as f64 / 1000.0 / SECONDS_PER_DAY
}

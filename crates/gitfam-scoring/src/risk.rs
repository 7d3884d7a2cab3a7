//! Threshold classifiers turning risk numbers into discrete levels.
//!
//! Hotspot risk and coverage risk use different vocabularies. Coverage risk
//! has two distinct rules sharing one vocabulary: files are classified by raw
//! contributor count, folders by their bus factor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hotspot risk band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotRiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for HotspotRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotspotRiskLevel::Critical => write!(f, "critical"),
            HotspotRiskLevel::High => write!(f, "high"),
            HotspotRiskLevel::Medium => write!(f, "medium"),
            HotspotRiskLevel::Low => write!(f, "low"),
        }
    }
}

/// Knowledge coverage band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageRiskLevel {
    Risk,
    Moderate,
    Safe,
}

impl fmt::Display for CoverageRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageRiskLevel::Risk => write!(f, "risk"),
            CoverageRiskLevel::Moderate => write!(f, "moderate"),
            CoverageRiskLevel::Safe => write!(f, "safe"),
        }
    }
}

/// Classify a hotspot risk value. Lower bounds are inclusive.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::risk::{classify_hotspot_risk, HotspotRiskLevel};
///
/// assert_eq!(classify_hotspot_risk(0.72), HotspotRiskLevel::Critical);
/// assert_eq!(classify_hotspot_risk(0.1), HotspotRiskLevel::Low);
/// ```
pub fn classify_hotspot_risk(risk: f64) -> HotspotRiskLevel {
    if risk >= 0.6 {
        HotspotRiskLevel::Critical
    } else if risk >= 0.4 {
        HotspotRiskLevel::High
    } else if risk >= 0.2 {
        HotspotRiskLevel::Medium
    } else {
        HotspotRiskLevel::Low
    }
}

/// Classify a file by how many people have committed to it.
///
/// # Examples
///
/// ```
/// use gitfam_scoring::risk::{classify_coverage_risk, CoverageRiskLevel};
///
/// assert_eq!(classify_coverage_risk(1), CoverageRiskLevel::Risk);
/// assert_eq!(classify_coverage_risk(4), CoverageRiskLevel::Safe);
/// ```
pub fn classify_coverage_risk(contributor_count: usize) -> CoverageRiskLevel {
    match contributor_count {
        0..=1 => CoverageRiskLevel::Risk,
        2..=3 => CoverageRiskLevel::Moderate,
        _ => CoverageRiskLevel::Safe,
    }
}

/// Classify a folder by its bus factor.
pub fn classify_bus_factor_risk(bus_factor: usize) -> CoverageRiskLevel {
    match bus_factor {
        0..=1 => CoverageRiskLevel::Risk,
        2 => CoverageRiskLevel::Moderate,
        _ => CoverageRiskLevel::Safe,
    }
}

/// Classify a change set by the share of its files the author is unfamiliar with.
pub fn classify_change_set_risk(unfamiliar_ratio: f64) -> CoverageRiskLevel {
    if unfamiliar_ratio >= 0.5 {
        CoverageRiskLevel::Risk
    } else if unfamiliar_ratio >= 0.2 {
        CoverageRiskLevel::Moderate
    } else {
        CoverageRiskLevel::Safe
    }
}

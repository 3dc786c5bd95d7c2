//! ---
//! ems_section: "02-fleet-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Fleet asset and alert condition data model."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a detected alert condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// State of charge outside its operating band.
    Soc,
    /// State of health below the degradation threshold.
    Soh,
    /// Round-trip efficiency below threshold.
    Efficiency,
    /// Cycle count above the wear threshold.
    Cycles,
    /// Container stopped reporting.
    Offline,
}

impl AlertKind {
    /// Short wire/label form of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Soc => "soc",
            AlertKind::Soh => "soh",
            AlertKind::Efficiency => "efficiency",
            AlertKind::Cycles => "cycles",
            AlertKind::Offline => "offline",
        }
    }
}

/// Severity ladder for alert conditions. Ordering follows escalation, so
/// `Severity::Low < Severity::Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; no operator action expected.
    Low,
    /// Worth watching; schedule a check.
    Medium,
    /// Operator action required.
    High,
    /// Immediate intervention required.
    Critical,
}

impl Severity {
    /// Wire/label form of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Stable composite identity of an alert condition.
///
/// Replaces string-concatenated identities with an explicit tuple of asset,
/// kind, and the value-independent rule discriminant, so identity survives
/// tick-to-tick changes in severity, message, and measured value. Two
/// distinct rules for the same kind on the same asset therefore cannot
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    /// Owning container id.
    pub asset_id: String,
    /// Condition classification.
    pub kind: AlertKind,
    /// Slug of the threshold rule that raised the condition.
    pub rule: String,
}

impl AlertKey {
    /// Construct a key for the given asset, kind, and rule slug.
    pub fn new(asset_id: impl Into<String>, kind: AlertKind, rule: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            kind,
            rule: rule.into(),
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.asset_id, self.kind.as_str(), self.rule)
    }
}

/// A threshold condition detected on a single tick.
///
/// Conditions are recomputed fresh every tick and never persisted with the
/// asset; they gain durable identity only once the reconciler keys them by
/// [`AlertKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    /// Condition classification.
    pub kind: AlertKind,
    /// Slug of the rule that raised the condition; value-independent.
    pub rule: String,
    /// Severity at the time of detection.
    pub severity: Severity,
    /// Operator-facing message, including the live measured value.
    pub message: String,
    /// The measured value that tripped the rule.
    pub value: f64,
    /// Detection timestamp.
    pub raised_at: DateTime<Utc>,
}

impl AlertCondition {
    /// Derive the stable identity of this condition on the given asset.
    pub fn key(&self, asset_id: &str) -> AlertKey {
        AlertKey::new(asset_id, self.kind, self.rule.clone())
    }
}

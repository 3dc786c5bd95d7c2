//! ---
//! ems_section: "05-alerting-reconciliation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Alert lifecycle reconciliation and durable state."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use f_ems_model::{AlertKey, AlertKind, Severity};

/// Lifecycle status of an alert. Normal progression is one-way:
/// `Active → Acknowledged → Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Condition is firing and no operator has claimed it.
    Active,
    /// An operator has claimed the alert.
    Acknowledged,
    /// An operator has closed the episode.
    Resolved,
}

impl AlertStatus {
    /// Wire/label form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

/// Operator-applied alert state that survives ticks and restarts.
///
/// One record per [`AlertKey`]; volatile detection data (severity, message,
/// value) is deliberately absent since it is rederived every tick and
/// overlaid at merge time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableAlertState {
    /// Stable identity this record applies to.
    pub key: AlertKey,
    /// Lifecycle status applied by the operator.
    pub status: AlertStatus,
    /// Operator who acknowledged, if any.
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    /// Acknowledgement timestamp, if any.
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Operator who resolved, if any.
    #[serde(default)]
    pub resolved_by: Option<String>,
    /// Resolution timestamp, if any. Drives retention pruning.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Free-form operator annotation.
    #[serde(default)]
    pub notes: Option<String>,
    /// When the underlying condition was first observed absent after
    /// resolution. A re-trigger after this point starts a new episode.
    #[serde(default)]
    pub condition_cleared_at: Option<DateTime<Utc>>,
}

impl DurableAlertState {
    /// Fresh record in the `Active` state for the given key.
    pub fn new(key: AlertKey) -> Self {
        Self {
            key,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            notes: None,
            condition_cleared_at: None,
        }
    }
}

/// A rendered, user-facing alert: volatile detection data from the latest
/// tick overlaid with the durable operator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetAlert {
    /// Rendering-time identity; stable across regenerations of the same
    /// condition, minted fresh for each new logical occurrence.
    pub id: Uuid,
    /// Stable condition identity.
    pub key: AlertKey,
    /// Display name of the owning container.
    pub asset_name: String,
    /// Condition classification, mirrored from the key for rendering.
    pub kind: AlertKind,
    /// Severity at the latest detection.
    pub severity: Severity,
    /// Message from the latest detection, including the live value.
    pub message: String,
    /// The measured value from the latest detection.
    pub value: f64,
    /// Timestamp of the latest detection (or last sighting for carried
    /// records whose condition has cleared).
    pub timestamp: DateTime<Utc>,
    /// Lifecycle status after overlay.
    pub status: AlertStatus,
    /// Operator who acknowledged, if any.
    pub acknowledged_by: Option<String>,
    /// Acknowledgement timestamp, if any.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Operator who resolved, if any.
    pub resolved_by: Option<String>,
    /// Resolution timestamp, if any.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Free-form operator annotation.
    pub notes: Option<String>,
}

impl FleetAlert {
    /// Copy the durable overlay fields onto this rendered alert.
    pub fn apply_overlay(&mut self, state: &DurableAlertState) {
        self.status = state.status;
        self.acknowledged_by = state.acknowledged_by.clone();
        self.acknowledged_at = state.acknowledged_at;
        self.resolved_by = state.resolved_by.clone();
        self.resolved_at = state.resolved_at;
        self.notes = state.notes.clone();
    }
}

//! ---
//! ems_section: "05-alerting-reconciliation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Merge of volatile alert detections with durable operator state."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use f_ems_common::time::to_chrono_duration;
use f_ems_model::{AlertKey, ContainerAsset, Severity};

use crate::state::{AlertStatus, DurableAlertState, FleetAlert};
use crate::store::StateStore;
use crate::{AlertError, Result};

/// A condition freshly derived from the current fleet snapshot, before any
/// durable overlay. Rebuilt from scratch every tick.
#[derive(Debug, Clone)]
pub struct FreshAlert {
    /// Stable condition identity.
    pub key: AlertKey,
    /// Display name of the owning container.
    pub asset_name: String,
    /// Severity at this detection.
    pub severity: Severity,
    /// Message at this detection.
    pub message: String,
    /// Measured value at this detection.
    pub value: f64,
    /// Detection timestamp.
    pub timestamp: DateTime<Utc>,
}

impl FreshAlert {
    /// Derive the fresh alert list from a fleet snapshot.
    pub fn from_assets(assets: &[ContainerAsset]) -> Vec<FreshAlert> {
        let mut fresh = Vec::new();
        for asset in assets {
            for condition in &asset.conditions {
                fresh.push(FreshAlert {
                    key: condition.key(&asset.id),
                    asset_name: asset.name.clone(),
                    severity: condition.severity,
                    message: condition.message.clone(),
                    value: condition.value,
                    timestamp: condition.raised_at,
                });
            }
        }
        fresh
    }
}

/// Merge freshly detected alerts with durable operator state and the
/// previously rendered list, producing the list to render.
///
/// Pure function, no side effects:
/// * a durable record for a fresh key overlays status/actor/timestamps/notes
///   onto the fresh volatile fields;
/// * without a durable record, a previously rendered alert with the same key
///   keeps its rendering id and status;
/// * otherwise the alert is brand new (`Active`, fresh id);
/// * durable `Acknowledged`/`Resolved` records whose condition has cleared
///   are carried over from the previous rendering until retention prunes
///   their durable record;
/// * output is ordered by timestamp descending.
pub fn merge(
    fresh: &[FreshAlert],
    durable: &IndexMap<AlertKey, DurableAlertState>,
    previous: &[FleetAlert],
) -> Vec<FleetAlert> {
    let previous_by_key: HashMap<&AlertKey, &FleetAlert> =
        previous.iter().map(|alert| (&alert.key, alert)).collect();
    let fresh_keys: HashSet<&AlertKey> = fresh.iter().map(|f| &f.key).collect();

    let mut merged = Vec::with_capacity(fresh.len());
    for detection in fresh {
        let carried_id = previous_by_key.get(&detection.key).map(|p| p.id);
        let mut alert = FleetAlert {
            id: carried_id.unwrap_or_else(Uuid::new_v4),
            key: detection.key.clone(),
            asset_name: detection.asset_name.clone(),
            kind: detection.key.kind,
            severity: detection.severity,
            message: detection.message.clone(),
            value: detection.value,
            timestamp: detection.timestamp,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            notes: None,
        };
        if let Some(state) = durable.get(&detection.key) {
            alert.apply_overlay(state);
        } else if let Some(previous_alert) = previous_by_key.get(&detection.key) {
            alert.status = previous_alert.status;
            alert.acknowledged_by = previous_alert.acknowledged_by.clone();
            alert.acknowledged_at = previous_alert.acknowledged_at;
            alert.resolved_by = previous_alert.resolved_by.clone();
            alert.resolved_at = previous_alert.resolved_at;
            alert.notes = previous_alert.notes.clone();
        }
        merged.push(alert);
    }

    // Operator-touched records whose condition recovered stay visible so the
    // resolution/acknowledgement record is not lost the moment telemetry
    // improves.
    for (key, state) in durable {
        if fresh_keys.contains(key) {
            continue;
        }
        if !matches!(
            state.status,
            AlertStatus::Acknowledged | AlertStatus::Resolved
        ) {
            continue;
        }
        if let Some(previous_alert) = previous_by_key.get(key) {
            let mut carried = (*previous_alert).clone();
            carried.apply_overlay(state);
            merged.push(carried);
        }
    }

    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}

/// Stateful reconciler owning the durable overlay, the last rendered list,
/// and the retention policy.
pub struct AlertReconciler<S: StateStore> {
    store: S,
    durable: IndexMap<AlertKey, DurableAlertState>,
    rendered: Vec<FleetAlert>,
    retention: chrono::Duration,
}

impl<S: StateStore> AlertReconciler<S> {
    /// Load durable state from the store, pruning expired resolved records.
    ///
    /// A failing or corrupt store degrades to an empty collection; this layer
    /// annotates the UI and must never block rendering.
    pub fn load(store: S, retention: Duration) -> Self {
        let states = match store.load() {
            Ok(states) => states,
            Err(err) => {
                warn!(store = store.name(), error = %err, "failed to load alert state; starting empty");
                Vec::new()
            }
        };
        let mut durable = IndexMap::with_capacity(states.len());
        for state in states {
            durable.insert(state.key.clone(), state);
        }
        let mut reconciler = Self {
            store,
            durable,
            rendered: Vec::new(),
            retention: to_chrono_duration(retention),
        };
        if reconciler.prune_expired(Utc::now()) {
            reconciler.persist();
        }
        reconciler
    }

    /// Fold the current fleet snapshot into the rendered alert list.
    ///
    /// Applies the pure [`merge`] plus episode bookkeeping: a resolved record
    /// whose condition cleared and later re-triggered is discarded so the
    /// recurrence renders as a brand-new `Active` alert instead of silently
    /// inheriting the stale resolution.
    pub fn reconcile(&mut self, assets: &[ContainerAsset]) -> &[FleetAlert] {
        let now = Utc::now();
        let fresh = FreshAlert::from_assets(assets);
        let fresh_keys: HashSet<AlertKey> = fresh.iter().map(|f| f.key.clone()).collect();

        // New episode: resolved, condition observed absent, now firing again.
        let mut reopened = Vec::new();
        self.durable.retain(|key, state| {
            let recurrence = state.status == AlertStatus::Resolved
                && state.condition_cleared_at.is_some()
                && fresh_keys.contains(key);
            if recurrence {
                reopened.push(key.clone());
            }
            !recurrence
        });
        if !reopened.is_empty() {
            for key in &reopened {
                info!(alert = %key, "resolved condition re-triggered; starting a new episode");
            }
            self.rendered.retain(|alert| !reopened.contains(&alert.key));
            self.persist();
        }

        let merged = merge(&fresh, &self.durable, &self.rendered);

        // Stamp the first tick on which a resolved condition is no longer
        // firing; recurrence detection above keys off this.
        let mut cleared_changed = false;
        for (key, state) in self.durable.iter_mut() {
            if state.status == AlertStatus::Resolved
                && state.condition_cleared_at.is_none()
                && !fresh_keys.contains(key)
            {
                state.condition_cleared_at = Some(now);
                cleared_changed = true;
            }
        }
        if cleared_changed {
            self.persist();
        }

        self.rendered = merged;
        debug!(
            rendered = self.rendered.len(),
            durable = self.durable.len(),
            "alert reconciliation complete"
        );
        &self.rendered
    }

    /// Acknowledge the alert with the given rendering-time id on behalf of
    /// the operator. One-way in the UI; persisted immediately.
    pub fn acknowledge(&mut self, alert_id: Uuid, operator: &str) -> Result<()> {
        let now = Utc::now();
        self.transition(alert_id, |state, rendered| {
            state.status = AlertStatus::Acknowledged;
            state.acknowledged_by = Some(operator.to_owned());
            state.acknowledged_at = Some(now);
            rendered.apply_overlay(state);
        })
    }

    /// Resolve the alert with the given rendering-time id on behalf of the
    /// operator. Closes the current episode; persisted immediately.
    pub fn resolve(&mut self, alert_id: Uuid, operator: &str) -> Result<()> {
        let now = Utc::now();
        self.transition(alert_id, |state, rendered| {
            state.status = AlertStatus::Resolved;
            state.resolved_by = Some(operator.to_owned());
            state.resolved_at = Some(now);
            state.condition_cleared_at = None;
            rendered.apply_overlay(state);
        })
    }

    /// Attach or replace the operator note on the alert with the given
    /// rendering-time id.
    pub fn annotate(&mut self, alert_id: Uuid, note: &str) -> Result<()> {
        self.transition(alert_id, |state, rendered| {
            state.notes = Some(note.to_owned());
            rendered.apply_overlay(state);
        })
    }

    fn transition<F>(&mut self, alert_id: Uuid, apply: F) -> Result<()>
    where
        F: FnOnce(&mut DurableAlertState, &mut FleetAlert),
    {
        let position = self
            .rendered
            .iter()
            .position(|alert| alert.id == alert_id)
            .ok_or(AlertError::UnknownAlert(alert_id))?;
        let key = self.rendered[position].key.clone();
        let state = self
            .durable
            .entry(key.clone())
            .or_insert_with(|| DurableAlertState::new(key));
        apply(state, &mut self.rendered[position]);
        self.prune_expired(Utc::now());
        self.persist();
        Ok(())
    }

    /// The list most recently produced by [`Self::reconcile`].
    pub fn rendered(&self) -> &[FleetAlert] {
        &self.rendered
    }

    /// Current durable overlay, in insertion order.
    pub fn durable_states(&self) -> Vec<DurableAlertState> {
        self.durable.values().cloned().collect()
    }

    /// Drop resolved records older than the retention window. Active and
    /// acknowledged records are never age-pruned. Returns true when anything
    /// was removed.
    fn prune_expired(&mut self, now: DateTime<Utc>) -> bool {
        let retention = self.retention;
        let before = self.durable.len();
        self.durable.retain(|key, state| {
            let expired = state.status == AlertStatus::Resolved
                && state
                    .resolved_at
                    .map(|resolved_at| now - resolved_at > retention)
                    .unwrap_or(false);
            if expired {
                debug!(alert = %key, "pruning expired resolved alert record");
            }
            !expired
        });
        before != self.durable.len()
    }

    /// Total overwrite of the persisted collection. Failures are logged and
    /// swallowed: the in-memory overlay stays authoritative for this session.
    fn persist(&self) {
        let states: Vec<DurableAlertState> = self.durable.values().cloned().collect();
        if let Err(err) = self.store.save(&states) {
            warn!(store = self.store.name(), error = %err, "failed to persist alert state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use f_ems_model::AlertKind;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    fn fresh(key: &AlertKey, severity: Severity, message: &str, value: f64) -> FreshAlert {
        FreshAlert {
            key: key.clone(),
            asset_name: "Container 01".into(),
            severity,
            message: message.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    fn soc_key() -> AlertKey {
        AlertKey::new("bess-01", AlertKind::Soc, "low_soc")
    }

    #[test]
    fn merge_preserves_rendering_id_across_regenerations() {
        let key = soc_key();
        let durable = IndexMap::new();

        let first = merge(
            &[fresh(&key, Severity::Medium, "state of charge at 15.0%", 15.0)],
            &durable,
            &[],
        );
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, AlertStatus::Active);

        let second = merge(
            &[fresh(&key, Severity::High, "state of charge at 8.0%", 8.0)],
            &durable,
            &first,
        );
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].severity, Severity::High);
        assert!(second[0].message.contains("8.0"));
    }

    #[test]
    fn merge_orders_by_timestamp_descending() {
        let old_key = AlertKey::new("bess-01", AlertKind::Soh, "degraded_soh");
        let new_key = soc_key();
        let mut older = fresh(&old_key, Severity::Medium, "state of health at 88.0%", 88.0);
        older.timestamp = Utc::now() - chrono::Duration::minutes(5);
        let newer = fresh(&new_key, Severity::High, "state of charge at 8.0%", 8.0);

        let merged = merge(&[older, newer], &IndexMap::new(), &[]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key, new_key);
        assert_eq!(merged[1].key, old_key);
    }

    #[test]
    fn acknowledgement_survives_regeneration() {
        let key = soc_key();
        let mut reconciler = AlertReconciler::load(InMemoryStore::new(), WEEK);

        let first = merge(
            &[fresh(&key, Severity::Medium, "state of charge at 15.0%", 15.0)],
            &reconciler.durable,
            &[],
        );
        reconciler.rendered = first;
        let alert_id = reconciler.rendered()[0].id;
        reconciler.acknowledge(alert_id, "bob").unwrap();

        // A fresh detection defaults to active; the overlay must win.
        let second = merge(
            &[fresh(&key, Severity::High, "state of charge at 8.0%", 8.0)],
            &reconciler.durable,
            &reconciler.rendered,
        );
        assert_eq!(second[0].status, AlertStatus::Acknowledged);
        assert_eq!(second[0].acknowledged_by.as_deref(), Some("bob"));
        assert_eq!(second[0].severity, Severity::High);
    }

    #[test]
    fn cleared_condition_keeps_operator_record_visible() {
        let key = soc_key();
        let mut reconciler = AlertReconciler::load(InMemoryStore::new(), WEEK);
        reconciler.rendered = merge(
            &[fresh(&key, Severity::Medium, "state of charge at 15.0%", 15.0)],
            &reconciler.durable,
            &[],
        );
        let alert_id = reconciler.rendered()[0].id;
        reconciler.resolve(alert_id, "alice").unwrap();

        // Condition recovered: no fresh entry, but the resolved record stays.
        let merged = merge(&[], &reconciler.durable, &reconciler.rendered);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, AlertStatus::Resolved);
        assert_eq!(merged[0].resolved_by.as_deref(), Some("alice"));
        assert_eq!(merged[0].id, alert_id);
    }

    #[test]
    fn unknown_alert_id_is_an_error() {
        let mut reconciler = AlertReconciler::load(InMemoryStore::new(), WEEK);
        let err = reconciler.acknowledge(Uuid::new_v4(), "bob").unwrap_err();
        assert!(matches!(err, AlertError::UnknownAlert(_)));
    }

    #[test]
    fn retention_prunes_only_old_resolved_records() {
        let store = InMemoryStore::new();
        let old_key = soc_key();
        let recent_key = AlertKey::new("bess-02", AlertKind::Soh, "degraded_soh");
        let acked_key = AlertKey::new("bess-03", AlertKind::Cycles, "cycle_wear");

        let mut old_resolved = DurableAlertState::new(old_key.clone());
        old_resolved.status = AlertStatus::Resolved;
        old_resolved.resolved_at = Some(Utc::now() - chrono::Duration::days(8));

        let mut recent_resolved = DurableAlertState::new(recent_key.clone());
        recent_resolved.status = AlertStatus::Resolved;
        recent_resolved.resolved_at = Some(Utc::now() - chrono::Duration::days(6));

        let mut old_acked = DurableAlertState::new(acked_key.clone());
        old_acked.status = AlertStatus::Acknowledged;
        old_acked.acknowledged_at = Some(Utc::now() - chrono::Duration::days(30));

        store
            .save(&[old_resolved, recent_resolved, old_acked])
            .unwrap();

        let reconciler = AlertReconciler::load(store, WEEK);
        let remaining: Vec<AlertKey> = reconciler
            .durable_states()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert!(!remaining.contains(&old_key));
        assert!(remaining.contains(&recent_key));
        assert!(remaining.contains(&acked_key));
    }

    #[test]
    fn recurrence_after_clear_starts_a_new_episode() {
        let key = soc_key();
        let mut reconciler = AlertReconciler::load(InMemoryStore::new(), WEEK);

        let asset = firing_asset(8.0);
        reconciler.reconcile(std::slice::from_ref(&asset));
        let first_id = reconciler.rendered()[0].id;
        reconciler.resolve(first_id, "alice").unwrap();

        // Still firing right after resolve: the resolution must hold.
        let rendered = reconciler.reconcile(std::slice::from_ref(&asset));
        assert_eq!(rendered[0].status, AlertStatus::Resolved);

        // Condition recovers...
        let healthy = firing_asset(60.0);
        reconciler.reconcile(std::slice::from_ref(&healthy));

        // ...and re-triggers: new episode, active again, new identity.
        let relapsed = firing_asset(7.0);
        let rendered = reconciler.reconcile(std::slice::from_ref(&relapsed));
        let recurrence = rendered
            .iter()
            .find(|alert| alert.key == key)
            .expect("recurrence rendered");
        assert_eq!(recurrence.status, AlertStatus::Active);
        assert_ne!(recurrence.id, first_id);
        assert!(recurrence.resolved_by.is_none());
    }

    fn firing_asset(soc: f64) -> ContainerAsset {
        use f_ems_model::{ContainerStatus, HealthSample, PerformanceSample};

        let mut asset = ContainerAsset {
            id: "bess-01".into(),
            name: "Container 01".into(),
            model: "GV-500".into(),
            capacity_mwh: 2.0,
            rated_power_mw: 0.5,
            location: "Halden Substation".into(),
            latitude: 59.13,
            longitude: 11.39,
            status: ContainerStatus::Idle,
            performance: PerformanceSample {
                power_mw: 0.0,
                state_of_charge_pct: soc,
                efficiency_pct: 93.0,
                voltage_v: 800.0,
                current_a: 0.0,
                cycle_count: 1000,
                energy_stored_mwh: 0.0,
            },
            health: HealthSample {
                state_of_health_pct: 97.0,
            },
            conditions: Vec::new(),
            updated_at: Utc::now(),
        };
        asset.refresh_energy_stored();
        if soc < 20.0 {
            asset.conditions = vec![f_ems_model::AlertCondition {
                kind: AlertKind::Soc,
                rule: "low_soc".into(),
                severity: if soc < 10.0 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                message: format!("state of charge at {:.1}%", soc),
                value: soc,
                raised_at: Utc::now(),
            }];
        }
        asset
    }
}

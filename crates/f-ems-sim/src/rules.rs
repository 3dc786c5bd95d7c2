//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Static threshold rules deriving alert conditions from telemetry."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use f_ems_model::{AlertCondition, AlertKind, ContainerAsset, ContainerStatus, Severity};

const SOC_MEDIUM_PCT: f64 = 20.0;
const SOC_HIGH_PCT: f64 = 10.0;
const SOH_MEDIUM_PCT: f64 = 90.0;
const SOH_HIGH_PCT: f64 = 80.0;
const EFFICIENCY_LOW_PCT: f64 = 85.0;
const EFFICIENCY_MEDIUM_PCT: f64 = 75.0;
const CYCLES_MEDIUM: u32 = 4500;
const CYCLES_HIGH: u32 = 5500;

/// Evaluate the static threshold rules against the asset's current telemetry.
///
/// Conditions are derived fresh on every call; severity and message track the
/// live value while the rule slug stays fixed, so the condition's stable
/// identity survives value changes.
pub fn evaluate_conditions(asset: &ContainerAsset) -> Vec<AlertCondition> {
    let mut conditions = Vec::new();
    let raised_at = asset.updated_at;

    if asset.status == ContainerStatus::Offline {
        conditions.push(AlertCondition {
            kind: AlertKind::Offline,
            rule: "offline".into(),
            severity: Severity::High,
            message: format!("{} is offline", asset.name),
            value: 0.0,
            raised_at,
        });
    }

    let soc = asset.state_of_charge();
    if soc < SOC_MEDIUM_PCT {
        let severity = if soc < SOC_HIGH_PCT {
            Severity::High
        } else {
            Severity::Medium
        };
        conditions.push(AlertCondition {
            kind: AlertKind::Soc,
            rule: "low_soc".into(),
            severity,
            message: format!("state of charge at {:.1}%", soc),
            value: soc,
            raised_at,
        });
    }

    let soh = asset.health.state_of_health_pct;
    if soh < SOH_MEDIUM_PCT {
        let severity = if soh < SOH_HIGH_PCT {
            Severity::High
        } else {
            Severity::Medium
        };
        conditions.push(AlertCondition {
            kind: AlertKind::Soh,
            rule: "degraded_soh".into(),
            severity,
            message: format!("state of health at {:.1}%", soh),
            value: soh,
            raised_at,
        });
    }

    let efficiency = asset.performance.efficiency_pct;
    if efficiency < EFFICIENCY_LOW_PCT {
        let severity = if efficiency < EFFICIENCY_MEDIUM_PCT {
            Severity::Medium
        } else {
            Severity::Low
        };
        conditions.push(AlertCondition {
            kind: AlertKind::Efficiency,
            rule: "low_efficiency".into(),
            severity,
            message: format!("round-trip efficiency at {:.1}%", efficiency),
            value: efficiency,
            raised_at,
        });
    }

    let cycles = asset.performance.cycle_count;
    if cycles > CYCLES_MEDIUM {
        let severity = if cycles > CYCLES_HIGH {
            Severity::High
        } else {
            Severity::Medium
        };
        conditions.push(AlertCondition {
            kind: AlertKind::Cycles,
            rule: "cycle_wear".into(),
            severity,
            message: format!("{} equivalent cycles accumulated", cycles),
            value: f64::from(cycles),
            raised_at,
        });
    }

    conditions
}

//! ---
//! ems_section: "02-fleet-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Fleet asset and alert condition data model."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::AlertCondition;

/// Operating status of a battery storage container, derived each tick from
/// the sign and magnitude of the measured power flow. `Maintenance` and
/// `Offline` are operator-set holds that the simulator never leaves on its
/// own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Power is flowing into the container.
    Charging,
    /// Power is flowing out of the container.
    Discharging,
    /// Power flow is inside the idle band.
    Idle,
    /// Container is energised but deliberately held out of dispatch.
    Standby,
    /// Container is undergoing service work.
    Maintenance,
    /// Container is not reporting.
    Offline,
}

impl ContainerStatus {
    /// Wire/label form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Charging => "charging",
            ContainerStatus::Discharging => "discharging",
            ContainerStatus::Idle => "idle",
            ContainerStatus::Standby => "standby",
            ContainerStatus::Maintenance => "maintenance",
            ContainerStatus::Offline => "offline",
        }
    }

    /// True for the operator-set holds during which telemetry is frozen.
    pub fn is_held(&self) -> bool {
        matches!(self, ContainerStatus::Maintenance | ContainerStatus::Offline)
    }
}

/// Point-in-time electrical telemetry for a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    /// Signed power flow in MW; positive while charging.
    pub power_mw: f64,
    /// State of charge in percent of usable capacity.
    pub state_of_charge_pct: f64,
    /// Round-trip efficiency estimate in percent.
    pub efficiency_pct: f64,
    /// DC bus voltage in volts.
    pub voltage_v: f64,
    /// DC bus current in amperes.
    pub current_a: f64,
    /// Accumulated full equivalent cycles.
    pub cycle_count: u32,
    /// Energy currently stored, in MWh.
    pub energy_stored_mwh: f64,
}

/// Degradation telemetry for a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    /// State of health in percent of nameplate capacity.
    pub state_of_health_pct: f64,
}

/// One battery storage container in the monitored fleet.
///
/// Created once at simulator initialisation and mutated in place on every
/// tick; `conditions` is recomputed fresh each tick and carries no identity
/// of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerAsset {
    /// Stable identifier, assigned at creation and never reassigned.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Hardware model designation.
    pub model: String,
    /// Nameplate energy capacity in MWh.
    pub capacity_mwh: f64,
    /// Rated charge/discharge power in MW.
    pub rated_power_mw: f64,
    /// Site or substation label.
    pub location: String,
    /// Site latitude in decimal degrees.
    pub latitude: f64,
    /// Site longitude in decimal degrees.
    pub longitude: f64,
    /// Derived operating status.
    pub status: ContainerStatus,
    /// Live electrical telemetry.
    pub performance: PerformanceSample,
    /// Live degradation telemetry.
    pub health: HealthSample,
    /// Threshold conditions detected on the most recent tick.
    #[serde(default)]
    pub conditions: Vec<AlertCondition>,
    /// Timestamp of the most recent telemetry mutation.
    pub updated_at: DateTime<Utc>,
}

impl ContainerAsset {
    /// Recompute the stored-energy figure from capacity and state of charge.
    pub fn refresh_energy_stored(&mut self) {
        self.performance.energy_stored_mwh =
            self.capacity_mwh * self.performance.state_of_charge_pct / 100.0;
    }

    /// State-of-charge accessor with the defensive default applied: a
    /// non-finite reading is reported as 50 % rather than propagated.
    pub fn state_of_charge(&self) -> f64 {
        let soc = self.performance.state_of_charge_pct;
        if soc.is_finite() {
            soc
        } else {
            50.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> ContainerAsset {
        ContainerAsset {
            id: "bess-01".into(),
            name: "Container 01".into(),
            model: "GV-500".into(),
            capacity_mwh: 2.0,
            rated_power_mw: 0.5,
            location: "Substation North".into(),
            latitude: 59.91,
            longitude: 10.75,
            status: ContainerStatus::Idle,
            performance: PerformanceSample {
                power_mw: 0.0,
                state_of_charge_pct: 50.0,
                efficiency_pct: 93.0,
                voltage_v: 800.0,
                current_a: 0.0,
                cycle_count: 100,
                energy_stored_mwh: 1.0,
            },
            health: HealthSample {
                state_of_health_pct: 98.0,
            },
            conditions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ContainerStatus::Discharging).unwrap();
        assert_eq!(json, "\"discharging\"");
        assert_eq!(ContainerStatus::Discharging.as_str(), "discharging");
    }

    #[test]
    fn energy_stored_tracks_soc() {
        let mut asset = sample_asset();
        asset.performance.state_of_charge_pct = 25.0;
        asset.refresh_energy_stored();
        assert!((asset.performance.energy_stored_mwh - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_soc_defaults_to_half() {
        let mut asset = sample_asset();
        asset.performance.state_of_charge_pct = f64::NAN;
        assert_eq!(asset.state_of_charge(), 50.0);
    }
}

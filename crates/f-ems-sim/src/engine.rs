//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bounded pseudo-random telemetry perturbation engine."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::Utc;
use rand::prelude::*;
use rand_distr::Normal;

use f_ems_common::config::SimulationConfig;
use f_ems_model::{ContainerAsset, ContainerStatus};

/// Fraction of rated power below which a container reads as idle.
const IDLE_BAND_FRACTION: f64 = 0.05;
/// Nominal DC bus voltage the walk gravitates towards.
const NOMINAL_VOLTAGE_V: f64 = 800.0;

/// Perturbs fleet telemetry with small, bounded pseudo-random deltas.
///
/// Every mutation clamps: no tick may push a field outside its documented
/// range. The walk is deterministic for a given seed.
#[derive(Debug)]
pub struct PerturbationEngine {
    rng: StdRng,
    noise: Normal<f64>,
}

impl PerturbationEngine {
    pub fn new(config: &SimulationConfig) -> Self {
        let sigma = if config.noise_sigma > 0.0 {
            config.noise_sigma
        } else {
            1.0
        };
        Self {
            rng: StdRng::seed_from_u64(config.random_seed),
            noise: Normal::new(0.0, sigma).expect("sigma must be positive"),
        }
    }

    /// Advance one container by one tick: perturb telemetry, clamp, derive
    /// status, and refresh derived fields. Alert conditions are recomputed by
    /// the caller after the mutation settles.
    pub fn advance(&mut self, asset: &mut ContainerAsset) {
        match asset.status {
            ContainerStatus::Maintenance | ContainerStatus::Offline => {
                // Held containers do not move power; readings freeze.
                asset.performance.power_mw = 0.0;
                asset.performance.current_a = 0.0;
            }
            ContainerStatus::Standby => {
                asset.performance.power_mw = 0.0;
                asset.performance.current_a = 0.0;
                self.drift_passive(asset);
            }
            _ => {
                self.walk_power(asset);
                self.walk_charge(asset);
                self.drift_passive(asset);
                self.derive_electricals(asset);
                asset.status = derive_status(asset);
            }
        }
        asset.refresh_energy_stored();
        asset.updated_at = Utc::now();
    }

    fn walk_power(&mut self, asset: &mut ContainerAsset) {
        let rated = asset.rated_power_mw;
        let mut power = asset.performance.power_mw;
        if !power.is_finite() {
            power = 0.0;
        }
        power += self.noise_sample() * rated * 0.15;
        // Reverse the flow near the charge bounds instead of pinning there.
        let soc = asset.state_of_charge();
        if soc >= 99.0 && power > 0.0 {
            power = -power * 0.5;
        } else if soc <= 1.0 && power < 0.0 {
            power = -power * 0.5;
        }
        asset.performance.power_mw = power.clamp(-rated, rated);
    }

    fn walk_charge(&mut self, asset: &mut ContainerAsset) {
        let mut soc = asset.state_of_charge();
        // Charge moves with the power flow plus a little measurement noise,
        // bounded to a few percent per tick.
        let flow = asset.performance.power_mw / asset.capacity_mwh;
        soc += (flow * 2.0).clamp(-2.0, 2.0) + self.noise_sample() * 0.4;
        asset.performance.state_of_charge_pct = soc.clamp(0.0, 100.0);

        // Throughput wears the pack: occasional cycle increments and a slow
        // state-of-health decay proportional to utilisation.
        let utilisation = (asset.performance.power_mw.abs() / asset.rated_power_mw).clamp(0.0, 1.0);
        if self.rng.gen_bool((utilisation * 0.05).clamp(0.0, 1.0)) {
            asset.performance.cycle_count = asset.performance.cycle_count.saturating_add(1);
        }
        if self.rng.gen_bool((utilisation * 0.01).clamp(0.0, 1.0)) {
            let soh = asset.health.state_of_health_pct - 0.01;
            asset.health.state_of_health_pct = soh.clamp(0.0, 100.0);
        }
    }

    fn drift_passive(&mut self, asset: &mut ContainerAsset) {
        let mut efficiency = asset.performance.efficiency_pct;
        if !efficiency.is_finite() {
            efficiency = 92.0;
        }
        efficiency += (92.0 - efficiency) * 0.05 + self.noise_sample() * 0.3;
        asset.performance.efficiency_pct = efficiency.clamp(0.0, 100.0);

        let soh = asset.health.state_of_health_pct;
        if !soh.is_finite() {
            asset.health.state_of_health_pct = 100.0;
        }
    }

    fn derive_electricals(&mut self, asset: &mut ContainerAsset) {
        let soc = asset.state_of_charge();
        let mut voltage = NOMINAL_VOLTAGE_V + (soc - 50.0) * 1.2 + self.noise_sample() * 2.0;
        voltage = voltage.clamp(600.0, 1000.0);
        asset.performance.voltage_v = voltage;
        asset.performance.current_a = asset.performance.power_mw * 1_000_000.0 / voltage;
    }

    fn noise_sample(&mut self) -> f64 {
        self.noise.sample(&mut self.rng)
    }
}

/// Derive the operating status from the sign and magnitude of the power flow.
fn derive_status(asset: &ContainerAsset) -> ContainerStatus {
    let idle_band = asset.rated_power_mw * IDLE_BAND_FRACTION;
    let power = asset.performance.power_mw;
    if power > idle_band {
        ContainerStatus::Charging
    } else if power < -idle_band {
        ContainerStatus::Discharging
    } else {
        ContainerStatus::Idle
    }
}

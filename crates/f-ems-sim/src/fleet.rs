//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Fleet seeding helpers for the telemetry simulator."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::Utc;
use rand::prelude::*;

use f_ems_common::config::{ContainerConfig, FleetConfig, SimulationConfig};
use f_ems_model::{ContainerAsset, ContainerStatus, HealthSample, PerformanceSample};

/// Build the initial fleet from configuration, falling back to the built-in
/// demonstration fleet when no containers are configured.
///
/// Initial telemetry is drawn from the configured seed, so two runs with the
/// same configuration start from identical fleet state.
pub fn seed_fleet(fleet: &FleetConfig, simulation: &SimulationConfig) -> Vec<ContainerAsset> {
    if fleet.containers.is_empty() {
        return default_fleet(simulation);
    }
    let mut rng = StdRng::seed_from_u64(simulation.random_seed);
    fleet
        .containers
        .iter()
        .map(|(container_id, config)| seed_container(container_id, config, &mut rng))
        .collect()
}

/// Built-in demonstration fleet used when the configuration declares no
/// containers.
pub fn default_fleet(simulation: &SimulationConfig) -> Vec<ContainerAsset> {
    let mut rng = StdRng::seed_from_u64(simulation.random_seed);
    DEMO_SITES
        .iter()
        .enumerate()
        .map(|(index, site)| {
            let container_id = format!("bess-{:02}", index + 1);
            let config = ContainerConfig {
                name: format!("Container {:02}", index + 1),
                model: site.model.to_owned(),
                capacity_mwh: site.capacity_mwh,
                rated_power_mw: site.rated_power_mw,
                location: site.location.to_owned(),
                latitude: site.latitude,
                longitude: site.longitude,
            };
            seed_container(&container_id, &config, &mut rng)
        })
        .collect()
}

fn seed_container(container_id: &str, config: &ContainerConfig, rng: &mut StdRng) -> ContainerAsset {
    let state_of_charge_pct = rng.gen_range(25.0..95.0);
    let mut asset = ContainerAsset {
        id: container_id.to_owned(),
        name: config.name.clone(),
        model: config.model.clone(),
        capacity_mwh: config.capacity_mwh,
        rated_power_mw: config.rated_power_mw,
        location: config.location.clone(),
        latitude: config.latitude,
        longitude: config.longitude,
        status: ContainerStatus::Idle,
        performance: PerformanceSample {
            power_mw: 0.0,
            state_of_charge_pct,
            efficiency_pct: rng.gen_range(88.0..96.0),
            voltage_v: rng.gen_range(760.0..840.0),
            current_a: 0.0,
            cycle_count: rng.gen_range(400..4200),
            energy_stored_mwh: 0.0,
        },
        health: HealthSample {
            state_of_health_pct: rng.gen_range(92.0..100.0),
        },
        conditions: Vec::new(),
        updated_at: Utc::now(),
    };
    asset.refresh_energy_stored();
    asset
}

struct DemoSite {
    model: &'static str,
    capacity_mwh: f64,
    rated_power_mw: f64,
    location: &'static str,
    latitude: f64,
    longitude: f64,
}

const DEMO_SITES: [DemoSite; 6] = [
    DemoSite {
        model: "GV-500",
        capacity_mwh: 2.0,
        rated_power_mw: 0.5,
        location: "Halden Substation",
        latitude: 59.13,
        longitude: 11.39,
    },
    DemoSite {
        model: "GV-500",
        capacity_mwh: 2.0,
        rated_power_mw: 0.5,
        location: "Vik Industrial Park",
        latitude: 61.08,
        longitude: 6.58,
    },
    DemoSite {
        model: "PS-2500",
        capacity_mwh: 10.0,
        rated_power_mw: 2.5,
        location: "Skien Grid Yard",
        latitude: 59.21,
        longitude: 9.61,
    },
    DemoSite {
        model: "PS-2500",
        capacity_mwh: 10.0,
        rated_power_mw: 2.5,
        location: "Bodø Harbour Depot",
        latitude: 67.28,
        longitude: 14.40,
    },
    DemoSite {
        model: "GV-500X",
        capacity_mwh: 4.0,
        rated_power_mw: 1.0,
        location: "Tromsø North Ring",
        latitude: 69.65,
        longitude: 18.96,
    },
    DemoSite {
        model: "PS-2500",
        capacity_mwh: 10.0,
        rated_power_mw: 2.5,
        location: "Stavanger Export Pier",
        latitude: 58.97,
        longitude: 5.73,
    },
];

//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation runtime module exports and shared types."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Telemetry simulation for the F-EMS fleet monitoring core.
//!
//! The [`TelemetryHub`] owns a fleet of simulated battery storage containers,
//! perturbs their telemetry on a periodic tick, and fans the resulting fleet
//! snapshot out to registered subscribers.

pub mod engine;
pub mod fleet;
pub mod hub;
pub mod rules;

pub use engine::PerturbationEngine;
pub use fleet::{default_fleet, seed_fleet};
pub use hub::{Subscription, TelemetryHub};
pub use rules::evaluate_conditions;

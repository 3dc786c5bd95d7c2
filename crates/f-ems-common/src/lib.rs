//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the fleet runtime."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Core shared primitives for the F-EMS fleet monitoring workspace.
//! This crate exposes configuration loading, logging bootstrap, and
//! time helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AlertConfig, AppConfig, ContainerConfig, FleetConfig, LoadedAppConfig, LoggingConfig,
    SimulationConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{duration_to_millis, to_chrono_duration};

//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the fleet runtime."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_tick_interval() -> Duration {
    Duration::from_millis(5000)
}

fn default_simulation_seed() -> u64 {
    0xBE55u64
}

fn default_noise_sigma() -> f64 {
    1.0
}

fn default_store_path() -> PathBuf {
    PathBuf::from("target/alerts/alert-state.json")
}

fn default_retention() -> Duration {
    // Resolved alert records are kept for a week before pruning.
    Duration::from_secs(7 * 24 * 3600)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the F-EMS runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "F_EMS_CONFIG";

    /// Load configuration from disk, respecting the `F_EMS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a container configuration by identifier.
    pub fn container(&self, container_id: &str) -> Option<&ContainerConfig> {
        self.fleet.containers.get(container_id)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        for (container_id, container) in &self.fleet.containers {
            container.validate(container_id)?;
        }
        if self.alerts.retention.is_zero() {
            return Err(anyhow!("alert retention window must be non-zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Static description of the monitored container fleet.
///
/// An empty container map is allowed; the simulator then seeds its built-in
/// demonstration fleet instead.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FleetConfig {
    #[serde(default)]
    pub containers: IndexMap<String, ContainerConfig>,
}

/// Static attributes of a single battery storage container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    pub model: String,
    pub capacity_mwh: f64,
    pub rated_power_mw: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl ContainerConfig {
    pub fn validate(&self, container_id: &str) -> Result<()> {
        if self.capacity_mwh <= 0.0 {
            return Err(anyhow!(
                "container '{}' must declare a positive capacity",
                container_id
            ));
        }
        if self.rated_power_mw <= 0.0 {
            return Err(anyhow!(
                "container '{}' must declare a positive rated power",
                container_id
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(anyhow!(
                "container '{}' has coordinates outside the valid range",
                container_id
            ));
        }
        Ok(())
    }
}

/// Knobs for the telemetry perturbation engine and tick scheduler.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Period between scheduled ticks. Zero is treated as "use the default"
    /// by the hub rather than rejected here.
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(default = "default_simulation_seed")]
    pub random_seed: u64,
    /// Standard deviation of the Gaussian telemetry noise, in percent of the
    /// affected field range per tick.
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            random_seed: default_simulation_seed(),
            noise_sigma: default_noise_sigma(),
        }
    }
}

/// Durable alert-state store settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Resolved records older than this window are pruned on load and save.
    #[serde(default = "default_retention")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retention: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            retention: default_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

//! Configuration for refuel runs.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REFUEL_SETTLEMENT_TOKEN, REFUEL_STAGE_TIMEOUT_SECONDS)
//! 2. Config file (explicit path, or .refuel/config.yaml)
//! 3. Defaults (simulated stages, USDC settlement)
//!
//! Config file discovery:
//! - Searches current directory and parents for .refuel/config.yaml
//! - Falls back to ~/.refuel/config.yaml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::orchestrator::{PipelineConfig, DEFAULT_SETTLEMENT_TOKEN, DEFAULT_STAGE_TIMEOUT};
use crate::domain::{FuelType, StageRole};

pub const ENV_SETTLEMENT_TOKEN: &str = "REFUEL_SETTLEMENT_TOKEN";
pub const ENV_STAGE_TIMEOUT: &str = "REFUEL_STAGE_TIMEOUT_SECONDS";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub settlement_token: Option<String>,
    #[serde(default)]
    pub stage_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub strict_sensor_severity: Option<bool>,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Backend selection per stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default)]
    pub sensor: StageBackend,
    #[serde(default)]
    pub decision: StageBackend,
    #[serde(default)]
    pub counterparty: StageBackend,
}

impl StagesConfig {
    pub fn for_role(&self, role: StageRole) -> &StageBackend {
        match role {
            StageRole::Sensor => &self.sensor,
            StageRole::Decision => &self.decision,
            StageRole::Counterparty => &self.counterparty,
        }
    }
}

/// How a stage produces its output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StageBackend {
    /// Built-in deterministic rule engine
    #[default]
    Simulated,

    /// External generator process (input on stdin, output on stdout)
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// Prefix the input with the stage's instruction text
        #[serde(default)]
        send_instructions: bool,
    },

    /// Remote generator reached over HTTP
    Webhook {
        endpoint: String,
        /// Env var holding a bearer token
        #[serde(default)]
        token_env: Option<String>,
    },
}

/// Parameters for the simulated stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub car_id: String,
    pub station_id: String,
    pub fuel_level_percent: f64,
    /// Readings above this level are reported as FUEL_OK
    pub alert_threshold_percent: f64,
    pub lat: f64,
    pub lon: f64,
    pub odometer_km: f64,
    pub fuel_type: FuelType,
    pub tank_capacity_liters: f64,
    pub km_per_liter: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            car_id: "car-001".to_string(),
            station_id: "station-777".to_string(),
            fuel_level_percent: 8.0,
            alert_threshold_percent: 50.0,
            lat: -23.5505,
            lon: -46.6333,
            odometer_km: 48_211.0,
            fuel_type: FuelType::Gasoline,
            tank_capacity_liters: 50.0,
            km_per_liter: 12.0,
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Payment token every event must reference
    pub settlement_token: String,
    /// Per-stage timeout (0 disables it)
    pub stage_timeout_seconds: u64,
    pub strict_sensor_severity: bool,
    pub stages: StagesConfig,
    pub simulation: SimulationConfig,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            settlement_token: DEFAULT_SETTLEMENT_TOKEN.to_string(),
            stage_timeout_seconds: DEFAULT_STAGE_TIMEOUT.as_secs(),
            strict_sensor_severity: false,
            stages: StagesConfig::default(),
            simulation: SimulationConfig::default(),
            config_file: None,
        }
    }
}

impl ResolvedConfig {
    /// Settings handed to the orchestrator
    pub fn pipeline_config(&self) -> PipelineConfig {
        let timeout = match self.stage_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        PipelineConfig::new(self.settlement_token.clone())
            .with_stage_timeout(timeout)
            .with_strict_sensor_severity(self.strict_sensor_severity)
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".refuel").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let home_config = dirs::home_dir()?.join(".refuel").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge file values and environment overrides over the defaults
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let mut config = ResolvedConfig::default();

    if let Some((path, file)) = file {
        if let Some(token) = file.settlement_token {
            config.settlement_token = token;
        }
        if let Some(secs) = file.stage_timeout_seconds {
            config.stage_timeout_seconds = secs;
        }
        if let Some(strict) = file.strict_sensor_severity {
            config.strict_sensor_severity = strict;
        }
        config.stages = file.stages;
        config.simulation = file.simulation;
        config.config_file = Some(path);
    }

    if let Some(token) = env(ENV_SETTLEMENT_TOKEN) {
        config.settlement_token = token;
    }
    if let Some(secs) = env(ENV_STAGE_TIMEOUT) {
        config.stage_timeout_seconds = secs
            .trim()
            .parse()
            .with_context(|| format!("{} must be a whole number of seconds", ENV_STAGE_TIMEOUT))?;
    }

    if config.settlement_token.trim().is_empty() {
        anyhow::bail!("Settlement token cannot be empty");
    }

    Ok(config)
}

/// Load configuration from all sources.
///
/// An explicit path must exist; otherwise discovery is attempted and a
/// missing file means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let file = match path {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve(file, |key| std::env::var(key).ok())
}

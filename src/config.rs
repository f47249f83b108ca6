//! Run configuration: epidemic tunables, outcome thresholds, policy catalog,
//! scheduler cadence, snapshot export and logging.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::modifiers::PolicyCatalog;
use crate::outcome::OutcomeRules;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default = "default_starting_points")]
    pub starting_points: u64,
    #[serde(default)]
    pub epidemic: EpidemicParams,
    #[serde(default)]
    pub outcome: OutcomeRules,
    #[serde(default)]
    pub policies: PolicyCatalog,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "outbreak".to_string()
}

fn default_random_seed() -> u64 {
    7
}

fn default_starting_points() -> u64 {
    50
}

/// Base rates and seeding amounts used by the per-region model and the
/// cross-border spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpidemicParams {
    pub base_spread_rate: f64,
    pub cure_floor: f64,
    pub cure_fraction: f64,
    pub base_mortality_rate: f64,
    pub seed_infected: u64,
    pub seeding_threshold: u64,
    pub neighbor_seed: u64,
    pub base_spread_chance: f64,
    pub points_per_tick: u64,
}

impl Default for EpidemicParams {
    fn default() -> Self {
        Self {
            base_spread_rate: 0.05,
            cure_floor: 10.0,
            cure_fraction: 0.01,
            base_mortality_rate: 0.001,
            seed_infected: 1_000,
            seeding_threshold: 500,
            neighbor_seed: 50,
            base_spread_chance: 0.05,
            points_per_tick: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub every_ticks: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    "snapshots".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            every_ticks: 0,
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            random_seed: default_random_seed(),
            starting_points: default_starting_points(),
            epidemic: EpidemicParams::default(),
            outcome: OutcomeRules::default(),
            policies: PolicyCatalog::standard(),
            scheduler: SchedulerConfig::default(),
            snapshot: SnapshotConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let epidemic = &self.epidemic;
        for (label, value) in [
            ("epidemic.base_spread_rate", epidemic.base_spread_rate),
            ("epidemic.cure_floor", epidemic.cure_floor),
            ("epidemic.cure_fraction", epidemic.cure_fraction),
            ("epidemic.base_mortality_rate", epidemic.base_mortality_rate),
            ("epidemic.base_spread_chance", epidemic.base_spread_chance),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                bail!("{label} must be a finite non-negative number, got {value}");
            }
        }

        let outcome = &self.outcome;
        for (label, value) in [
            ("outcome.victory_max_dead_fraction", outcome.victory_max_dead_fraction),
            ("outcome.defeat_dead_fraction", outcome.defeat_dead_fraction),
            ("outcome.defeat_infected_fraction", outcome.defeat_infected_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("{label} must lie in (0, 1], got {value}");
            }
        }

        if self.scheduler.tick_interval_ms == 0 {
            bail!("scheduler.tick_interval_ms must be greater than zero");
        }

        self.policies
            .validate()
            .context("policy catalog invalid")?;
        Ok(())
    }
}

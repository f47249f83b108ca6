//! Terminal conditions and the end-of-run report.

use serde::{Deserialize, Serialize};

use crate::world::GlobalStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    Paused,
    Running,
    Victory,
    Defeat,
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Victory | SimulationStatus::Defeat)
    }
}

/// Fractions of the total population that end a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeRules {
    pub victory_max_dead_fraction: f64,
    pub defeat_dead_fraction: f64,
    pub defeat_infected_fraction: f64,
}

impl Default for OutcomeRules {
    fn default() -> Self {
        Self {
            victory_max_dead_fraction: 0.5,
            defeat_dead_fraction: 0.9,
            defeat_infected_fraction: 0.95,
        }
    }
}

impl OutcomeRules {
    /// Checked in priority order: eradication, population collapse,
    /// containment failure.
    pub fn evaluate(&self, stats: &GlobalStats) -> SimulationStatus {
        let population = stats.total_population as f64;
        let dead = stats.total_dead as f64;
        let infected = stats.total_infected as f64;

        if stats.total_infected == 0 && dead < self.victory_max_dead_fraction * population {
            SimulationStatus::Victory
        } else if dead >= self.defeat_dead_fraction * population {
            SimulationStatus::Defeat
        } else if infected >= self.defeat_infected_fraction * population {
            SimulationStatus::Defeat
        } else {
            SimulationStatus::Running
        }
    }
}

/// Figures shown on the ending screen once a run is decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingReport {
    pub outcome: SimulationStatus,
    pub survivors: u64,
    pub casualties: u64,
    pub infected: u64,
    pub days: u64,
    pub policies_enacted: Vec<String>,
}

impl EndingReport {
    pub fn new(outcome: SimulationStatus, stats: &GlobalStats, policies: &[String]) -> Self {
        Self {
            outcome,
            survivors: stats.total_population - stats.total_dead,
            casualties: stats.total_dead,
            infected: stats.total_infected,
            days: stats.day,
            policies_enacted: policies.to_vec(),
        }
    }
}

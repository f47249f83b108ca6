use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, EpidemicParams};
use crate::modifiers::{Difficulty, Modifiers, PolicyCatalog};
use crate::outcome::{EndingReport, OutcomeRules, SimulationStatus};
use crate::rng::{RngManager, SystemRng};
use crate::scenario::RegionDataset;
use crate::snapshot::SimulationSnapshot;
use crate::systems::{AdjacencySpreadSystem, BookkeepingSystem, EpidemicSystem};
use crate::systems::epidemic::Transitions;
use crate::world::{Bookkeeping, RegionId, World};

/// Everything a run needs besides the region dataset.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub run_name: String,
    pub seed: u64,
    pub starting_points: u64,
    pub epidemic: EpidemicParams,
    pub outcome: OutcomeRules,
    pub policies: PolicyCatalog,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_name: config.name.clone(),
            seed: config.random_seed,
            starting_points: config.starting_points,
            epidemic: config.epidemic.clone(),
            outcome: config.outcome.clone(),
            policies: config.policies.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone)]
pub struct EngineBuilder {
    settings: EngineSettings,
    dataset: RegionDataset,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, dataset: RegionDataset) -> Self {
        Self { settings, dataset }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.settings.seed = seed;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn build(&self) -> Engine {
        let systems: Vec<Box<dyn System>> = vec![
            Box::new(EpidemicSystem::new()),
            Box::new(AdjacencySpreadSystem::new()),
            Box::new(BookkeepingSystem::new()),
        ];
        Engine {
            world: World::new(self.dataset.build_regions(), self.settings.starting_points),
            rng: RngManager::new(self.settings.seed),
            systems,
            status: SimulationStatus::Paused,
            difficulty: None,
            modifiers: Modifiers::default(),
            unlocked: Vec::new(),
            ending: None,
            dataset: self.dataset.clone(),
            settings: self.settings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartInfection {
        region: RegionId,
        difficulty: Difficulty,
    },
    PurchasePolicy {
        policy: String,
    },
}

/// Why a command was declined. Declined commands never change state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejection {
    #[error("unknown region '{0}'")]
    UnknownRegion(RegionId),
    #[error("unknown policy '{0}'")]
    UnknownPolicy(String),
    #[error("unknown difficulty '{0}'")]
    UnknownDifficulty(String),
    #[error("policy '{0}' is already enacted")]
    AlreadyUnlocked(String),
    #[error("insufficient funds: need {cost} points, have {available}")]
    InsufficientFunds { cost: u64, available: u64 },
    #[error("no outbreak is running yet")]
    NotRunning,
    #[error("the simulation has already ended")]
    Finished,
}

pub struct SystemContext<'a> {
    pub day: u64,
    pub modifiers: &'a Modifiers,
    pub params: &'a EpidemicParams,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext<'_>, world: &mut World, rng: &mut SystemRng<'_>);
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct TickSummary {
    pub day: u64,
    pub status: SimulationStatus,
    pub points_gained: u64,
    pub transitions: Transitions,
    pub seeded: Vec<RegionId>,
    pub system_reports: Vec<SystemRunReport>,
}

/// Owns the authoritative simulation state. Every mutation goes through
/// [`Engine::apply_command`] or [`Engine::tick`].
pub struct Engine {
    settings: EngineSettings,
    dataset: RegionDataset,
    world: World,
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    status: SimulationStatus,
    difficulty: Option<Difficulty>,
    modifiers: Modifiers,
    unlocked: Vec<String>,
    ending: Option<EndingReport>,
}

impl Engine {
    pub fn new(settings: EngineSettings, dataset: RegionDataset) -> Self {
        EngineBuilder::new(settings, dataset).build()
    }

    pub fn apply_command(&mut self, command: Command) -> Result<(), CommandRejection> {
        match command {
            Command::StartInfection { region, difficulty } => {
                self.start_infection(&region, difficulty)
            }
            Command::PurchasePolicy { policy } => self.purchase_policy(&policy),
        }
    }

    /// Seeds patient zero and starts the clock. Issued while a run is already
    /// going, it throws that run away and starts over from the dataset, with
    /// every random stream rewound to the seed.
    pub fn start_infection(
        &mut self,
        region: &RegionId,
        difficulty: Difficulty,
    ) -> Result<(), CommandRejection> {
        if self.status.is_terminal() {
            return Err(CommandRejection::Finished);
        }
        if self.world.region(region).is_none() {
            return Err(CommandRejection::UnknownRegion(region.clone()));
        }

        if self.status == SimulationStatus::Running {
            info!(run = %self.settings.run_name, day = self.world.stats().day, "run.restarted");
            self.world = World::new(self.dataset.build_regions(), self.settings.starting_points);
        }

        let seed_infected = self.settings.epidemic.seed_infected;
        let seeded = match self.world.region_mut(region) {
            Some(target) => target.seed(seed_infected),
            None => return Err(CommandRejection::UnknownRegion(region.clone())),
        };
        self.world.recompute_totals();
        self.rng.rewind();

        self.difficulty = Some(difficulty);
        self.modifiers = difficulty.resolve();
        self.unlocked.clear();
        self.ending = None;
        self.status = SimulationStatus::Running;
        info!(
            run = %self.settings.run_name,
            %region,
            %difficulty,
            seeded,
            seed = self.rng.seed(),
            "outbreak.started"
        );
        Ok(())
    }

    pub fn purchase_policy(&mut self, policy_id: &str) -> Result<(), CommandRejection> {
        match self.status {
            SimulationStatus::Victory | SimulationStatus::Defeat => {
                return Err(CommandRejection::Finished)
            }
            SimulationStatus::Paused => return Err(CommandRejection::NotRunning),
            SimulationStatus::Running => {}
        }
        let policy = self
            .settings
            .policies
            .get(policy_id)
            .ok_or_else(|| CommandRejection::UnknownPolicy(policy_id.to_string()))?;
        if self.unlocked.iter().any(|id| id == policy_id) {
            return Err(CommandRejection::AlreadyUnlocked(policy_id.to_string()));
        }
        let available = self.world.stats.points;
        if available < policy.cost {
            return Err(CommandRejection::InsufficientFunds {
                cost: policy.cost,
                available,
            });
        }

        self.world.stats.points -= policy.cost;
        self.modifiers = self.modifiers.apply_policy_effect(&policy.effect);
        self.unlocked.push(policy.id.clone());
        info!(
            policy = %policy.id,
            cost = policy.cost,
            points_left = self.world.stats.points,
            "policy.enacted"
        );
        Ok(())
    }

    /// Advances one day. Returns `None` without touching anything unless the
    /// simulation is running.
    pub fn tick(&mut self) -> Option<TickSummary> {
        if self.status != SimulationStatus::Running {
            return None;
        }

        let had_infection = self.world.any_infected();
        self.world.bookkeeping = Bookkeeping::default();

        let ctx = SystemContext {
            day: self.world.stats.day + 1,
            modifiers: &self.modifiers,
            params: &self.settings.epidemic,
        };
        let mut system_reports = Vec::with_capacity(self.systems.len());
        for system in self.systems.iter_mut() {
            let mut rng = self.rng.stream(system.name());
            let start = Instant::now();
            system.run(&ctx, &mut self.world, &mut rng);
            system_reports.push(SystemRunReport {
                name: system.name().to_string(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }

        let stats = &mut self.world.stats;
        stats.day += 1;
        let points_gained = if had_infection {
            let base = self.settings.epidemic.points_per_tick as f64;
            (base * self.modifiers.point_generation).floor() as u64
        } else {
            0
        };
        stats.points += points_gained;

        self.status = self.settings.outcome.evaluate(&self.world.stats);
        let stats = self.world.stats();
        debug!(
            day = stats.day,
            infected = stats.total_infected,
            cured = stats.total_cured,
            dead = stats.total_dead,
            points = stats.points,
            "tick"
        );
        if self.status.is_terminal() {
            let report = EndingReport::new(self.status, stats, &self.unlocked);
            info!(
                outcome = ?report.outcome,
                days = report.days,
                survivors = report.survivors,
                casualties = report.casualties,
                "run.finished"
            );
            self.ending = Some(report);
        }

        Some(TickSummary {
            day: self.world.stats.day,
            status: self.status,
            points_gained,
            transitions: self.world.transitions(),
            seeded: self.world.seeded_this_tick().to_vec(),
            system_reports,
        })
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            run: self.settings.run_name.clone(),
            status: self.status,
            difficulty: self.difficulty,
            stats: self.world.stats().clone(),
            modifiers: self.modifiers,
            unlocked_policies: self.unlocked.clone(),
            regions: self.world.regions().to_vec(),
            ending: self.ending.clone(),
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn unlocked_policies(&self) -> &[String] {
        &self.unlocked
    }

    pub fn policies(&self) -> &PolicyCatalog {
        &self.settings.policies
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn ending(&self) -> Option<&EndingReport> {
        self.ending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::RegionRecord;
    use crate::world::{ClimateClass, DensityClass};

    fn pair() -> RegionDataset {
        RegionDataset {
            name: "pair".into(),
            regions: vec![
                RegionRecord {
                    id: "A".into(),
                    name: "Alpha".into(),
                    population: 1_000_000,
                    density: DensityClass::Medium,
                    climate: ClimateClass::Temperate,
                    neighbors: vec!["B".into()],
                },
                RegionRecord {
                    id: "B".into(),
                    name: "Beta".into(),
                    population: 2_000_000,
                    density: DensityClass::Medium,
                    climate: ClimateClass::Temperate,
                    neighbors: vec!["A".into()],
                },
            ],
        }
    }

    fn engine_with_points(points: u64) -> Engine {
        let settings = EngineSettings {
            starting_points: points,
            ..EngineSettings::default()
        };
        Engine::new(settings, pair())
    }

    #[test]
    fn starts_paused_and_refuses_ticks() {
        let mut engine = engine_with_points(50);
        assert_eq!(engine.status(), SimulationStatus::Paused);
        assert!(engine.tick().is_none());
        assert_eq!(engine.world().stats().day, 0);
    }

    #[test]
    fn start_infection_seeds_patient_zero() {
        let mut engine = engine_with_points(50);
        engine
            .apply_command(Command::StartInfection {
                region: "A".into(),
                difficulty: Difficulty::Medium,
            })
            .unwrap();
        let a = engine.world().region(&"A".into()).unwrap();
        assert_eq!(a.infected, 1_000);
        assert_eq!(a.cured, 999_000);
        assert_eq!(engine.status(), SimulationStatus::Running);
        assert_eq!(engine.world().stats().total_infected, 1_000);
    }

    #[test]
    fn unknown_region_is_declined_without_side_effects() {
        let mut engine = engine_with_points(50);
        let before = engine.snapshot();
        assert_eq!(
            engine.start_infection(&"Z".into(), Difficulty::Hard),
            Err(CommandRejection::UnknownRegion("Z".into()))
        );
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn purchases_need_a_running_outbreak() {
        let mut engine = engine_with_points(500);
        assert_eq!(
            engine.purchase_policy("masks"),
            Err(CommandRejection::NotRunning)
        );
        assert_eq!(engine.world().stats().points, 500);
    }

    #[test]
    fn lockdown_debits_points_and_scales_modifiers() {
        let mut engine = engine_with_points(200);
        engine.start_infection(&"A".into(), Difficulty::Medium).unwrap();
        engine.purchase_policy("lockdown").unwrap();
        assert_eq!(engine.world().stats().points, 50);
        assert_eq!(engine.unlocked_policies(), ["lockdown".to_string()]);
        assert_eq!(engine.modifiers().infection_rate, 0.4);
        assert_eq!(engine.modifiers().point_generation, 0.5);
    }

    #[test]
    fn second_purchase_is_rejected_without_charge() {
        let mut engine = engine_with_points(400);
        engine.start_infection(&"A".into(), Difficulty::Medium).unwrap();
        engine.purchase_policy("masks").unwrap();
        let after_first = engine.snapshot();
        assert_eq!(
            engine.purchase_policy("masks"),
            Err(CommandRejection::AlreadyUnlocked("masks".into()))
        );
        assert_eq!(engine.snapshot(), after_first);
    }

    #[test]
    fn insufficient_funds_and_unknown_policy_are_declined() {
        let mut engine = engine_with_points(100);
        engine.start_infection(&"A".into(), Difficulty::Medium).unwrap();
        assert_eq!(
            engine.purchase_policy("vaccine_deploy"),
            Err(CommandRejection::InsufficientFunds {
                cost: 500,
                available: 100
            })
        );
        assert_eq!(
            engine.purchase_policy("prayer"),
            Err(CommandRejection::UnknownPolicy("prayer".into()))
        );
        assert!(engine.unlocked_policies().is_empty());
        assert_eq!(engine.world().stats().points, 100);
    }

    #[test]
    fn modifiers_always_match_a_fresh_derivation() {
        let mut engine = engine_with_points(1_000);
        engine.start_infection(&"B".into(), Difficulty::Hard).unwrap();
        for policy in ["masks", "vaccine_research", "borders_closed", "masks"] {
            let _ = engine.purchase_policy(policy);
        }
        let derived = Modifiers::derive(
            Difficulty::Hard,
            engine.unlocked_policies().iter().map(String::as_str),
            engine.policies(),
        );
        assert_eq!(*engine.modifiers(), derived);
    }

    #[test]
    fn tick_credits_points_while_infected() {
        let mut engine = engine_with_points(0);
        engine.start_infection(&"A".into(), Difficulty::Medium).unwrap();
        let summary = engine.tick().expect("running engine ticks");
        assert_eq!(summary.day, 1);
        assert_eq!(summary.points_gained, 5);
        assert_eq!(engine.world().stats().points, 5);
        assert_eq!(summary.system_reports.len(), 3);
        assert_eq!(summary.system_reports[0].name, "epidemic");
    }

    #[test]
    fn restart_while_running_resets_the_run() {
        let mut engine = engine_with_points(300);
        engine.start_infection(&"A".into(), Difficulty::Medium).unwrap();
        engine.purchase_policy("masks").unwrap();
        for _ in 0..5 {
            engine.tick();
        }
        engine.start_infection(&"B".into(), Difficulty::Easy).unwrap();
        let stats = engine.world().stats();
        assert_eq!(stats.day, 0);
        assert_eq!(stats.points, 300);
        assert_eq!(stats.total_infected, 1_000);
        assert_eq!(engine.world().region(&"A".into()).unwrap().infected, 0);
        assert!(engine.unlocked_policies().is_empty());
        assert_eq!(*engine.modifiers(), Difficulty::Easy.resolve());
    }
}

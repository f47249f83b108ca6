pub mod config;
pub mod engine;
pub mod logging;
pub mod modifiers;
pub mod outcome;
pub mod rng;
pub mod scenario;
pub mod scheduler;
pub mod snapshot;
pub mod systems;
pub mod web;
pub mod world;

pub use config::Config;
pub use engine::{Command, CommandRejection, Engine, EngineBuilder, EngineSettings, TickSummary};
pub use modifiers::{Difficulty, Modifiers, PolicyCatalog};
pub use outcome::{EndingReport, SimulationStatus};
pub use scenario::{RegionDataset, ScenarioLoader};
pub use snapshot::SimulationSnapshot;

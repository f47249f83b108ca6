use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::systems::epidemic::Transitions;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DensityClass {
    Low,
    Medium,
    High,
    #[serde(alias = "VERY HIGH")]
    VeryHigh,
}

impl DensityClass {
    pub fn spread_factor(self) -> f64 {
        match self {
            DensityClass::Low => 0.8,
            DensityClass::Medium => 1.0,
            DensityClass::High => 1.2,
            DensityClass::VeryHigh => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClimateClass {
    Temperate,
    Tropical,
    Arid,
    Cold,
    Various,
}

impl ClimateClass {
    pub fn spread_factor(self) -> f64 {
        match self {
            ClimateClass::Temperate => 1.0,
            ClimateClass::Tropical => 1.2,
            ClimateClass::Arid => 0.9,
            ClimateClass::Cold => 0.7,
            ClimateClass::Various => 1.0,
        }
    }
}

/// Head counts for one region. `cured` is everyone neither infected nor dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub population: u64,
    pub infected: u64,
    pub cured: u64,
    pub dead: u64,
}

impl RegionCounts {
    pub fn is_conserved(&self) -> bool {
        self.infected
            .checked_add(self.cured)
            .and_then(|sum| sum.checked_add(self.dead))
            == Some(self.population)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub population: u64,
    pub infected: u64,
    pub cured: u64,
    pub dead: u64,
    pub density: DensityClass,
    pub climate: ClimateClass,
    pub neighbors: Vec<RegionId>,
}

impl Region {
    pub fn counts(&self) -> RegionCounts {
        RegionCounts {
            population: self.population,
            infected: self.infected,
            cured: self.cured,
            dead: self.dead,
        }
    }

    pub fn set_counts(&mut self, counts: RegionCounts) {
        self.infected = counts.infected;
        self.cured = counts.cured;
        self.dead = counts.dead;
    }

    /// Moves up to `amount` people from the cured pool into infection and
    /// returns how many actually moved.
    pub fn seed(&mut self, amount: u64) -> u64 {
        let seeded = amount.min(self.cured);
        self.cured -= seeded;
        self.infected += seeded;
        seeded
    }

    /// Panics when the head counts no longer add up. A failure here is a
    /// modelling bug, never bad input.
    pub fn assert_invariants(&self) {
        assert!(
            self.counts().is_conserved(),
            "region {} lost people: infected {} + cured {} + dead {} != population {}",
            self.id,
            self.infected,
            self.cured,
            self.dead,
            self.population
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_population: u64,
    pub total_infected: u64,
    pub total_cured: u64,
    pub total_dead: u64,
    pub day: u64,
    pub points: u64,
}

#[derive(Debug, Default, Clone)]
pub struct Bookkeeping {
    pub seeded_this_tick: Vec<RegionId>,
    pub transitions: Transitions,
}

pub struct World {
    regions: Vec<Region>,
    index: HashMap<RegionId, usize>,
    pub(crate) stats: GlobalStats,
    pub(crate) bookkeeping: Bookkeeping,
}

impl World {
    pub fn new(regions: Vec<Region>, starting_points: u64) -> Self {
        let index = regions
            .iter()
            .enumerate()
            .map(|(position, region)| (region.id.clone(), position))
            .collect();
        let mut world = Self {
            regions,
            index,
            stats: GlobalStats {
                points: starting_points,
                ..GlobalStats::default()
            },
            bookkeeping: Bookkeeping::default(),
        };
        world.stats.total_population = world.regions.iter().map(|r| r.population).sum();
        world.recompute_totals();
        world
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub(crate) fn regions_mut(&mut self) -> &mut [Region] {
        &mut self.regions
    }

    pub fn region(&self, id: &RegionId) -> Option<&Region> {
        self.index.get(id).map(|&position| &self.regions[position])
    }

    pub(crate) fn region_mut(&mut self, id: &RegionId) -> Option<&mut Region> {
        match self.index.get(id) {
            Some(&position) => Some(&mut self.regions[position]),
            None => None,
        }
    }

    pub(crate) fn position_of(&self, id: &RegionId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn stats(&self) -> &GlobalStats {
        &self.stats
    }

    pub fn any_infected(&self) -> bool {
        self.regions.iter().any(|region| region.infected > 0)
    }

    /// Regions seeded across a border during the last tick, in seeding order.
    pub fn seeded_this_tick(&self) -> &[RegionId] {
        &self.bookkeeping.seeded_this_tick
    }

    /// Per-region transitions summed over the last tick.
    pub fn transitions(&self) -> Transitions {
        self.bookkeeping.transitions
    }

    pub(crate) fn recompute_totals(&mut self) {
        let (infected, cured, dead) = self.regions.iter().fold((0, 0, 0), |acc, region| {
            (
                acc.0 + region.infected,
                acc.1 + region.cured,
                acc.2 + region.dead,
            )
        });
        self.stats.total_infected = infected;
        self.stats.total_cured = cured;
        self.stats.total_dead = dead;
    }
}

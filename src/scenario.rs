use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::world::{ClimateClass, DensityClass, Region, RegionId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset must define at least one region")]
    Empty,
    #[error("region id {0} defined more than once")]
    DuplicateId(RegionId),
    #[error("region {0} must have a positive population")]
    EmptyRegion(RegionId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: RegionId,
    pub name: String,
    pub population: u64,
    pub density: DensityClass,
    pub climate: ClimateClass,
    #[serde(default)]
    pub neighbors: Vec<RegionId>,
}

/// Static catalog of regions and their adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDataset {
    pub name: String,
    pub regions: Vec<RegionRecord>,
}

impl RegionDataset {
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.regions.is_empty() {
            return Err(DatasetError::Empty);
        }
        let mut known = HashSet::with_capacity(self.regions.len());
        for region in &self.regions {
            if !known.insert(&region.id) {
                return Err(DatasetError::DuplicateId(region.id.clone()));
            }
            if region.population == 0 {
                return Err(DatasetError::EmptyRegion(region.id.clone()));
            }
        }
        Ok(())
    }

    /// Neighbor links that point at nothing (or back at the region itself).
    /// These are tolerated; the spread step simply ignores them.
    pub fn dangling_neighbors(&self) -> Vec<(RegionId, RegionId)> {
        let known: HashSet<&RegionId> = self.regions.iter().map(|r| &r.id).collect();
        let mut dangling = Vec::new();
        for region in &self.regions {
            for neighbor in &region.neighbors {
                if !known.contains(neighbor) || *neighbor == region.id {
                    dangling.push((region.id.clone(), neighbor.clone()));
                }
            }
        }
        dangling
    }

    pub fn total_population(&self) -> u64 {
        self.regions.iter().map(|region| region.population).sum()
    }

    /// Fresh, uninfected regions for a new run.
    pub fn build_regions(&self) -> Vec<Region> {
        self.regions
            .iter()
            .map(|record| Region {
                id: record.id.clone(),
                name: record.name.clone(),
                population: record.population,
                infected: 0,
                cured: record.population,
                dead: 0,
                density: record.density,
                climate: record.climate,
                neighbors: record.neighbors.clone(),
            })
            .collect()
    }

    /// Eight-country map used by the default scenario.
    pub fn world_sample() -> Self {
        fn record(
            id: &str,
            name: &str,
            population: u64,
            density: DensityClass,
            climate: ClimateClass,
            neighbors: &[&str],
        ) -> RegionRecord {
            RegionRecord {
                id: RegionId::from(id),
                name: name.to_string(),
                population,
                density,
                climate,
                neighbors: neighbors.iter().map(|n| RegionId::from(*n)).collect(),
            }
        }

        use ClimateClass::*;
        use DensityClass::*;
        Self {
            name: "world".to_string(),
            regions: vec![
                record("FR", "France", 68_000_000, High, Temperate, &["ZA", "RU", "US"]),
                record("US", "United States", 335_000_000, Medium, Various, &["BR", "FR", "CN"]),
                record("CN", "China", 1_410_000_000, VeryHigh, Various, &["RU", "IN", "AU"]),
                record("BR", "Brazil", 216_000_000, Medium, Tropical, &["US", "ZA"]),
                record("RU", "Russia", 144_000_000, Low, Cold, &["CN", "FR"]),
                record("AU", "Australia", 26_000_000, Low, Arid, &["CN", "IN"]),
                record("IN", "India", 1_430_000_000, VeryHigh, Tropical, &["CN", "AU", "ZA"]),
                record("ZA", "South Africa", 60_000_000, Medium, Arid, &["BR", "FR", "IN"]),
            ],
        }
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<RegionDataset> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read dataset file {}", path.display()))?;
        let dataset: RegionDataset = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        dataset
            .validate()
            .with_context(|| format!("Invalid dataset {}", path.display()))?;
        for (region, neighbor) in dataset.dangling_neighbors() {
            warn!(%region, %neighbor, "dataset.neighbor_unresolved");
        }
        Ok(dataset)
    }
}

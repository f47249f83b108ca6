use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SnapshotConfig;
use crate::modifiers::{Difficulty, Modifiers};
use crate::outcome::{EndingReport, SimulationStatus};
use crate::world::{GlobalStats, Region, RegionId};

/// Read-only view of the engine handed to renderers after every command and
/// every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub run: String,
    pub status: SimulationStatus,
    pub difficulty: Option<Difficulty>,
    pub stats: GlobalStats,
    pub modifiers: Modifiers,
    pub unlocked_policies: Vec<String>,
    pub regions: Vec<Region>,
    #[serde(default)]
    pub ending: Option<EndingReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run: String,
    pub seed: u64,
    pub region: RegionId,
    pub difficulty: Difficulty,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Exports JSON frames for offline renderers. Frames are never read back.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    every_ticks: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, every_ticks: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            every_ticks,
        }
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(&config.output_dir, config.every_ticks)
    }

    pub fn enabled(&self) -> bool {
        self.every_ticks > 0
    }

    fn run_dir(&self, run: &str) -> Result<PathBuf, SnapshotError> {
        let dir = self.output_dir.join(run);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.enabled() {
            return Ok(None);
        }
        let path = self.run_dir(&manifest.run)?.join("manifest.json");
        fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
        Ok(Some(path))
    }

    /// Writes `tick_NNNNNN.json` when the snapshot's day falls on the interval,
    /// and always once the run has been decided.
    pub fn maybe_write(
        &self,
        snapshot: &SimulationSnapshot,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.enabled() {
            return Ok(None);
        }
        let day = snapshot.stats.day;
        let due = day > 0 && day % self.every_ticks == 0;
        if !due && !snapshot.status.is_terminal() {
            return Ok(None);
        }
        let path = self.run_dir(&snapshot.run)?.join(format!("tick_{day:06}.json"));
        fs::write(&path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(Some(path))
    }
}

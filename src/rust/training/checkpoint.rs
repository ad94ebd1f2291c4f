//! Checkpoint directories for the fine-tuned head.
//!
//! ```text
//! <output_dir>/
//!   head.safetensors        final model
//!   checkpoint.json
//!   checkpoint-500/
//!     head.safetensors
//!     checkpoint.json
//!   checkpoint-1000/ ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use candle_nn::VarMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentimentError};
use crate::sentiment::Sentiment;

pub const WEIGHTS_FILE: &str = "head.safetensors";
pub const METADATA_FILE: &str = "checkpoint.json";
const STEP_DIR_PREFIX: &str = "checkpoint-";

/// Describes what a checkpoint contains and which encoder it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Optimizer steps taken when the checkpoint was written
    pub step: usize,
    /// Completed epochs (fractional progress is not recorded)
    pub epoch: usize,
    /// Name of the encoder the head was trained on
    pub encoder: String,
    pub embedding_size: usize,
    /// Class labels by index
    pub labels: Vec<Sentiment>,
    /// Held-out accuracy, when an evaluation had run
    pub accuracy: Option<f64>,
    pub crate_version: String,
}

impl CheckpointMetadata {
    pub fn new(step: usize, epoch: usize, encoder: impl Into<String>, embedding_size: usize) -> Self {
        Self {
            step,
            epoch,
            encoder: encoder.into(),
            embedding_size,
            labels: Sentiment::ALL.to_vec(),
            accuracy: None,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILE);
        let contents = fs::read_to_string(&path).map_err(|e| {
            SentimentError::CheckpointError(format!("Failed to read {:?}: {}", path, e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, dir: &Path) -> Result<()> {
        fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Writes head checkpoints under an output directory and prunes old ones.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    output_dir: PathBuf,
    save_total_limit: Option<usize>,
    /// Steps written by this store, oldest first. Only these are pruned;
    /// directories left behind by other runs are never touched.
    written: Vec<usize>,
}

impl CheckpointStore {
    /// `save_total_limit` caps the number of step checkpoints this store
    /// keeps on disk; `None` keeps all of them. The most recent checkpoint
    /// and the final model are never pruned.
    pub fn new(output_dir: impl Into<PathBuf>, save_total_limit: Option<usize>) -> Self {
        Self {
            output_dir: output_dir.into(),
            save_total_limit,
            written: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `checkpoint-<step>/` and prunes the oldest step checkpoints.
    pub fn save_step(&mut self, varmap: &VarMap, metadata: &CheckpointMetadata) -> Result<PathBuf> {
        let dir = self.step_dir(metadata.step);
        Self::write_dir(&dir, varmap, metadata)?;
        log::info!("Saved checkpoint at step {} to {:?}", metadata.step, dir);
        self.written.retain(|&step| step != metadata.step);
        self.written.push(metadata.step);
        self.prune()?;
        Ok(dir)
    }

    fn step_dir(&self, step: usize) -> PathBuf {
        self.output_dir.join(format!("{}{}", STEP_DIR_PREFIX, step))
    }

    /// Writes the final model into the output directory root.
    pub fn save_final(&self, varmap: &VarMap, metadata: &CheckpointMetadata) -> Result<PathBuf> {
        Self::write_dir(&self.output_dir, varmap, metadata)?;
        log::info!("Saved final model to {:?}", self.output_dir);
        Ok(self.output_dir.clone())
    }

    fn write_dir(dir: &Path, varmap: &VarMap, metadata: &CheckpointMetadata) -> Result<()> {
        fs::create_dir_all(dir)?;
        varmap.save(dir.join(WEIGHTS_FILE))?;
        metadata.write(dir)
    }

    /// Step checkpoints currently on disk, oldest first.
    pub fn list_step_checkpoints(&self) -> Result<Vec<(usize, PathBuf)>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let step = name
                .to_str()
                .and_then(|n| n.strip_prefix(STEP_DIR_PREFIX))
                .and_then(|s| s.parse::<usize>().ok());
            if let Some(step) = step {
                checkpoints.push((step, entry.path()));
            }
        }
        checkpoints.sort_by_key(|(step, _)| *step);
        Ok(checkpoints)
    }

    fn prune(&mut self) -> Result<()> {
        let Some(limit) = self.save_total_limit else {
            return Ok(());
        };
        let excess = self.written.len().saturating_sub(limit.max(1));
        for step in self.written.drain(..excess).collect::<Vec<_>>() {
            let path = self.step_dir(step);
            log::warn!("Removing checkpoint at step {} ({:?})", step, path);
            if path.exists() {
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SentimentHead;
    use candle_core::Device;

    #[test]
    fn test_step_checkpoints_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new(dir.path(), Some(2));
        let varmap = VarMap::new();
        SentimentHead::new_trainable(&varmap, 4, &Device::Cpu).unwrap();

        for step in [10, 20, 30] {
            store
                .save_step(&varmap, &CheckpointMetadata::new(step, 0, "test", 4))
                .unwrap();
        }

        let steps: Vec<usize> = store
            .list_step_checkpoints()
            .unwrap()
            .into_iter()
            .map(|(step, _)| step)
            .collect();
        assert_eq!(steps, vec![20, 30]);
        assert!(!dir.path().join("checkpoint-10").exists());
    }

    #[test]
    fn test_pruning_leaves_other_runs_alone() {
        let dir = tempfile::tempdir().unwrap();
        for stale in ["checkpoint-900", "checkpoint-1000"] {
            fs::create_dir_all(dir.path().join(stale)).unwrap();
        }
        let mut store = CheckpointStore::new(dir.path(), Some(2));
        let varmap = VarMap::new();
        SentimentHead::new_trainable(&varmap, 4, &Device::Cpu).unwrap();

        let saved = store
            .save_step(&varmap, &CheckpointMetadata::new(100, 0, "test", 4))
            .unwrap();
        assert!(saved.join(WEIGHTS_FILE).exists());

        for step in [200, 300] {
            store
                .save_step(&varmap, &CheckpointMetadata::new(step, 0, "test", 4))
                .unwrap();
        }
        let steps: Vec<usize> = store
            .list_step_checkpoints()
            .unwrap()
            .into_iter()
            .map(|(step, _)| step)
            .collect();
        assert_eq!(steps, vec![200, 300, 900, 1000]);
    }

    #[test]
    fn test_zero_limit_keeps_latest_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new(dir.path(), Some(0));
        let varmap = VarMap::new();
        SentimentHead::new_trainable(&varmap, 4, &Device::Cpu).unwrap();

        for step in [10, 20] {
            let saved = store
                .save_step(&varmap, &CheckpointMetadata::new(step, 0, "test", 4))
                .unwrap();
            assert!(saved.join(METADATA_FILE).exists());
        }
        assert!(!dir.path().join("checkpoint-10").exists());
    }

    #[test]
    fn test_final_model_round_trips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("model"), None);
        let varmap = VarMap::new();
        SentimentHead::new_trainable(&varmap, 4, &Device::Cpu).unwrap();

        let mut metadata = CheckpointMetadata::new(42, 2, "minilm", 4);
        metadata.accuracy = Some(0.9);
        let saved = store.save_final(&varmap, &metadata).unwrap();

        assert!(saved.join(WEIGHTS_FILE).exists());
        assert_eq!(CheckpointMetadata::read(&saved).unwrap(), metadata);
        assert!(store.list_step_checkpoints().unwrap().is_empty());
    }

    #[test]
    fn test_missing_metadata() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CheckpointMetadata::read(dir.path()),
            Err(SentimentError::CheckpointError(_))
        ));
    }
}

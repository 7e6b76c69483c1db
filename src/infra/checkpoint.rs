// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists the best model of a run and the configuration needed
// to rebuild it.
//
//   checkpoints/
//     model.mpk           ← best weights so far (overwritten)
//     train_config.json   ← hyperparameters + vocabulary size
//
// Weights go through Burn's NamedMpkFileRecorder with full
// precision, so a reloaded model reproduces the saved model's
// forward pass bit for bit. The recorder adds the extension.
//
// The positional table and the subsequent mask are constants,
// not parameters: they are rebuilt from the config and are not
// part of the record.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::NgramTransformer;

const MODEL_FILE:  &str = "model";
const CONFIG_FILE: &str = "train_config.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
    }

    /// Path of the weights file as written by the recorder.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE).with_extension("mpk")
    }

    /// Overwrite the checkpoint with `model`'s current weights.
    pub fn save_model<B: Backend>(&self, model: &NgramTransformer<B>) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);

        Self::recorder()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        tracing::debug!("Saved checkpoint '{}'", self.checkpoint_path().display());
        Ok(())
    }

    /// Load the saved weights into `model`, which must have the same
    /// architecture as the one that was saved.
    pub fn load_model<B: Backend>(
        &self,
        model:  NgramTransformer<B>,
        device: &B::Device,
    ) -> Result<NgramTransformer<B>> {
        let path = self.dir.join(MODEL_FILE);

        let record = Self::recorder()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Has a training run saved one?",
                    self.checkpoint_path().display())
            })?;

        tracing::info!("Loaded checkpoint '{}'", self.checkpoint_path().display());
        Ok(model.load_record(record))
    }

    /// Delete the weights file if one exists. Called when a run starts, so a
    /// run that never improves cannot be scored with another run's weights.
    pub fn discard_model(&self) -> Result<()> {
        let path = self.checkpoint_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed previous checkpoint '{}'", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Cannot remove '{}'", path.display())),
        }
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'evaluate'.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }
}

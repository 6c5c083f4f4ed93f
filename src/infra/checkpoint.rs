// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores everything a run leaves in output_dir,
// using Burn's CompactRecorder for tensors and JSON for the
// rest.
//
//   output_dir/
//     model.mpk             final weights
//     config.json           architecture, BART keys
//     trainer_state.json    step counter + log history
//     training_args.json    every option of the run
//     checkpoint-500/
//       model.mpk
//       optimizer.mpk       AdamW moments
//       trainer_state.json
//       config.json
//     checkpoint-1000/
//       ...
//
// At most `save_total_limit` checkpoint directories are kept;
// the one with the lowest step is deleted first. A checkpoint
// directory is also a valid pretrained model source, so a run
// can start from one.
//
// CompactRecorder appends `.mpk` itself, so paths handed to it
// are stems without extension.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Record, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::cli::RunArguments;
use crate::domain::traits::Metrics;
use crate::infra::json;
use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};

pub const CHECKPOINT_PREFIX:  &str = "checkpoint-";
pub const WEIGHTS_FILE:       &str = "model.mpk";
pub const CONFIG_FILE:        &str = "config.json";
pub const STATE_FILE:         &str = "trainer_state.json";
pub const TRAINING_ARGS_FILE: &str = "training_args.json";

const MODEL_STEM:     &str = "model";
const OPTIMIZER_STEM: &str = "optimizer";

/// Progress of a training run, persisted next to every checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub global_step:      usize,
    pub epoch:            f64,
    pub max_steps:        usize,
    pub num_train_epochs: usize,
    pub train_batch_size: usize,
    /// One entry per logging step
    pub log_history:      Vec<Metrics>,
}

pub struct CheckpointManager {
    /// The run's output directory
    dir:              PathBuf,
    save_total_limit: usize,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>, save_total_limit: usize) -> Self {
        Self { dir: dir.into(), save_total_limit }
    }

    pub fn output_dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_dir(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{CHECKPOINT_PREFIX}{step}"))
    }

    /// Write `checkpoint-{step}/` and drop the oldest ones beyond
    /// the limit. Returns the new directory.
    pub fn save_checkpoint<B: Backend, O: Record<B>>(
        &self,
        model:     &Seq2SeqModel<B>,
        config:    &Seq2SeqConfig,
        optimizer: O,
        state:     &TrainerState,
    ) -> Result<PathBuf> {
        let dir = self.checkpoint_dir(state.global_step);
        save_model(&dir, model, config)?;

        let path = dir.join(OPTIMIZER_STEM);
        <CompactRecorder as Recorder<B>>::record(&CompactRecorder::new(), optimizer, path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", path.display()))?;

        save_state(&dir, state)?;
        tracing::info!("Saved checkpoint '{}'", dir.display());

        self.rotate()?;
        Ok(dir)
    }

    /// Checkpoint directories sorted by step, oldest first.
    pub fn list_checkpoints(&self) -> Result<Vec<(usize, PathBuf)>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot list '{}'", self.dir.display()))?
        {
            let entry = entry?;
            let name  = entry.file_name();
            let step  = name
                .to_str()
                .and_then(|n| n.strip_prefix(CHECKPOINT_PREFIX))
                .and_then(|s| s.parse::<usize>().ok());
            if let (Some(step), true) = (step, entry.path().is_dir()) {
                found.push((step, entry.path()));
            }
        }
        found.sort_by_key(|(step, _)| *step);
        Ok(found)
    }

    pub fn latest_checkpoint(&self) -> Result<Option<PathBuf>> {
        Ok(self.list_checkpoints()?.pop().map(|(_, path)| path))
    }

    /// Delete the oldest checkpoints until at most
    /// `save_total_limit` remain.
    pub fn rotate(&self) -> Result<()> {
        let checkpoints = self.list_checkpoints()?;
        let excess = checkpoints.len().saturating_sub(self.save_total_limit);
        for (_, path) in checkpoints.into_iter().take(excess) {
            fs::remove_dir_all(&path)
                .with_context(|| format!("Cannot delete old checkpoint '{}'", path.display()))?;
            tracing::debug!("Deleted checkpoint '{}'", path.display());
        }
        Ok(())
    }

    pub fn save_training_args(&self, args: &RunArguments) -> Result<()> {
        json::write_pretty(&self.dir.join(TRAINING_ARGS_FILE), args)
    }
}

// ─── Free functions ───────────────────────────────────────────────────────────
/// Weights as `{dir}/model.mpk` plus `{dir}/config.json`.
pub fn save_model<B: Backend>(dir: &Path, model: &Seq2SeqModel<B>, config: &Seq2SeqConfig) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;

    let path = dir.join(MODEL_STEM);
    CompactRecorder::new()
        .record(model.clone().into_record(), path.clone())
        .with_context(|| format!("Failed to save model to '{}'", path.display()))?;

    json::write_pretty(&dir.join(CONFIG_FILE), config)
}

/// Load `{dir}/model.mpk` into a model of matching architecture.
pub fn load_model<B: Backend>(
    dir:    &Path,
    model:  Seq2SeqModel<B>,
    device: &B::Device,
) -> Result<Seq2SeqModel<B>> {
    let path = dir.join(MODEL_STEM);
    let record = CompactRecorder::new()
        .load(path.clone(), device)
        .with_context(|| format!("Cannot load model weights '{}'", path.display()))?;
    Ok(model.load_record(record))
}

pub fn load_optimizer<B: Backend, O: Record<B>>(dir: &Path, device: &B::Device) -> Result<O> {
    let path = dir.join(OPTIMIZER_STEM);
    <CompactRecorder as Recorder<B>>::load(&CompactRecorder::new(), path.clone(), device)
        .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))
}

pub fn save_state(dir: &Path, state: &TrainerState) -> Result<()> {
    json::write_pretty(&dir.join(STATE_FILE), state)
}

pub fn load_state(dir: &Path) -> Result<TrainerState> {
    json::read(&dir.join(STATE_FILE))
}

// ============================================================
// Layer 1: Option Structs
// ============================================================
// The three groups of options a run is configured with:
//
//   ModelArguments     which pretrained model/config/tokenizer
//   DataArguments      dataset location, subsampling, lengths
//   TrainingArguments  output directory, phases, optimiser
//
// Every field is a --flag (kebab-case) and a JSON config key
// (snake_case). Defaults live in constants so the clap
// definitions and the Default impls cannot drift apart.
// Boolean options take `--flag`, `--flag true` or `--flag false`.

use clap::{ArgAction, Args};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::PipelineError;

pub const DEFAULT_MODEL_NAME:        &str  = "facebook/bart-base";
pub const DEFAULT_DATASET_DIR:       &str  = "data/paper_tagging";
pub const DEFAULT_MAX_SOURCE_LENGTH: usize = 512;
pub const DEFAULT_MAX_TARGET_LENGTH: usize = 64;
pub const DEFAULT_NUM_BEAMS:         usize = 4;
pub const DEFAULT_OUTPUT_DIR:        &str  = "outputs";
pub const DEFAULT_BATCH_SIZE:        usize = 8;
pub const DEFAULT_LEARNING_RATE:     f64   = 5e-5;
pub const DEFAULT_MAX_GRAD_NORM:     f64   = 1.0;
pub const DEFAULT_EPOCHS:            usize = 3;
pub const DEFAULT_LOGGING_STEPS:     usize = 500;
pub const DEFAULT_SAVE_STEPS:        usize = 500;
pub const DEFAULT_SAVE_TOTAL_LIMIT:  usize = 10;
pub const DEFAULT_SEED:              u64   = 42;
pub const DEFAULT_LOG_LEVEL:         &str  = "info";

// ─── ModelArguments ───────────────────────────────────────────────────────────
/// Which model, config and tokenizer to fine-tune from.
#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArguments {
    /// Path to a pretrained model directory or a model identifier on huggingface.co/models
    #[arg(long, default_value = DEFAULT_MODEL_NAME)]
    pub model_name_or_path: String,

    /// Pretrained config name or path if not the same as model_name_or_path
    #[arg(long)]
    pub config_name: Option<String>,

    /// Pretrained tokenizer name or path if not the same as model_name_or_path
    #[arg(long)]
    pub tokenizer_name: Option<String>,

    /// Where to cache files downloaded from the hub
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Start from seeded random weights when the model source has no burn weights
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub init_from_scratch: bool,
}

impl Default for ModelArguments {
    fn default() -> Self {
        Self {
            model_name_or_path: DEFAULT_MODEL_NAME.to_string(),
            config_name:        None,
            tokenizer_name:     None,
            cache_dir:          None,
            init_from_scratch:  false,
        }
    }
}

impl ModelArguments {
    /// Source for `config.json`.
    pub fn config_source(&self) -> &str {
        self.config_name.as_deref().unwrap_or(&self.model_name_or_path)
    }

    /// Source for `tokenizer.json`.
    pub fn tokenizer_source(&self) -> &str {
        self.tokenizer_name.as_deref().unwrap_or(&self.model_name_or_path)
    }
}

// ─── DataArguments ────────────────────────────────────────────────────────────
/// Dataset location and how records are cut down and tokenised.
#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArguments {
    /// Directory holding train.jsonl, dev.jsonl and test.jsonl
    #[arg(long, default_value = DEFAULT_DATASET_DIR)]
    pub dataset_dir: PathBuf,

    /// Fraction of the train split to keep, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    pub train_subsample_ratio: f64,

    /// Fraction of the dev split to keep, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    pub valid_subsample_ratio: f64,

    /// Maximum number of input tokens (title + abstract)
    #[arg(long, default_value_t = DEFAULT_MAX_SOURCE_LENGTH)]
    pub max_source_length: usize,

    /// Maximum number of generated tokens
    #[arg(long, default_value_t = DEFAULT_MAX_TARGET_LENGTH)]
    pub max_target_length: usize,

    /// Pad every input to max_source_length
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = true, default_missing_value = "true")]
    pub padding: bool,

    /// Truncate inputs longer than max_source_length
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = true, default_missing_value = "true")]
    pub truncation: bool,

    /// Beam width used when generating
    #[arg(long, default_value_t = DEFAULT_NUM_BEAMS)]
    pub num_beams: usize,
}

impl Default for DataArguments {
    fn default() -> Self {
        Self {
            dataset_dir:           PathBuf::from(DEFAULT_DATASET_DIR),
            train_subsample_ratio: 1.0,
            valid_subsample_ratio: 1.0,
            max_source_length:     DEFAULT_MAX_SOURCE_LENGTH,
            max_target_length:     DEFAULT_MAX_TARGET_LENGTH,
            padding:               true,
            truncation:            true,
            num_beams:             DEFAULT_NUM_BEAMS,
        }
    }
}

impl DataArguments {
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_ratio("train_subsample_ratio", self.train_subsample_ratio)?;
        check_ratio("valid_subsample_ratio", self.valid_subsample_ratio)?;
        check_positive("max_source_length", self.max_source_length)?;
        check_positive("max_target_length", self.max_target_length)?;
        check_positive("num_beams", self.num_beams)?;
        Ok(())
    }
}

// ─── TrainingArguments ────────────────────────────────────────────────────────
/// Phases to run, where to write results, and optimiser settings.
#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArguments {
    /// Directory for checkpoints, metrics, logs and predictions
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Train into a non-empty output directory without resuming from it
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub overwrite_output_dir: bool,

    /// Run training on the train split
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub do_train: bool,

    /// Run evaluation on the dev split
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub do_eval: bool,

    /// Write predictions for the test split
    #[arg(long, action = ArgAction::Set, num_args = 0..=1,
          default_value_t = false, default_missing_value = "true")]
    pub do_predict: bool,

    /// Batch size for training
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub per_device_train_batch_size: usize,

    /// Batch size for evaluation and prediction
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub per_device_eval_batch_size: usize,

    /// Peak learning rate for AdamW
    #[arg(long, default_value_t = DEFAULT_LEARNING_RATE)]
    pub learning_rate: f64,

    /// AdamW weight decay
    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    /// Gradient norm clipping threshold
    #[arg(long, default_value_t = DEFAULT_MAX_GRAD_NORM)]
    pub max_grad_norm: f64,

    /// Number of passes over the train split
    #[arg(long, default_value_t = DEFAULT_EPOCHS)]
    pub num_train_epochs: usize,

    /// Linear warmup steps before the learning rate decays
    #[arg(long, default_value_t = 0)]
    pub warmup_steps: usize,

    /// Log the running loss every N optimiser steps
    #[arg(long, default_value_t = DEFAULT_LOGGING_STEPS)]
    pub logging_steps: usize,

    /// Write a checkpoint every N optimiser steps (0 disables)
    #[arg(long, default_value_t = DEFAULT_SAVE_STEPS)]
    pub save_steps: usize,

    /// Keep at most this many checkpoints, deleting the oldest
    #[arg(long, default_value_t = DEFAULT_SAVE_TOTAL_LIMIT)]
    pub save_total_limit: usize,

    /// Seed for weight init and data shuffling
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Checkpoint directory to continue training from
    #[arg(long)]
    pub resume_from_checkpoint: Option<PathBuf>,

    /// Default log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Default for TrainingArguments {
    fn default() -> Self {
        Self {
            output_dir:                  PathBuf::from(DEFAULT_OUTPUT_DIR),
            overwrite_output_dir:        false,
            do_train:                    false,
            do_eval:                     false,
            do_predict:                  false,
            per_device_train_batch_size: DEFAULT_BATCH_SIZE,
            per_device_eval_batch_size:  DEFAULT_BATCH_SIZE,
            learning_rate:               DEFAULT_LEARNING_RATE,
            weight_decay:                0.0,
            max_grad_norm:               DEFAULT_MAX_GRAD_NORM,
            num_train_epochs:            DEFAULT_EPOCHS,
            warmup_steps:                0,
            logging_steps:               DEFAULT_LOGGING_STEPS,
            save_steps:                  DEFAULT_SAVE_STEPS,
            save_total_limit:            DEFAULT_SAVE_TOTAL_LIMIT,
            seed:                        DEFAULT_SEED,
            resume_from_checkpoint:      None,
            log_level:                   DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl TrainingArguments {
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_positive("per_device_train_batch_size", self.per_device_train_batch_size)?;
        check_positive("per_device_eval_batch_size", self.per_device_eval_batch_size)?;
        check_positive("num_train_epochs", self.num_train_epochs)?;
        check_positive("logging_steps", self.logging_steps)?;
        check_positive("save_total_limit", self.save_total_limit)?;
        check_non_negative("learning_rate", self.learning_rate)?;
        check_non_negative("weight_decay", self.weight_decay)?;
        check_non_negative("max_grad_norm", self.max_grad_norm)?;
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|e| PipelineError::configuration(Some("log_level"), e.to_string()))?;
        Ok(())
    }

    /// True when at least one phase is enabled.
    pub fn any_phase(&self) -> bool {
        self.do_train || self.do_eval || self.do_predict
    }
}

// ─── Validation helpers ───────────────────────────────────────────────────────
fn check_ratio(field: &str, value: f64) -> Result<(), PipelineError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(PipelineError::configuration(
            Some(field),
            format!("must be in (0, 1], got {value}"),
        ))
    }
}

fn check_positive(field: &str, value: usize) -> Result<(), PipelineError> {
    if value == 0 {
        return Err(PipelineError::configuration(Some(field), "must be at least 1"));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<(), PipelineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::configuration(
            Some(field),
            format!("must be a finite value >= 0, got {value}"),
        ));
    }
    Ok(())
}

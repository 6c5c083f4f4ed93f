// ============================================================
// Layer 3: Core Traits
// ============================================================
// The orchestrator talks to two collaborators only through the
// traits below:
//
//   ExampleSource  where the paper records come from
//   Trainable      the training framework (train / evaluate /
//                  predict as blocking calls)
//
// Application code never names Burn types, so the whole run
// can be exercised in tests with a recording trainer.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::domain::error::PipelineError;
use crate::domain::record::{Example, TokenizedRecord};

/// Metric name → value. Sorted so persisted files are stable.
pub type Metrics = BTreeMap<String, f64>;

// ─── Split ────────────────────────────────────────────────────────────────────
/// The three disjoint partitions of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev   => "dev",
            Split::Test  => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can hand out the records of one split.
pub trait ExampleSource {
    fn load_split(&self, split: Split) -> std::result::Result<Vec<Example>, PipelineError>;
}

// ─── Generation ───────────────────────────────────────────────────────────────
/// Constraints applied whenever the model generates text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Maximum number of generated tokens (decoder start excluded)
    pub max_length: usize,
    /// Beam width; 1 is greedy decoding
    pub num_beams: usize,
    /// Exponent applied to hypothesis length when ranking beams
    pub length_penalty: f32,
}

impl GenerationConfig {
    pub fn new(max_length: usize, num_beams: usize) -> Self {
        Self { max_length, num_beams, length_penalty: 1.0 }
    }
}

/// Special token ids the pipeline needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad: u32,
    pub bos: u32,
    pub eos: u32,
    pub decoder_start: u32,
}

impl SpecialTokens {
    pub fn is_special(&self, id: u32) -> bool {
        id == self.pad || id == self.bos || id == self.eos || id == self.decoder_start
    }
}

// ─── Trainable ────────────────────────────────────────────────────────────────
/// Result of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub global_step:   usize,
    pub training_loss: f64,
    pub metrics:       Metrics,
}

/// Generated token sequences, one per input record, in input order.
#[derive(Debug, Clone)]
pub struct PredictionOutput {
    pub sequences: Vec<Vec<u32>>,
    pub metrics:   Metrics,
}

/// The training framework seen as a black box.
///
/// All calls block until the work finishes or fails. Errors are
/// opaque to the caller, which treats them as fatal.
pub trait Trainable {
    /// Fit the model on `dataset`, optionally continuing from a
    /// checkpoint directory written by an earlier run.
    fn train(&mut self, dataset: Vec<TokenizedRecord>, resume_from: Option<&Path>) -> Result<TrainOutput>;

    /// Teacher-forced loss plus generation-based metrics.
    fn evaluate(&mut self, dataset: Vec<TokenizedRecord>, generation: &GenerationConfig) -> Result<Metrics>;

    /// Generate one sequence per record.
    fn predict(&mut self, dataset: Vec<TokenizedRecord>, generation: &GenerationConfig) -> Result<PredictionOutput>;

    /// Persist the current weights to the output directory.
    fn save_model(&self) -> Result<()>;

    /// Persist whatever is needed to resume training later.
    fn save_state(&self) -> Result<()>;
}

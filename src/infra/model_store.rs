// ============================================================
// Layer 6: Model Store
// ============================================================
// Resolves a pretrained model source to files on disk.
//
// A source is either a local directory or a Hugging Face Hub
// repo id (downloaded into the hub cache, or `--cache-dir`).
// Three files are looked up:
//
//   config.json      required, BART-style keys
//   tokenizer.json   required
//   model.mpk        burn weights, as written by a previous run
//                    or any of its checkpoint-N directories
//
// A source without burn weights is a ResourceError unless
// `--init-from-scratch` asks for a seeded random init.
//
// `config_name` and `tokenizer_name` override where the first
// two come from; weights always come from model_name_or_path.

use hf_hub::api::sync::{Api, ApiBuilder};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::cli::arguments::ModelArguments;
use crate::domain::error::PipelineError;
use crate::infra::checkpoint::{CONFIG_FILE, WEIGHTS_FILE};
use crate::ml::model::Seq2SeqConfig;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Everything needed to build the model and preprocess data.
pub struct ResolvedModel {
    pub config:      Seq2SeqConfig,
    pub tokenizer:   Tokenizer,
    /// Directory holding `model.mpk`; None only for a scratch init
    pub weights_dir: Option<PathBuf>,
}

pub struct ModelStore {
    cache_dir: Option<PathBuf>,
}

impl ModelStore {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }

    pub fn resolve(&self, args: &ModelArguments) -> Result<ResolvedModel, PipelineError> {
        let config_path = self.fetch(args.config_source(), CONFIG_FILE)?;
        let config_text = std::fs::read_to_string(&config_path)
            .map_err(|e| PipelineError::resource("model config", format!("'{}': {e}", config_path.display())))?;
        let config: Seq2SeqConfig = serde_json::from_str(&config_text)
            .map_err(|e| PipelineError::resource("model config", format!("'{}': {e}", config_path.display())))?;

        let tokenizer_path = self.fetch(args.tokenizer_source(), TOKENIZER_FILE)?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| PipelineError::resource("tokenizer", format!("'{}': {e}", tokenizer_path.display())))?;

        let weights_dir = match self.find_weights(&args.model_name_or_path) {
            Some(dir) => {
                tracing::info!("Pretrained weights found in '{}'", dir.display());
                Some(dir)
            }
            None if args.init_from_scratch => {
                tracing::warn!(
                    "No {} in '{}'; initialising from the seed",
                    WEIGHTS_FILE, args.model_name_or_path
                );
                None
            }
            None => {
                return Err(PipelineError::resource(
                    format!("'{}'", args.model_name_or_path),
                    format!("no {WEIGHTS_FILE} to load; pass --init-from-scratch to train from a random init"),
                ))
            }
        };

        tracing::info!(
            "Model config: d_model={} layers={}/{} vocab={}",
            config.d_model, config.encoder_layers, config.decoder_layers, config.vocab_size,
        );
        Ok(ResolvedModel { config, tokenizer, weights_dir })
    }

    /// Path of `file` inside a local directory or a hub repo.
    fn fetch(&self, source: &str, file: &str) -> Result<PathBuf, PipelineError> {
        let local = Path::new(source);
        if local.is_dir() {
            let path = local.join(file);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(PipelineError::resource(
                    format!("'{source}'"),
                    format!("{file} not found in local directory"),
                ))
            };
        }

        tracing::info!("Fetching {} from the hub repo '{}'", file, source);
        self.hub()?
            .model(source.to_string())
            .get(file)
            .map_err(|e| PipelineError::resource(format!("'{source}'"), format!("cannot download {file}: {e}")))
    }

    fn find_weights(&self, source: &str) -> Option<PathBuf> {
        let local = Path::new(source);
        if local.is_dir() {
            return local.join(WEIGHTS_FILE).is_file().then(|| local.to_path_buf());
        }
        let api = self.hub().ok()?;
        match api.model(source.to_string()).get(WEIGHTS_FILE) {
            Ok(path) => path.parent().map(Path::to_path_buf),
            Err(e) => {
                tracing::debug!("No {} in '{}': {}", WEIGHTS_FILE, source, e);
                None
            }
        }
    }

    fn hub(&self) -> Result<Api, PipelineError> {
        let mut builder = ApiBuilder::new();
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        builder
            .build()
            .map_err(|e| PipelineError::resource("hub client", e))
    }
}

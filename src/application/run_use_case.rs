// ============================================================
// Layer 2: RunUseCase
// ============================================================
// Orchestrates one run, phases in a fixed order:
//
//   Step 1: Resolve config / tokenizer / weights   (Layer 6 - infra)
//   Step 2: Check the dataset directory            (Layer 4 - data)
//   Step 3: Build the trainer, seeded              (Layer 5 - ml)
//   Step 4: train   → train_results.json, model, tokenizer, state
//   Step 5: eval    → eval_results.json
//   Step 6: predict → predictions.json, predict_results.json
//
// Steps 4-6 each run only when their --do-* flag is set. Any
// failure aborts the run; nothing is retried.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::cli::arguments::TrainingArguments;
use crate::cli::RunArguments;
use crate::data::{loader::JsonlLoader, preprocessor::Preprocessor, subsample::select_prefix};
use crate::domain::error::PipelineError;
use crate::domain::traits::{ExampleSource, GenerationConfig, SpecialTokens, Split, Trainable};
use crate::infra::{
    checkpoint::CheckpointManager,
    logging::LOG_FILE,
    metrics::{log_metrics, save_metrics},
    model_store::{ModelStore, TOKENIZER_FILE},
    predictions::write_predictions,
};
use crate::ml::trainer::{BurnTrainer, TrainBackend};

pub struct RunUseCase {
    args: RunArguments,
}

impl RunUseCase {
    pub fn new(args: RunArguments) -> Self {
        Self { args }
    }

    pub fn execute(&self) -> Result<()> {
        let args = &self.args;
        if !args.training.any_phase() {
            tracing::warn!("Nothing to do: pass --do-train, --do-eval or --do-predict");
            return Ok(());
        }

        // ── Step 1: Pretrained sources ────────────────────────────────────────
        let resolved = ModelStore::new(args.model.cache_dir.clone()).resolve(&args.model)?;
        let special  = resolved.config.special_tokens();

        // ── Step 2: Dataset ───────────────────────────────────────────────────
        let loader = JsonlLoader::new(&args.data.dataset_dir);
        loader.ensure_exists()?;
        tracing::info!("Dataset directory: '{}'", loader.dir().display());

        // ── Step 3: Trainer ───────────────────────────────────────────────────
        let device = burn::backend::wgpu::WgpuDevice::default();
        let mut trainer = BurnTrainer::<TrainBackend>::new(
            resolved.config,
            resolved.weights_dir.as_deref(),
            &args.training,
            device,
        )?;

        run_phases(args, &resolved.tokenizer, &special, &loader, &mut trainer)
    }
}

/// Steps 4-6, against any trainer and any example source.
pub fn run_phases<T: Trainable, S: ExampleSource>(
    args:      &RunArguments,
    tokenizer: &Tokenizer,
    special:   &SpecialTokens,
    source:    &S,
    trainer:   &mut T,
) -> Result<()> {
    let data       = &args.data;
    let training   = &args.training;
    let output_dir = training.output_dir.as_path();

    let preprocessor = Preprocessor::new(tokenizer, data, special)?;
    let generation   = GenerationConfig::new(data.max_target_length, data.num_beams);

    // ── Step 4: Train ─────────────────────────────────────────────────────────
    if training.do_train {
        let resume = resume_point(training)?;

        let examples = select_prefix(source.load_split(Split::Train)?, data.train_subsample_ratio);
        let records  = preprocessor.preprocess_labelled(&examples)?;

        CheckpointManager::new(output_dir, training.save_total_limit).save_training_args(args)?;

        let output = trainer
            .train(records, resume.as_deref())
            .map_err(|e| PipelineError::delegated("training", e))?;
        tracing::info!(
            "Finished after {} steps, training loss {:.4}",
            output.global_step, output.training_loss,
        );

        let mut metrics = output.metrics;
        metrics.insert("train_samples".into(), examples.len() as f64);
        log_metrics("train", &metrics);
        save_metrics(output_dir, "train", &metrics)?;

        trainer.save_model().map_err(|e| PipelineError::delegated("model save", e))?;
        trainer.save_state().map_err(|e| PipelineError::delegated("state save", e))?;
        tokenizer
            .save(output_dir.join(TOKENIZER_FILE), false)
            .map_err(|e| PipelineError::delegated("tokenizer save", e))?;
    }

    // ── Step 5: Evaluate ──────────────────────────────────────────────────────
    if training.do_eval {
        let examples = select_prefix(source.load_split(Split::Dev)?, data.valid_subsample_ratio);
        let records  = preprocessor.preprocess_labelled(&examples)?;

        let mut metrics = trainer
            .evaluate(records, &generation)
            .map_err(|e| PipelineError::delegated("evaluation", e))?;
        metrics.insert("eval_samples".into(), examples.len() as f64);
        log_metrics("eval", &metrics);
        save_metrics(output_dir, "eval", &metrics)?;
    }

    // ── Step 6: Predict ───────────────────────────────────────────────────────
    if training.do_predict {
        let examples = source.load_split(Split::Test)?;
        let records  = preprocessor.preprocess_unlabelled(&examples)?;
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let output = trainer
            .predict(records, &generation)
            .map_err(|e| PipelineError::delegated("prediction", e))?;

        let texts = output
            .sequences
            .iter()
            .map(|seq| tokenizer.decode(seq, true).map(|t| t.trim().to_string()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::delegated("decoding", e))?;
        write_predictions(output_dir, &ids, &texts)?;

        let mut metrics = output.metrics;
        metrics.insert("predict_samples".into(), examples.len() as f64);
        log_metrics("predict", &metrics);
        save_metrics(output_dir, "predict", &metrics)?;
    }

    Ok(())
}

/// Where training continues from, if anywhere.
///
/// An explicit --resume-from-checkpoint wins. Otherwise a
/// non-empty output directory must either hold a checkpoint to
/// resume from or be opened with --overwrite-output-dir.
fn resume_point(training: &TrainingArguments) -> Result<Option<PathBuf>, PipelineError> {
    if let Some(dir) = &training.resume_from_checkpoint {
        if !dir.is_dir() {
            return Err(PipelineError::resource(
                "checkpoint",
                format!("'{}' is not a directory", dir.display()),
            ));
        }
        return Ok(Some(dir.clone()));
    }

    if training.overwrite_output_dir || !holds_previous_run(&training.output_dir) {
        return Ok(None);
    }

    let checkpoints = CheckpointManager::new(&training.output_dir, training.save_total_limit);
    match checkpoints
        .latest_checkpoint()
        .map_err(|e| PipelineError::resource("output directory", e))?
    {
        Some(dir) => {
            tracing::info!("Found '{}'; resuming training from it", dir.display());
            Ok(Some(dir))
        }
        None => Err(PipelineError::configuration(
            Some("output_dir"),
            format!(
                "'{}' already exists and is not empty; use --overwrite-output-dir to train into it",
                training.output_dir.display()
            ),
        )),
    }
}

/// Anything besides this run's own log file counts.
fn holds_previous_run(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).any(|e| e.file_name() != LOG_FILE))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    use crate::domain::record::{Example, TokenizedRecord};
    use crate::domain::traits::{Metrics, PredictionOutput, TrainOutput};
    use crate::testing::{word_level_tokenizer, SPECIAL};

    // ─── Doubles ──────────────────────────────────────────────────────────────
    #[derive(Default)]
    struct RecordingTrainer {
        calls:       Vec<&'static str>,
        train_ids:   Vec<String>,
        resume:      Option<PathBuf>,
        eval_ids:    Vec<String>,
        generation:  Option<GenerationConfig>,
        predictions: Vec<Vec<u32>>,
        fail_train:  bool,
    }

    impl Trainable for RecordingTrainer {
        fn train(&mut self, dataset: Vec<TokenizedRecord>, resume_from: Option<&Path>) -> Result<TrainOutput> {
            self.calls.push("train");
            if self.fail_train {
                bail!("device lost");
            }
            self.train_ids = dataset.into_iter().map(|r| r.id).collect();
            self.resume = resume_from.map(Path::to_path_buf);
            Ok(TrainOutput {
                global_step:   3,
                training_loss: 0.5,
                metrics:       Metrics::from([("train_loss".to_string(), 0.5)]),
            })
        }

        fn evaluate(&mut self, dataset: Vec<TokenizedRecord>, generation: &GenerationConfig) -> Result<Metrics> {
            self.calls.push("evaluate");
            self.eval_ids = dataset.into_iter().map(|r| r.id).collect();
            self.generation = Some(*generation);
            Ok(Metrics::from([("eval_loss".to_string(), 1.25)]))
        }

        fn predict(&mut self, dataset: Vec<TokenizedRecord>, _: &GenerationConfig) -> Result<PredictionOutput> {
            self.calls.push("predict");
            assert!(dataset.iter().all(|r| r.labels == vec![SPECIAL.bos]));
            Ok(PredictionOutput { sequences: self.predictions.clone(), metrics: Metrics::new() })
        }

        fn save_model(&self) -> Result<()> {
            Ok(())
        }

        fn save_state(&self) -> Result<()> {
            Ok(())
        }
    }

    struct InMemorySource {
        train: Vec<Example>,
        dev:   Vec<Example>,
        test:  Vec<Example>,
    }

    impl ExampleSource for InMemorySource {
        fn load_split(&self, split: Split) -> Result<Vec<Example>, PipelineError> {
            Ok(match split {
                Split::Train => self.train.clone(),
                Split::Dev   => self.dev.clone(),
                Split::Test  => self.test.clone(),
            })
        }
    }

    fn source() -> InMemorySource {
        let labelled = |i: usize| Example::new("A", "B", "cv", "image-classification", i.to_string());
        InMemorySource {
            train: (0..10).map(labelled).collect(),
            dev:   (100..104).map(labelled).collect(),
            test:  vec![
                Example::new("A", "B", "cv", "image-classification", "1"),
                Example::new("deep learning", "a study of images", "nlp", "text-summarization", "2"),
            ],
        }
    }

    fn run_args(output_dir: &Path) -> RunArguments {
        let mut args = RunArguments::default();
        args.data.train_subsample_ratio = 0.3;
        args.data.valid_subsample_ratio = 0.5;
        args.data.max_source_length     = 16;
        args.data.max_target_length     = 12;
        args.data.num_beams             = 3;
        args.training.output_dir        = output_dir.to_path_buf();
        args.training.do_train          = true;
        args.training.do_eval           = true;
        args.training.do_predict        = true;
        args
    }

    fn encode(tok: &Tokenizer, text: &str) -> Vec<u32> {
        tok.encode(text, true).unwrap().get_ids().to_vec()
    }

    fn pipeline_error(err: &anyhow::Error) -> &PipelineError {
        err.downcast_ref::<PipelineError>().expect("a PipelineError")
    }

    // ─── Tests ────────────────────────────────────────────────────────────────
    #[test]
    fn test_full_run_writes_every_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let tok = word_level_tokenizer();
        let mut trainer = RecordingTrainer {
            predictions: vec![
                encode(&tok, "cv, image classification"),
                encode(&tok, "nlp, text summarization"),
            ],
            ..RecordingTrainer::default()
        };

        run_phases(&run_args(&out), &tok, &SPECIAL, &source(), &mut trainer).unwrap();

        assert_eq!(trainer.calls, vec!["train", "evaluate", "predict"]);
        assert_eq!(trainer.train_ids, vec!["0", "1", "2"]);
        assert_eq!(trainer.eval_ids, vec!["100", "101"]);
        assert_eq!(trainer.resume, None);
        assert_eq!(trainer.generation, Some(GenerationConfig::new(12, 3)));

        let predictions = fs::read_to_string(out.join("predictions.json")).unwrap();
        assert_eq!(
            predictions,
            "{\n    \"1\": \"cv, image classification\",\n    \"2\": \"nlp, text summarization\"\n}\n"
        );

        let train: Metrics = crate::infra::json::read(&out.join("train_results.json")).unwrap();
        assert_eq!(train["train_samples"], 3.0);
        let all: Metrics = crate::infra::json::read(&out.join("all_results.json")).unwrap();
        assert_eq!(all["eval_samples"], 2.0);
        assert_eq!(all["predict_samples"], 2.0);
        assert_eq!(all["eval_loss"], 1.25);

        assert!(out.join(TOKENIZER_FILE).is_file());
        let saved: RunArguments = crate::infra::json::read(&out.join("training_args.json")).unwrap();
        assert_eq!(saved, run_args(&out));
    }

    #[test]
    fn test_non_empty_output_dir_without_checkpoint_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("old.txt"), "x").unwrap();
        let mut trainer = RecordingTrainer::default();

        let err = run_phases(&run_args(tmp.path()), &word_level_tokenizer(), &SPECIAL, &source(), &mut trainer)
            .unwrap_err();
        assert!(matches!(pipeline_error(&err), PipelineError::Configuration { .. }));
        assert!(trainer.calls.is_empty());
    }

    #[test]
    fn test_overwrite_flag_trains_from_scratch() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("checkpoint-5")).unwrap();
        let mut args = run_args(tmp.path());
        args.training.overwrite_output_dir = true;
        args.training.do_predict = false;
        let mut trainer = RecordingTrainer::default();

        run_phases(&args, &word_level_tokenizer(), &SPECIAL, &source(), &mut trainer).unwrap();
        assert_eq!(trainer.resume, None);
    }

    #[test]
    fn test_resumes_from_latest_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        for step in [3, 12] {
            fs::create_dir_all(tmp.path().join(format!("checkpoint-{step}"))).unwrap();
        }
        let mut args = run_args(tmp.path());
        args.training.do_eval = false;
        args.training.do_predict = false;
        let mut trainer = RecordingTrainer::default();

        run_phases(&args, &word_level_tokenizer(), &SPECIAL, &source(), &mut trainer).unwrap();
        assert_eq!(trainer.resume, Some(tmp.path().join("checkpoint-12")));
    }

    #[test]
    fn test_own_log_file_does_not_block_training() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(LOG_FILE), "starting\n").unwrap();
        let mut args = run_args(tmp.path());
        args.training.do_eval = false;
        args.training.do_predict = false;
        let mut trainer = RecordingTrainer::default();

        run_phases(&args, &word_level_tokenizer(), &SPECIAL, &source(), &mut trainer).unwrap();
        assert_eq!(trainer.calls, vec!["train"]);
    }

    #[test]
    fn test_trainer_failure_aborts_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let mut trainer = RecordingTrainer { fail_train: true, ..RecordingTrainer::default() };

        let err = run_phases(&run_args(tmp.path()), &word_level_tokenizer(), &SPECIAL, &source(), &mut trainer)
            .unwrap_err();
        match pipeline_error(&err) {
            PipelineError::Delegated { phase, .. } => assert_eq!(*phase, "training"),
            other => panic!("expected delegated error, got {other:?}"),
        }
        assert_eq!(trainer.calls, vec!["train"]);
        assert!(!tmp.path().join("predictions.json").exists());
    }

    #[test]
    fn test_schema_error_stops_before_training() {
        let tmp  = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(
            data.join("train.jsonl"),
            concat!(
                r#"{"title":"A","abstract":"B","area":"cv","task_id":"x","arxiv_id":"1"}"#, "\n",
                r#"{"title":"A","abstract":"B","task_id":"x","arxiv_id":"2"}"#, "\n",
            ),
        )
        .unwrap();
        let src  = JsonlLoader::new(&data);
        let args = run_args(&tmp.path().join("out"));
        let mut trainer = RecordingTrainer::default();

        let err = run_phases(&args, &word_level_tokenizer(), &SPECIAL, &src, &mut trainer).unwrap_err();
        assert!(matches!(pipeline_error(&err), PipelineError::Schema { line: 2, .. }));
        assert!(trainer.calls.is_empty());
    }

    #[test]
    fn test_eval_only_skips_training_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut args = run_args(tmp.path());
        args.training.do_train = false;
        args.training.do_predict = false;
        let mut trainer = RecordingTrainer::default();

        run_phases(&args, &word_level_tokenizer(), &SPECIAL, &source(), &mut trainer).unwrap();
        assert_eq!(trainer.calls, vec!["evaluate"]);
        assert!(tmp.path().join("eval_results.json").is_file());
        assert!(!tmp.path().join("train_results.json").exists());
    }
}

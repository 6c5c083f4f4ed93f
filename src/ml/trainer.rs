// ============================================================
// Layer 5: Burn Trainer
// ============================================================
// The Trainable implementation on top of Burn.
//
//   train     AdamW (+ grad-norm clipping), linear warmup then
//             linear decay to zero, running loss logged every
//             `logging_steps`, checkpoint every `save_steps`
//   evaluate  teacher-forced loss + beam-search exact match
//   predict   beam search only
//
// Training runs on the autodiff backend; evaluation and
// prediction use `model.valid()`, the same weights on the inner
// backend with dropout off and no gradient tape.
//
// The seed is applied once in `new` to Burn's backend RNG for
// the weight init. Each epoch gets its own DataLoader shuffled
// with `seed + epoch`, so a resumed run sees the same batches
// in the same order as an uninterrupted one.

use anyhow::Result;
use burn::{
    data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::cli::arguments::TrainingArguments;
use crate::data::{
    batcher::{Seq2SeqBatch, Seq2SeqBatcher},
    dataset::PaperDataset,
};
use crate::domain::record::TokenizedRecord;
use crate::domain::traits::{
    GenerationConfig, Metrics, PredictionOutput, SpecialTokens, TrainOutput, Trainable,
};
use crate::infra::checkpoint::{self, CheckpointManager, TrainerState};
use crate::infra::metrics::{MetricsLogger, StepMetrics};
use crate::ml::generation::{generate, strip_special};
use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};

/// Backend used by the binary.
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub struct BurnTrainer<B: AutodiffBackend> {
    model:       Seq2SeqModel<B>,
    config:      Seq2SeqConfig,
    special:     SpecialTokens,
    args:        TrainingArguments,
    device:      B::Device,
    checkpoints: CheckpointManager,
    state:       TrainerState,
}

impl<B: AutodiffBackend> BurnTrainer<B> {
    /// Seed the backend, build the model and load pretrained
    /// weights from `weights_dir` when given.
    pub fn new(
        config:      Seq2SeqConfig,
        weights_dir: Option<&Path>,
        args:        &TrainingArguments,
        device:      B::Device,
    ) -> Result<Self> {
        B::seed(args.seed);

        let mut model = config.init::<B>(&device);
        if let Some(dir) = weights_dir {
            model = checkpoint::load_model(dir, model, &device)?;
            tracing::info!("Loaded pretrained weights from '{}'", dir.display());
        }
        tracing::info!("Model ready: {} parameters on {:?}", model.num_params(), device);

        Ok(Self {
            model,
            special:     config.special_tokens(),
            config,
            args:        args.clone(),
            device,
            checkpoints: CheckpointManager::new(&args.output_dir, args.save_total_limit),
            state:       TrainerState::default(),
        })
    }

    fn batcher<BB: Backend<Device = B::Device>>(&self) -> Seq2SeqBatcher<BB> {
        Seq2SeqBatcher::new(
            self.device.clone(),
            self.special.pad,
            self.special.decoder_start,
            self.model.max_positions(),
        )
    }

    /// Shuffled train batches for one epoch. The order depends on
    /// the seed and the epoch number only.
    fn epoch_loader(&self, dataset: &Arc<PaperDataset>, epoch: usize) -> Arc<dyn DataLoader<Seq2SeqBatch<B>>> {
        DataLoaderBuilder::new(self.batcher::<B>())
            .batch_size(self.args.per_device_train_batch_size)
            .shuffle(self.args.seed.wrapping_add(epoch as u64))
            .num_workers(1)
            .build(Arc::clone(dataset))
    }
}

impl<B: AutodiffBackend> Trainable for BurnTrainer<B> {
    fn train(&mut self, dataset: Vec<TokenizedRecord>, resume_from: Option<&Path>) -> Result<TrainOutput> {
        let dataset         = Arc::new(PaperDataset::new(dataset));
        let num_samples     = dataset.sample_count();
        let batch_size      = self.args.per_device_train_batch_size;
        let epochs          = self.args.num_train_epochs;
        let steps_per_epoch = num_samples.div_ceil(batch_size);
        let max_steps       = steps_per_epoch * epochs;

        let clipping = (self.args.max_grad_norm > 0.0)
            .then(|| GradientClippingConfig::Norm(self.args.max_grad_norm as f32));
        let mut optim = AdamWConfig::new()
            .with_weight_decay(self.args.weight_decay as f32)
            .with_grad_clipping(clipping)
            .init::<B, Seq2SeqModel<B>>();

        let mut model = self.model.clone();
        self.state = TrainerState {
            max_steps,
            num_train_epochs: epochs,
            train_batch_size: batch_size,
            ..TrainerState::default()
        };

        if let Some(dir) = resume_from {
            model = checkpoint::load_model(dir, model, &self.device)?;
            optim = optim.load_record(checkpoint::load_optimizer::<B, _>(dir, &self.device)?);
            let saved = checkpoint::load_state(dir)?;
            self.state.global_step = saved.global_step;
            self.state.log_history = saved.log_history;
            tracing::info!("Resuming from '{}' at step {}", dir.display(), saved.global_step);
        }

        if num_samples == 0 {
            tracing::warn!("Train split is empty; no optimiser steps will run");
        }
        tracing::info!(
            "***** Running training *****  examples={} epochs={} batch_size={} total_steps={}",
            num_samples, epochs, batch_size, max_steps,
        );

        let logger = MetricsLogger::new(self.checkpoints.output_dir())?;
        tracing::debug!("Step metrics go to '{}'", logger.csv_path().display());

        // On resume, skip the epochs and batches already seen.
        let (first_epoch, skip) = if steps_per_epoch > 0 {
            (self.state.global_step / steps_per_epoch, self.state.global_step % steps_per_epoch)
        } else {
            (0, 0)
        };

        let start = Instant::now();
        let mut steps_run    = 0usize;
        let mut loss_total   = 0.0f64;
        let mut window_loss  = 0.0f64;
        let mut window_steps = 0usize;

        for epoch in first_epoch..epochs {
            let loader = self.epoch_loader(&dataset, epoch);
            let seen   = if epoch == first_epoch { skip } else { 0 };
            for batch in loader.iter().skip(seen) {
                let lr = linear_schedule(
                    self.args.learning_rate,
                    self.state.global_step,
                    self.args.warmup_steps,
                    max_steps,
                );

                let loss = model.forward_loss(&batch);
                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);

                self.state.global_step += 1;
                self.state.epoch = self.state.global_step as f64 / steps_per_epoch as f64;
                steps_run    += 1;
                loss_total   += loss_val;
                window_loss  += loss_val;
                window_steps += 1;

                if self.state.global_step % self.args.logging_steps == 0 {
                    let row = StepMetrics {
                        step:          self.state.global_step,
                        epoch:         self.state.epoch,
                        loss:          window_loss / window_steps as f64,
                        learning_rate: lr,
                    };
                    logger.log(&row)?;
                    self.state.log_history.push(row.to_metrics());
                    window_loss  = 0.0;
                    window_steps = 0;
                }

                if self.args.save_steps > 0 && self.state.global_step % self.args.save_steps == 0 {
                    self.checkpoints
                        .save_checkpoint(&model, &self.config, optim.to_record(), &self.state)?;
                }
            }
        }

        self.model = model;

        let runtime    = start.elapsed().as_secs_f64();
        let train_loss = if steps_run > 0 { loss_total / steps_run as f64 } else { 0.0 };

        let mut metrics = Metrics::new();
        metrics.insert("train_runtime".into(), round(runtime, 4));
        metrics.insert("train_samples_per_second".into(), round(per_second(num_samples * epochs, runtime), 3));
        metrics.insert("train_steps_per_second".into(), round(per_second(steps_run, runtime), 3));
        metrics.insert("train_loss".into(), train_loss);
        metrics.insert("epoch".into(), self.state.epoch);
        self.state.log_history.push(metrics.clone());

        tracing::info!("Training complete: {} steps, loss {:.4}", self.state.global_step, train_loss);
        Ok(TrainOutput { global_step: self.state.global_step, training_loss: train_loss, metrics })
    }

    fn evaluate(&mut self, dataset: Vec<TokenizedRecord>, generation: &GenerationConfig) -> Result<Metrics> {
        let start   = Instant::now();
        let model   = self.model.valid();
        let batcher = self.batcher::<B::InnerBackend>();
        let total   = dataset.len();

        tracing::info!("***** Running evaluation *****  examples={} beams={}", total, generation.num_beams);

        let mut loss_sum = 0.0f64;
        let mut exact    = 0usize;
        let mut gen_len  = 0usize;

        for chunk in dataset.chunks(self.args.per_device_eval_batch_size) {
            let batch = batcher.batch(chunk.to_vec());
            let loss: f64 = model.forward_loss(&batch).into_scalar().elem::<f64>();
            loss_sum += loss * chunk.len() as f64;

            let generated = generate(&model, batch.input_ids, batch.input_mask_pad, generation, &self.special)?;
            for (sequence, record) in generated.iter().zip(chunk) {
                gen_len += sequence.len();
                if strip_special(sequence, &self.special) == strip_special(&record.labels, &self.special) {
                    exact += 1;
                }
            }
        }

        let runtime = start.elapsed().as_secs_f64();
        let mut metrics = Metrics::new();
        metrics.insert("eval_loss".into(), mean(loss_sum, total));
        metrics.insert("eval_exact_match".into(), mean(exact as f64, total));
        metrics.insert("eval_gen_len".into(), mean(gen_len as f64, total));
        metrics.insert("eval_runtime".into(), round(runtime, 4));
        metrics.insert("eval_samples_per_second".into(), round(per_second(total, runtime), 3));
        metrics.insert("epoch".into(), self.state.epoch);
        Ok(metrics)
    }

    fn predict(&mut self, dataset: Vec<TokenizedRecord>, generation: &GenerationConfig) -> Result<PredictionOutput> {
        let start   = Instant::now();
        let model   = self.model.valid();
        let batcher = self.batcher::<B::InnerBackend>();
        let total   = dataset.len();

        tracing::info!("***** Running prediction *****  examples={} beams={}", total, generation.num_beams);

        let mut sequences = Vec::with_capacity(total);
        for chunk in dataset.chunks(self.args.per_device_eval_batch_size) {
            let batch = batcher.batch(chunk.to_vec());
            sequences.extend(generate(&model, batch.input_ids, batch.input_mask_pad, generation, &self.special)?);
        }

        let runtime = start.elapsed().as_secs_f64();
        let gen_len: usize = sequences.iter().map(Vec::len).sum();
        let mut metrics = Metrics::new();
        metrics.insert("predict_gen_len".into(), mean(gen_len as f64, total));
        metrics.insert("predict_runtime".into(), round(runtime, 4));
        metrics.insert("predict_samples_per_second".into(), round(per_second(total, runtime), 3));
        Ok(PredictionOutput { sequences, metrics })
    }

    fn save_model(&self) -> Result<()> {
        checkpoint::save_model(self.checkpoints.output_dir(), &self.model, &self.config)?;
        tracing::info!("Saved model to '{}'", self.checkpoints.output_dir().display());
        Ok(())
    }

    fn save_state(&self) -> Result<()> {
        checkpoint::save_state(self.checkpoints.output_dir(), &self.state)
    }
}

// ─── Schedule & helpers ───────────────────────────────────────────────────────
/// Learning rate before optimiser step `step` (0-based): linear
/// warmup from 0 to `base` over `warmup` steps, then linear
/// decay to 0 at `total`.
pub fn linear_schedule(base: f64, step: usize, warmup: usize, total: usize) -> f64 {
    if step < warmup {
        return base * step as f64 / warmup.max(1) as f64;
    }
    let remaining = total.saturating_sub(step) as f64;
    base * (remaining / total.saturating_sub(warmup).max(1) as f64).max(0.0)
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn per_second(count: usize, seconds: f64) -> f64 {
    if seconds > 0.0 { count as f64 / seconds } else { 0.0 }
}

fn round(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// All model math lives here.
//
//   model.rs       BART-shaped encoder-decoder
//                  • shared token embedding
//                  • learned encoder / decoder positions
//                  • Burn TransformerEncoder + TransformerDecoder
//                  • LM head, padding-aware cross-entropy
//
//   generation.rs  beam search (num_beams = 1 is greedy)
//
//   trainer.rs     the Trainable implementation: AdamW loop,
//                  LR schedule, step logging, checkpoints,
//                  evaluation and prediction
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Lewis et al. (2020) BART

/// Seq2seq transformer architecture
pub mod model;

/// Beam-search decoding
pub mod generation;

/// Training, evaluation and prediction on Burn
pub mod trainer;

// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   model_store.rs  pretrained config / tokenizer / weights from
//                   a local directory or the Hugging Face Hub
//
//   checkpoint.rs   CompactRecorder weights + optimizer state,
//                   trainer state, checkpoint rotation
//
//   metrics.rs      step CSV and {split}_results.json files
//
//   predictions.rs  predictions.json
//
//   logging.rs      stdout + run.log tracing subscriber
//
//   json.rs         the one JSON writer every artifact goes through
//
// Reference: Burn Book §5 (Records and Checkpointing)

/// Pretrained model resolution
pub mod model_store;

/// Model checkpoint saving, loading and rotation
pub mod checkpoint;

/// Step and phase metrics persistence
pub mod metrics;

/// Prediction file writer
pub mod predictions;

/// Tracing subscriber setup
pub mod logging;

/// Pretty JSON file helpers
pub mod json;

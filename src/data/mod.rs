// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything between the JSONL files on disk and tensor
// batches on the device.
//
//   {dataset_dir}/{split}.jsonl
//       │
//       ▼
//   JsonlLoader       → Example records, schema-checked
//       │
//       ▼
//   select_prefix     → first ceil(ratio × len) records
//       │
//       ▼
//   Preprocessor      → TokenizedRecords (inputs, labels, id)
//       │
//       ▼
//   PaperDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   Seq2SeqBatcher    → padded tensor batches, shifted decoder inputs
//
// Each step is testable on its own with plain Vecs.

/// Reads JSON Lines splits
pub mod loader;

/// Deterministic prefix subsampling of a split
pub mod subsample;

/// Tokenizes examples into model inputs and labels
pub mod preprocessor;

/// Implements Burn's Dataset trait for tokenized records
pub mod dataset;

/// Implements Burn's Batcher trait for seq2seq batches
pub mod batcher;

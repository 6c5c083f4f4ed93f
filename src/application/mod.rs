// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Orchestrates the other layers for one run.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - No direct file formats here (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern

// train → eval → predict
pub mod run_use_case;

// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain structs, enums and traits describing what the system
// works with. No Burn types, no file I/O.

/// Paper records before and after tokenisation
pub mod record;

/// The four fatal failure kinds
pub mod error;

/// Collaborator traits: record sources and the trainer
pub mod traits;

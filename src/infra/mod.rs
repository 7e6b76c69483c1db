// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem concerns shared by the use cases:
//
//   checkpoint.rs — best-model weights (Burn recorder) and the
//                   training config as JSON, so `evaluate` can
//                   rebuild the exact architecture later
//
//   metrics.rs    — per-epoch loss/perplexity rows in a CSV file

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that describe the training run itself,
// independent of the tensor framework:
//
//   weight_sharing.rs — how the output projector relates to
//                       the embedding table (4 closed modes)
//   early_stopping.rs — the per-epoch validation state machine
//                       (best loss, best epoch, patience)
//   lr_schedule.rs    — step decay of the learning rate
//
// Rules for this layer:
//   - NO Burn types
//   - NO file I/O
//   - Everything here is unit-testable without a device

pub mod weight_sharing;

pub mod early_stopping;

pub mod lr_schedule;

/// Perplexity of a mean cross-entropy loss (natural log base).
pub fn perplexity(loss: f64) -> f64 {
    loss.exp()
}

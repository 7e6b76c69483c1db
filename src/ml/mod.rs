// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, runs or trains the network.
//
//   positional.rs   — fixed sinusoid table, added to embeddings
//   attention.rs    — multi-head attention sublayer + causal mask
//   feed_forward.rs — position-wise ReLU FFN sublayer
//   encoder.rs      — stack of (self-attn, FFN), causally masked
//   decoder.rs      — stack of (self-attn, cross-attn, FFN)
//   model.rs        — embedding → encoder → decoder → projector,
//                     next-token logits from the last position
//   epoch.rs        — one pass over a split (train or evaluate)
//   trainer.rs      — the epoch loop: Adam, StepLR, early
//                     stopping, checkpointing, final test pass
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

pub mod positional;

/// Multi-head attention and the subsequent (causal) mask
pub mod attention;

pub mod feed_forward;

pub mod encoder;

pub mod decoder;

/// Fixed-window encoder-decoder language model
pub mod model;

/// Single training / evaluation passes with weighted loss accounting
pub mod epoch;

/// Full training loop with validation, early stopping and checkpointing
pub mod trainer;

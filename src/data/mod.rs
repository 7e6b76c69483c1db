// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a prepared token file to device-resident batches:
//
//   corpus.json (vocab_size + train/valid/test id streams)
//       │
//       ▼
//   PreparedCorpus   → reads and validates the file
//       │
//       ▼
//   NgramDataset     → sliding windows (n_gram context, 1 target)
//       │
//       ▼
//   LmBatcher        → stacks samples into Int tensors
//       │
//       ▼
//   DataLoader       → Burn's loader, shuffling + worker threads
//
// Tokenisation and vocabulary building happen outside this
// program; the corpus file is their output.

/// Reads the prepared token-id corpus
pub mod corpus;

/// Implements Burn's Dataset trait over sliding windows
pub mod dataset;

/// Implements Burn's Batcher trait for next-token batches
pub mod batcher;

// ============================================================
// Layer 4 — Prepared Corpus
// ============================================================
// Reads the output of the external tokenisation step: one JSON
// file with the vocabulary size and three flat token streams.
//
//   {
//     "vocab_size": 33278,
//     "train": [12, 7, 981, ...],
//     "valid": [...],
//     "test":  [...]
//   }
//
// No tokenisation happens here. The loader only checks that
// every id fits the vocabulary, so a bad file fails at startup
// instead of as an out-of-bounds embedding lookup mid-epoch.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedCorpus {
    pub vocab_size: usize,
    pub train:      Vec<u32>,
    pub valid:      Vec<u32>,
    pub test:       Vec<u32>,
}

impl PreparedCorpus {
    /// Load and validate a prepared corpus file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read corpus '{}'", path.display()))?;
        let corpus: Self = serde_json::from_str(&json)
            .with_context(|| format!("Malformed corpus file '{}'", path.display()))?;
        corpus.validate()?;

        tracing::info!(
            "Corpus '{}': vocab={} train={} valid={} test={} tokens",
            path.display(),
            corpus.vocab_size,
            corpus.train.len(),
            corpus.valid.len(),
            corpus.test.len(),
        );
        Ok(corpus)
    }

    /// Every token id must index into the embedding table.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.vocab_size > 0, "Corpus vocabulary is empty");
        // ids are batched as i32 Int tensors
        ensure!(
            self.vocab_size <= i32::MAX as usize,
            "Vocabulary of size {} exceeds the largest supported id {}",
            self.vocab_size, i32::MAX,
        );
        for (name, split) in self.splits() {
            if let Some(&bad) = split.iter().find(|&&id| id as usize >= self.vocab_size) {
                anyhow::bail!(
                    "Token id {} in '{}' split is outside vocabulary of size {}",
                    bad, name, self.vocab_size,
                );
            }
        }
        Ok(())
    }

    fn splits(&self) -> [(&'static str, &[u32]); 3] {
        [("train", &self.train), ("valid", &self.valid), ("test", &self.test)]
    }
}

use anyhow::{ensure, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One next-token example: `n_gram` context ids and the id that follows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramSample {
    pub context: Vec<u32>,
    pub target:  u32,
}

/// Sliding windows over a flat token stream.
///
/// Window `i` covers `tokens[i..i + n_gram]` and predicts `tokens[i + n_gram]`,
/// so a stream of `T` tokens yields `T - n_gram` samples. Samples are built on
/// demand; the stream is stored once.
pub struct NgramDataset {
    tokens: Vec<u32>,
    n_gram: usize,
}

impl NgramDataset {
    pub fn new(tokens: Vec<u32>, n_gram: usize) -> Result<Self> {
        ensure!(n_gram > 0, "n_gram must be positive");
        ensure!(
            tokens.len() > n_gram,
            "Token stream of length {} is too short for a window of {} plus a target",
            tokens.len(), n_gram,
        );
        Ok(Self { tokens, n_gram })
    }
}

impl Dataset<NgramSample> for NgramDataset {
    fn get(&self, index: usize) -> Option<NgramSample> {
        let end = index.checked_add(self.n_gram)?;
        let target = *self.tokens.get(end)?;
        Some(NgramSample { context: self.tokens[index..end].to_vec(), target })
    }

    fn len(&self) -> usize {
        self.tokens.len() - self.n_gram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_slide_by_one() {
        let ds = NgramDataset::new(vec![10, 11, 12, 13, 14], 3).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0), Some(NgramSample { context: vec![10, 11, 12], target: 13 }));
        assert_eq!(ds.get(1), Some(NgramSample { context: vec![11, 12, 13], target: 14 }));
        assert_eq!(ds.get(2), None);
    }

    #[test]
    fn test_too_short_stream_is_rejected() {
        assert!(NgramDataset::new(vec![1, 2, 3], 3).is_err());
        assert!(NgramDataset::new(vec![1, 2, 3, 4], 3).is_ok());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(NgramDataset::new(vec![1, 2], 0).is_err());
    }
}

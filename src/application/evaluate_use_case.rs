// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Re-scores a finished run without retraining:
//
//   Step 1: Load train_config.json  (architecture + vocab size)
//   Step 2: Load the corpus         (test split only is used)
//   Step 3: Load best weights, one pass over the test split
//
// The corpus must be the one the checkpoint was trained on;
// a vocabulary mismatch is rejected before any weights load.

use anyhow::{ensure, Result};

use crate::data::corpus::PreparedCorpus;
use crate::domain::perplexity;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::run_evaluation;

#[derive(Debug, Clone, Copy)]
pub struct EvaluationReport {
    pub test_loss: f64,
    pub test_ppl:  f64,
}

pub struct EvaluateUseCase {
    corpus_path:    String,
    checkpoint_dir: String,
    /// Overrides the device stored in the saved config.
    device:         Option<String>,
}

impl EvaluateUseCase {
    pub fn new(corpus_path: String, checkpoint_dir: String, device: Option<String>) -> Self {
        Self { corpus_path, checkpoint_dir, device }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let ckpt_manager = CheckpointManager::new(&self.checkpoint_dir)?;
        let mut cfg = ckpt_manager.load_config()?;
        if let Some(device) = &self.device {
            cfg.device = device.clone();
        }

        let corpus = PreparedCorpus::load(&self.corpus_path)?;
        ensure!(
            corpus.vocab_size == cfg.vocab_size,
            "Corpus vocabulary ({}) does not match the checkpoint's ({})",
            corpus.vocab_size, cfg.vocab_size,
        );

        let test_loss = run_evaluation(&cfg, corpus.test, &ckpt_manager)?;
        let report = EvaluationReport { test_loss, test_ppl: perplexity(test_loss) };

        println!("  | Test | loss {:5.4} | ppl {:5.4} |", report.test_loss, report.test_ppl);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};

    fn write_corpus(path: &std::path::Path, vocab_size: usize) {
        let stream: Vec<u32> = (0..60).map(|i| (i * 3 % 7) as u32).collect();
        let corpus = PreparedCorpus {
            vocab_size,
            train: stream.clone(),
            valid: stream[..30].to_vec(),
            test:  stream[30..].to_vec(),
        };
        std::fs::write(path, serde_json::to_string(&corpus).unwrap()).unwrap();
    }

    fn train_tiny(dir: &std::path::Path) -> (String, String, f64) {
        let corpus_path = dir.join("corpus.json");
        write_corpus(&corpus_path, 7);
        let ckpt_dir = dir.join("ckpt");

        let cfg = TrainConfig {
            corpus_path:    corpus_path.display().to_string(),
            checkpoint_dir: ckpt_dir.display().to_string(),
            n_layer: 1, d_model: 8, n_head: 2, d_inner: 16, n_gram: 4,
            batch_size: 8, epochs: 2,
            device: "cpu".to_string(),
            ..TrainConfig::default()
        };
        let report = TrainUseCase::new(cfg).execute().unwrap();
        (corpus_path.display().to_string(), ckpt_dir.display().to_string(), report.test_loss)
    }

    #[test]
    fn test_evaluate_matches_training_test_loss() {
        let dir = tempfile::tempdir().unwrap();
        let (corpus, ckpt, trained_loss) = train_tiny(dir.path());

        let report = EvaluateUseCase::new(corpus, ckpt, None).execute().unwrap();
        assert!((report.test_loss - trained_loss).abs() < 1e-9);
        assert!((report.test_ppl - trained_loss.exp()).abs() < 1e-6);
    }

    #[test]
    fn test_vocabulary_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (_, ckpt, _) = train_tiny(dir.path());

        let other = dir.path().join("other.json");
        write_corpus(&other, 9);
        let result = EvaluateUseCase::new(other.display().to_string(), ckpt, None).execute();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_run_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.json");
        write_corpus(&corpus, 7);

        let result = EvaluateUseCase::new(
            corpus.display().to_string(),
            dir.path().join("empty").display().to_string(),
            Some("cpu".to_string()),
        ).execute();
        assert!(result.is_err());
    }
}

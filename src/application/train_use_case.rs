// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Load the prepared corpus    (Layer 4 - data)
//   Step 2: Record the vocabulary size  (from the corpus)
//   Step 3: Validate hyperparameters
//   Step 4: Save config                 (Layer 6 - infra)
//   Step 5: Run the training driver     (Layer 5 - ml)
//
// The driver trains, early-stops, checkpoints the best epoch
// and finishes with one pass over the test split.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::corpus::PreparedCorpus;
use crate::domain::{perplexity, weight_sharing::WeightSharing};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::NgramTransformerConfig;
use crate::ml::trainer::{run_training, TrainingReport};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved next to the checkpoint as JSON so a
// later `evaluate` can rebuild the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub corpus_path:     String,
    pub checkpoint_dir:  String,

    // model
    pub n_layer:         usize,
    pub d_model:         usize,
    pub n_head:          usize,
    pub d_inner:         usize,
    pub scaled_attn:     bool,
    pub dropout:         f64,
    pub weight_sharing:  i64,
    pub n_gram:          usize,

    // optimisation
    pub batch_size:      usize,
    /// 0 keeps batch order, and so the whole run, determined by `seed`.
    pub num_workers:     usize,
    pub epochs:          usize,
    pub lr:              f64,
    pub lr_step:         usize,
    pub lr_gamma:        f64,
    pub weight_decay:    f64,
    pub es_patience_max: usize,
    pub eps_loss:        f64,

    // run
    pub seed:            u64,
    pub device:          String,

    /// Filled in from the corpus; 0 until then.
    pub vocab_size:      usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus_path:     "data/corpus.json".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            n_layer:         3,
            d_model:         256,
            n_head:          8,
            d_inner:         1024,
            scaled_attn:     false,
            dropout:         0.1,
            weight_sharing:  1,
            n_gram:          25,
            batch_size:      1000,
            num_workers:     0,
            epochs:          10,
            lr:              1e-3,
            lr_step:         20,
            lr_gamma:        0.1,
            weight_decay:    1e-4,
            es_patience_max: 3,
            eps_loss:        0.0,
            seed:            1111,
            device:          "wgpu".to_string(),
            vocab_size:      0,
        }
    }
}

impl TrainConfig {
    /// d_k = d_v = d_model / n_head
    pub fn d_k(&self) -> usize {
        self.d_model / self.n_head.max(1)
    }

    pub fn weight_sharing_mode(&self) -> WeightSharing {
        WeightSharing::from_code(self.weight_sharing)
    }

    pub fn model_config(&self) -> NgramTransformerConfig {
        NgramTransformerConfig::new(
            self.vocab_size, self.n_gram, self.d_model,
            self.n_head, self.d_inner, self.n_layer, self.weight_sharing,
        )
        .with_dropout(self.dropout)
        .with_scaled_attn(self.scaled_attn)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.vocab_size > 0, "vocab_size must be positive");
        ensure!(self.n_gram > 0, "n_gram must be positive");
        ensure!(self.n_layer > 0, "n_layer must be positive");
        ensure!(self.n_head > 0, "n_head must be positive");
        ensure!(
            self.d_k() > 0,
            "d_model ({}) must be at least n_head ({})", self.d_model, self.n_head,
        );
        ensure!(self.d_inner > 0, "d_inner must be positive");
        ensure!((0.0..1.0).contains(&self.dropout), "dropout must be in [0, 1)");
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.epochs > 0, "epochs must be positive");
        ensure!(self.lr > 0.0, "lr must be positive");
        ensure!(self.es_patience_max > 0, "es_patience_max must be positive");
        ensure!(self.eps_loss >= 0.0, "eps_loss must not be negative");
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(mut self) -> Result<TrainingReport> {
        // ── Step 1: Load the token streams ───────────────────────────────────
        let corpus = PreparedCorpus::load(&self.config.corpus_path)?;

        // ── Step 2–3: Vocabulary from the corpus, then sanity checks ─────────
        self.config.vocab_size = corpus.vocab_size;
        let cfg = &self.config;
        cfg.validate()?;

        tracing::info!(
            "n_layer={} d_model={} n_head={} d_k={} d_inner={} n_gram={} weight_sharing={}",
            cfg.n_layer, cfg.d_model, cfg.n_head, cfg.d_k(),
            cfg.d_inner, cfg.n_gram, cfg.weight_sharing_mode(),
        );

        // ── Step 4: Save config for evaluation ───────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 5: Run training loop (Layer 5) ──────────────────────────────
        let report = run_training(cfg, corpus, &ckpt_manager, &metrics)?;

        println!(
            "  | Test | loss {:5.4} | ppl {:5.4} |",
            report.test_loss, perplexity(report.test_loss),
        );
        println!(
            "  | n_param {} | n_layer {} | d_model {} | n_head {} | d_k {} | d_inner {} | n_gram {} |",
            report.encoder_params, cfg.n_layer, cfg.d_model, cfg.n_head,
            cfg.d_k(), cfg.d_inner, cfg.n_gram,
        );
        Ok(report)
    }
}

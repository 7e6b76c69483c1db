// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch so learning curves can be
// plotted after (or during) a run.
//
// Output file: checkpoints/metrics.csv
//
//   epoch,lr,train_loss,train_ppl,val_loss,val_ppl,patience
//   1,0.001000,6.512300,673.142000,6.001200,403.910000,0
//   2,0.001000,5.880100,357.830000,5.712000,302.510000,0
//
// Perplexity is exp(loss), recorded next to each loss.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::perplexity;

const HEADER: &str = "epoch,lr,train_loss,train_ppl,val_loss,val_ppl,patience";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,

    /// Learning rate used for this epoch's training pass
    pub lr: f64,

    /// Sample-weighted mean cross-entropy over the training split
    pub train_loss: f64,

    /// Sample-weighted mean cross-entropy over the validation split
    pub val_loss: f64,

    /// Consecutive epochs without sufficient improvement, after this epoch
    pub patience: usize,
}

impl EpochMetrics {
    pub fn new(epoch: usize, lr: f64, train_loss: f64, val_loss: f64, patience: usize) -> Self {
        Self { epoch, lr, train_loss, val_loss, patience }
    }

    pub fn train_ppl(&self) -> f64 {
        perplexity(self.train_loss)
    }

    pub fn val_ppl(&self) -> f64 {
        perplexity(self.val_loss)
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
            self.epoch,
            self.lr,
            self.train_loss,
            self.train_ppl(),
            self.val_loss,
            self.val_ppl(),
            self.patience,
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Starts a fresh `metrics.csv` in `dir`, replacing one from an earlier run.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "{HEADER}")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

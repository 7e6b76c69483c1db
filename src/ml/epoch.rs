// ============================================================
// Layer 5 — Epoch Runner
// ============================================================
// One pass over a batch source, in two flavours:
//
//   train    — autodiff backend: forward, loss, backward, one
//              optimiser step per batch. Burn builds a fresh
//              gradient set on every backward() call, so there
//              is nothing to zero between batches.
//   evaluate — inner (non-autodiff) backend: forward and loss
//              only. Dropout is the identity there and no graph
//              is recorded.
//
// Both return the mean loss weighted by batch size:
//
//   mean = Σ (loss_b · n_b) / Σ n_b
//
// so a short final batch counts for exactly its samples.

use anyhow::{ensure, Result};
use burn::{
    nn::loss::CrossEntropyLoss,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::LmBatch;
use crate::ml::model::NgramTransformer;

/// Running sample-weighted loss.
#[derive(Debug, Default, Clone, Copy)]
struct LossMeter {
    total:   f64,
    samples: usize,
}

impl LossMeter {
    fn update(&mut self, batch_loss: f64, batch_len: usize) {
        self.total   += batch_loss * batch_len as f64;
        self.samples += batch_len;
    }

    fn mean(&self, phase: &str) -> Result<f64> {
        ensure!(self.samples > 0, "{phase} pass saw no samples; the batch source is empty");
        Ok(self.total / self.samples as f64)
    }
}

/// One training pass. Takes the model by value because Burn's optimiser step
/// returns the updated module; the caller gets it back with the mean loss.
pub fn train<B, O, I>(
    batches: I,
    mut model: NgramTransformer<B>,
    loss_fn:   &CrossEntropyLoss<B>,
    optim:     &mut O,
    lr:        f64,
) -> Result<(NgramTransformer<B>, f64)>
where
    B: AutodiffBackend,
    O: Optimizer<NgramTransformer<B>, B>,
    I: IntoIterator<Item = LmBatch<B>>,
{
    let mut meter = LossMeter::default();

    for batch in batches {
        let batch_len = batch.len();
        let logits = model.forward(batch.inputs).logits;
        let loss   = loss_fn.forward(logits, batch.targets);

        meter.update(loss.clone().into_scalar().elem::<f64>(), batch_len);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);
    }

    let mean = meter.mean("training")?;
    tracing::debug!("train pass: {} samples, mean loss {:.4}", meter.samples, mean);
    Ok((model, mean))
}

/// One evaluation pass; the model is only read.
pub fn evaluate<B, I>(
    batches: I,
    model:   &NgramTransformer<B>,
    loss_fn: &CrossEntropyLoss<B>,
) -> Result<f64>
where
    B: Backend,
    I: IntoIterator<Item = LmBatch<B>>,
{
    let mut meter = LossMeter::default();

    for batch in batches {
        let batch_len = batch.len();
        let logits = model.forward(batch.inputs).logits;
        let loss   = loss_fn.forward(logits, batch.targets);
        meter.update(loss.into_scalar().elem::<f64>(), batch_len);
    }

    let mean = meter.mean("evaluation")?;
    tracing::debug!("eval pass: {} samples, mean loss {:.4}", meter.samples, mean);
    Ok(mean)
}

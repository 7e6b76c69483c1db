// ============================================================
// Layer 5 — Training Driver
// ============================================================
// Owns everything that lives for a whole run: the optimiser,
// the learning-rate schedule and the early-stopping state.
//
//   for epoch in 1..=epochs:
//       train pass   (Autodiff backend, current lr)
//       lr schedule  step
//       valid pass   (inner backend via model.valid())
//       Improved  → overwrite checkpoint
//       Stopped   → break
//   reload checkpoint → test pass
//
// A run starts by deleting any checkpoint left in its directory
// and fails if no epoch ever improved, so the test pass only
// ever sees weights this run produced.
//
// Backends: `cpu` runs on NdArray, `wgpu[:N]` on Wgpu. The
// training loop itself is generic over any AutodiffBackend.
//
// Reference: Burn Book §5 (Custom Training Loop)
//            Kingma & Ba (2015) Adam

use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{decay::WeightDecayConfig, AdamConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{LmBatch, LmBatcher},
    corpus::PreparedCorpus,
    dataset::NgramDataset,
};
use crate::domain::{
    early_stopping::{EarlyStopping, TrainingPhase},
    lr_schedule::StepLr,
    perplexity,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::epoch;

type CpuBackend = burn::backend::NdArray;
type GpuBackend = burn::backend::Wgpu;

/// Where the tensors live, parsed from the `device` option.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeDevice {
    Cpu,
    Wgpu(burn::backend::wgpu::WgpuDevice),
}

impl ComputeDevice {
    /// `cpu`, `wgpu` / `gpu` (default adapter) or `wgpu:N` / `gpu:N` (discrete GPU N).
    pub fn parse(name: &str) -> Result<Self> {
        use burn::backend::wgpu::WgpuDevice;

        let name = name.trim().to_ascii_lowercase();
        match name.split_once(':') {
            None if name == "cpu" => Ok(Self::Cpu),
            None if name == "wgpu" || name == "gpu" => Ok(Self::Wgpu(WgpuDevice::default())),
            Some(("wgpu" | "gpu", index)) => match index.parse::<usize>() {
                Ok(index) => Ok(Self::Wgpu(WgpuDevice::DiscreteGpu(index))),
                Err(_) => bail!("Invalid GPU index '{index}' in device '{name}'"),
            },
            _ => bail!("Unknown device '{name}'. Expected cpu, wgpu or wgpu:N"),
        }
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run:     usize,
    pub best_epoch:     usize,
    pub best_loss:      f64,
    pub test_loss:      f64,
    /// `Stopped` (early) or `Done` (epoch budget exhausted)
    pub outcome:        TrainingPhase,
    pub encoder_params: usize,
}

pub fn run_training(
    cfg:          &TrainConfig,
    corpus:       PreparedCorpus,
    ckpt_manager: &CheckpointManager,
    metrics:      &MetricsLogger,
) -> Result<TrainingReport> {
    match ComputeDevice::parse(&cfg.device)? {
        ComputeDevice::Cpu => {
            tracing::info!("Using NdArray CPU backend");
            train_loop::<burn::backend::Autodiff<CpuBackend>>(
                cfg, corpus, ckpt_manager, metrics, Default::default(),
            )
        }
        ComputeDevice::Wgpu(device) => {
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<burn::backend::Autodiff<GpuBackend>>(
                cfg, corpus, ckpt_manager, metrics, device,
            )
        }
    }
}

fn build_loader<B: Backend>(
    device:  B::Device,
    dataset: NgramDataset,
    cfg:     &TrainConfig,
    shuffle: bool,
) -> Arc<dyn DataLoader<LmBatch<B>>> {
    let mut builder = DataLoaderBuilder::new(LmBatcher::<B>::new(device))
        .batch_size(cfg.batch_size);
    if shuffle {
        builder = builder.shuffle(cfg.seed);
    }
    if cfg.num_workers > 0 {
        builder = builder.num_workers(cfg.num_workers);
    }
    builder.build(dataset)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    corpus:       PreparedCorpus,
    ckpt_manager: &CheckpointManager,
    metrics:      &MetricsLogger,
    device:       B::Device,
) -> Result<TrainingReport> {
    B::seed(cfg.seed);
    ckpt_manager.discard_model()?;

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model = cfg.model_config().init::<B>(&device);
    let encoder_params = model.encoder_params();
    tracing::info!(
        "Model ready: {} params ({} in encoder), projector {} (tied to embedding: {})",
        model.num_params(), encoder_params,
        cfg.weight_sharing_mode(), cfg.weight_sharing_mode().is_tied(),
    );

    // ── Adam with L2 weight decay ────────────────────────────────────────────
    let mut optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
        .init::<B, _>();
    let mut schedule = StepLr::new(cfg.lr, cfg.lr_step, cfg.lr_gamma);

    // ── Data loaders: training on B, validation/test on the inner backend ────
    let train_loader = build_loader::<B>(
        device.clone(), NgramDataset::new(corpus.train, cfg.n_gram)?, cfg, true,
    );
    let valid_loader = build_loader::<B::InnerBackend>(
        device.clone(), NgramDataset::new(corpus.valid, cfg.n_gram)?, cfg, false,
    );
    let test_set = NgramDataset::new(corpus.test, cfg.n_gram)?;

    let train_loss_fn = CrossEntropyLossConfig::new().init::<B>(&device);
    let eval_loss_fn  = CrossEntropyLossConfig::new().init::<B::InnerBackend>(&device);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut stopping   = EarlyStopping::new(cfg.es_patience_max, cfg.eps_loss);
    let mut epochs_run = 0;

    for epoch in 1..=cfg.epochs {
        println!("\n[Epoch {epoch}]");
        epochs_run = epoch;

        // ── Training phase ────────────────────────────────────────────────────
        let lr = schedule.current();
        let (trained, train_loss) =
            epoch::train(train_loader.iter(), model, &train_loss_fn, &mut optim, lr)?;
        model = trained;
        schedule.step();
        println!(
            "  | Train | loss {:5.4} | ppl {:5.4} | lr {:.2e} |",
            train_loss, perplexity(train_loss), lr,
        );

        // ── Validation phase (dropout off) ────────────────────────────────────
        let val_loss = epoch::evaluate(valid_loader.iter(), &model.valid(), &eval_loss_fn)?;
        let phase = stopping.observe(epoch, val_loss);
        metrics.log(&EpochMetrics::new(epoch, lr, train_loss, val_loss, stopping.patience()))?;

        match phase {
            TrainingPhase::Improved => {
                ckpt_manager.save_model(&model)?;
                tracing::info!("New best validation loss {:.4} at epoch {}", val_loss, epoch);
            }
            TrainingPhase::Stopped => {
                println!("\n[Warning] Early stopping model");
                print_best(&stopping);
                break;
            }
            _ => {}
        }

        println!(
            "  | Valid | loss {:5.4} | ppl {:5.4} | es_patience {}/{} |",
            val_loss, perplexity(val_loss), stopping.patience(), stopping.patience_max(),
        );
    }

    let outcome = stopping.finish();
    ensure!(
        stopping.best_epoch() > 0,
        "No epoch produced a finite validation loss; no checkpoint was saved",
    );

    // ── Testing phase: best checkpoint, fresh inference-mode model ────────────
    println!("\n[Testing]");
    let test_loss = evaluate_checkpoint::<B::InnerBackend>(cfg, test_set, ckpt_manager, device)?;

    tracing::info!("Training finished ({:?}) after {} epochs", outcome, epochs_run);
    Ok(TrainingReport {
        epochs_run,
        best_epoch: stopping.best_epoch(),
        best_loss:  stopping.best_loss(),
        test_loss,
        outcome,
        encoder_params,
    })
}

fn print_best(stopping: &EarlyStopping) {
    println!(
        "  | Best | epoch {} | loss {:5.4} | ppl {:5.4} |",
        stopping.best_epoch(), stopping.best_loss(), perplexity(stopping.best_loss()),
    );
}

/// Test-split loss of a saved checkpoint, on the device named in `cfg`.
pub fn run_evaluation(
    cfg:          &TrainConfig,
    split:        Vec<u32>,
    ckpt_manager: &CheckpointManager,
) -> Result<f64> {
    let dataset = NgramDataset::new(split, cfg.n_gram)?;
    match ComputeDevice::parse(&cfg.device)? {
        ComputeDevice::Cpu => {
            evaluate_checkpoint::<CpuBackend>(cfg, dataset, ckpt_manager, Default::default())
        }
        ComputeDevice::Wgpu(device) => {
            evaluate_checkpoint::<GpuBackend>(cfg, dataset, ckpt_manager, device)
        }
    }
}

/// Rebuilds the architecture from `cfg`, loads the saved weights and runs
/// one dropout-free pass over `dataset`.
pub fn evaluate_checkpoint<B: Backend>(
    cfg:          &TrainConfig,
    dataset:      NgramDataset,
    ckpt_manager: &CheckpointManager,
    device:       B::Device,
) -> Result<f64> {
    let model  = ckpt_manager.load_model(cfg.model_config().init::<B>(&device), &device)?;
    let loader = build_loader::<B>(device.clone(), dataset, cfg, false);
    let loss_fn = CrossEntropyLossConfig::new().init::<B>(&device);
    epoch::evaluate(loader.iter(), &model, &loss_fn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::NgramTransformer;
    use burn::backend::{Autodiff, NdArray};

    type TestAutodiffBackend = Autodiff<NdArray>;

    #[test]
    fn test_parse_devices() {
        use burn::backend::wgpu::WgpuDevice;

        assert_eq!(ComputeDevice::parse("cpu").unwrap(), ComputeDevice::Cpu);
        assert_eq!(ComputeDevice::parse(" CPU ").unwrap(), ComputeDevice::Cpu);
        assert_eq!(ComputeDevice::parse("wgpu").unwrap(), ComputeDevice::Wgpu(WgpuDevice::default()));
        assert_eq!(ComputeDevice::parse("gpu:1").unwrap(), ComputeDevice::Wgpu(WgpuDevice::DiscreteGpu(1)));
        assert!(ComputeDevice::parse("cuda:0").is_err());
        assert!(ComputeDevice::parse("wgpu:x").is_err());
    }

    fn tiny_corpus() -> PreparedCorpus {
        let stream: Vec<u32> = (0..80).map(|i| (i * 5 % 11) as u32).collect();
        PreparedCorpus {
            vocab_size: 11,
            train: stream.clone(),
            valid: stream[..40].to_vec(),
            test:  stream[40..].to_vec(),
        }
    }

    fn tiny_config(epochs: usize) -> TrainConfig {
        TrainConfig {
            n_layer: 1, d_model: 8, n_head: 2, d_inner: 16, n_gram: 5,
            batch_size: 16, epochs, lr: 1e-2,
            vocab_size: 11, device: "cpu".to_string(),
            ..TrainConfig::default()
        }
    }

    fn run(cfg: &TrainConfig, dir: &std::path::Path) -> (Result<TrainingReport>, CheckpointManager, MetricsLogger) {
        let ckpt = CheckpointManager::new(dir).unwrap();
        let metrics = MetricsLogger::new(dir).unwrap();
        let report = train_loop::<TestAutodiffBackend>(
            cfg, tiny_corpus(), &ckpt, &metrics, Default::default(),
        );
        (report, ckpt, metrics)
    }

    /// Validation losses column of metrics.csv, one per epoch run.
    fn logged_val_losses(metrics: &MetricsLogger) -> Vec<f64> {
        std::fs::read_to_string(metrics.csv_path()).unwrap()
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(4).unwrap().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_train_loop_checkpoints_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let (report, ckpt, metrics) = run(&tiny_config(3), dir.path());
        let report = report.unwrap();

        assert!(ckpt.checkpoint_path().exists());
        assert!(report.epochs_run >= 1 && report.epochs_run <= 3);
        assert!(report.test_loss.is_finite());
        assert!(report.outcome.is_terminal());
        assert!(report.encoder_params > 0);
        assert_eq!(logged_val_losses(&metrics).len(), report.epochs_run);
    }

    #[test]
    fn test_checkpoint_holds_best_validation_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(4);
        let (report, ckpt, metrics) = run(&cfg, dir.path());
        let report = report.unwrap();

        let losses = logged_val_losses(&metrics);
        let (best_idx, best) = losses.iter().enumerate()
            .fold((0, f64::INFINITY), |acc, (i, &l)| if l < acc.1 { (i, l) } else { acc });
        assert_eq!(report.best_epoch, best_idx + 1);
        assert!((report.best_loss - best).abs() < 1e-5);

        // rescoring the saved weights on the validation split gives the best loss back
        let reloaded = run_evaluation(&cfg, tiny_corpus().valid, &ckpt).unwrap();
        assert!((reloaded - report.best_loss).abs() < 1e-9);
    }

    #[test]
    fn test_flat_validation_loss_stops_on_patience() {
        // lr 0 leaves the weights untouched, so every validation loss is equal:
        // epoch 1 improves, epochs 2 and 3 stall, patience 2 stops the run
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { lr: 0.0, es_patience_max: 2, ..tiny_config(10) };
        let (report, ckpt, metrics) = run(&cfg, dir.path());
        let report = report.unwrap();

        assert_eq!(report.outcome, TrainingPhase::Stopped);
        assert_eq!(report.epochs_run, 3);
        assert_eq!(report.best_epoch, 1);
        assert_eq!(logged_val_losses(&metrics).len(), 3);

        let reloaded = run_evaluation(&cfg, tiny_corpus().valid, &ckpt).unwrap();
        assert!((reloaded - report.best_loss).abs() < 1e-9);
    }

    #[test]
    fn test_budget_exhausted_without_stall_is_done() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { es_patience_max: 100, ..tiny_config(2) };
        let (report, _, _) = run(&cfg, dir.path());
        let report = report.unwrap();
        assert_eq!(report.outcome, TrainingPhase::Done);
        assert_eq!(report.epochs_run, 2);
    }

    #[test]
    fn test_run_without_improvement_ignores_stale_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { lr: f64::NAN, ..tiny_config(2) };

        // weights from an earlier run in the same directory
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        ckpt.save_model(&cfg.model_config().init::<NdArray>(&device)).unwrap();
        assert!(ckpt.checkpoint_path().exists());

        // NaN learning rate: every validation loss is NaN and never improves
        let (report, ckpt, metrics) = run(&cfg, dir.path());
        assert!(report.is_err());
        assert!(!ckpt.checkpoint_path().exists());
        assert!(logged_val_losses(&metrics).iter().all(|l| l.is_nan()));
    }

    #[test]
    fn test_default_loading_is_reproducible() {
        let cfg = TrainConfig { dropout: 0.0, ..tiny_config(1) };
        let device: <TestAutodiffBackend as Backend>::Device = Default::default();
        let loader = || build_loader::<TestAutodiffBackend>(
            device.clone(), NgramDataset::new(tiny_corpus().train, cfg.n_gram).unwrap(), &cfg, true,
        );

        let order = |loader: Arc<dyn DataLoader<LmBatch<TestAutodiffBackend>>>| -> Vec<i64> {
            loader.iter()
                .flat_map(|b| b.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap())
                .collect()
        };
        assert_eq!(order(loader()), order(loader()));

        // same starting weights, same batches → same trained loss
        let model = cfg.model_config().init::<TestAutodiffBackend>(&device);
        let loss_fn = CrossEntropyLossConfig::new().init::<TestAutodiffBackend>(&device);
        let train_once = |model: NgramTransformer<TestAutodiffBackend>| {
            let mut optim = AdamConfig::new()
                .init::<TestAutodiffBackend, NgramTransformer<TestAutodiffBackend>>();
            epoch::train(loader().iter(), model, &loss_fn, &mut optim, cfg.lr).unwrap().1
        };
        assert_eq!(train_once(model.clone()), train_once(model));
    }

    #[test]
    fn test_train_loop_rejects_too_short_split() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let corpus = PreparedCorpus { test: vec![1, 2], ..tiny_corpus() };

        let result = train_loop::<TestAutodiffBackend>(
            &tiny_config(1), corpus, &ckpt, &metrics, Default::default(),
        );
        assert!(result.is_err());
    }
}

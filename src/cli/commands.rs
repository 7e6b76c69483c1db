// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the `train` and `evaluate` subcommands and their flags.
// Defaults mirror `TrainConfig::default()`.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the language model on a prepared token corpus
    Train(TrainArgs),

    /// Score the best checkpoint of a finished run on the test split
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Prepared corpus JSON: vocab_size plus train/valid/test token ids
    #[arg(long, default_value = "data/corpus.json")]
    pub corpus: String,

    /// Directory for the best checkpoint, the config and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of encoder layers (the decoder has the same depth)
    #[arg(long, default_value_t = 3)]
    pub n_layer: usize,

    /// Embedding / hidden width
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Attention heads; each head is d_model / n_head wide
    #[arg(long, default_value_t = 8)]
    pub n_head: usize,

    /// Inner width of the position-wise feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_inner: usize,

    /// Divide attention scores by sqrt(d_k)
    #[arg(long)]
    pub scaled_attn: bool,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Output projection: 0 tied + bias, 1 tied, 2 independent linear,
    /// anything else plain inner product with the embedding table
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub weight_sharing: i64,

    /// Context window length in tokens
    #[arg(long, default_value_t = 25)]
    pub n_gram: usize,

    #[arg(long, default_value_t = 1000)]
    pub batch_size: usize,

    /// Background data-loading workers. With 0, batches are built on the
    /// training thread in a fixed order and a seed reproduces the run;
    /// workers hand batches over in whatever order they finish
    #[arg(long, default_value_t = 0)]
    pub num_workers: usize,

    /// Upper bound on epochs; early stopping may end the run sooner
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Epochs between learning-rate decays
    #[arg(long, default_value_t = 20)]
    pub lr_step: usize,

    /// Multiplicative learning-rate decay factor
    #[arg(long, default_value_t = 0.1)]
    pub lr_gamma: f64,

    /// Adam L2 weight decay
    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    /// Non-improving epochs tolerated before stopping
    #[arg(long, default_value_t = 3)]
    pub es_patience_max: usize,

    /// Minimum validation-loss drop that resets patience
    #[arg(long, default_value_t = 0.0)]
    pub eps_loss: f64,

    #[arg(long, default_value_t = 1111)]
    pub seed: u64,

    /// cpu, wgpu, or wgpu:N for discrete GPU N
    #[arg(long, default_value = "wgpu")]
    pub device: String,
}

/// Boundary between Layer 1 and Layer 2: the application layer
/// never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            corpus_path:     a.corpus,
            checkpoint_dir:  a.checkpoint_dir,
            n_layer:         a.n_layer,
            d_model:         a.d_model,
            n_head:          a.n_head,
            d_inner:         a.d_inner,
            scaled_attn:     a.scaled_attn,
            dropout:         a.dropout,
            weight_sharing:  a.weight_sharing,
            n_gram:          a.n_gram,
            batch_size:      a.batch_size,
            num_workers:     a.num_workers,
            epochs:          a.epochs,
            lr:              a.lr,
            lr_step:         a.lr_step,
            lr_gamma:        a.lr_gamma,
            weight_decay:    a.weight_decay,
            es_patience_max: a.es_patience_max,
            eps_loss:        a.eps_loss,
            seed:            a.seed,
            device:          a.device,
            vocab_size:      0,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// The corpus the checkpoint was trained on
    #[arg(long, default_value = "data/corpus.json")]
    pub corpus: String,

    /// Directory written by a previous `train` run
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Override the device recorded in the saved config
    #[arg(long)]
    pub device: Option<String>,
}

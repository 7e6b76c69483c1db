// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — trains the language model on a prepared corpus
//   2. `evaluate` — reloads the best checkpoint, scores the test split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "transformer-lm",
    version = "0.1.0",
    about = "Train a fixed-window encoder-decoder Transformer language model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => Self::run_train(args),
            Commands::Evaluate(args) => Self::run_evaluate(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on corpus: {}", args.corpus);

        let report = TrainUseCase::new(args.into()).execute()?;

        println!(
            "Training {:?} after {} epochs. Best epoch {} checkpoint saved.",
            report.outcome, report.epochs_run, report.best_epoch,
        );
        Ok(())
    }

    fn run_evaluate(args: EvaluateArgs) -> Result<()> {
        use crate::application::evaluate_use_case::EvaluateUseCase;

        let use_case = EvaluateUseCase::new(args.corpus, args.checkpoint_dir, args.device);
        use_case.execute()?;
        Ok(())
    }
}

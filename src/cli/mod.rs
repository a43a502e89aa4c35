// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// The entry point for all user interaction. Uses `clap` to
// parse command line arguments; all work is delegated to
// Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — runs (or resumes) a training job
//   2. `eval`  — reports loss and accuracy of a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "slim-train",
    version,
    about = "Configure and run image-classification training on Burn."
)]
pub struct Cli {
    /// The subcommand to run (train or eval)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let outcome = TrainUseCase::new(args.into()).execute()?;

    match outcome.final_loss {
        Some(loss) => println!("Training finished at global step {} (loss {:.4}).", outcome.global_step, loss),
        None       => println!("Nothing to train: already at global step {}.", outcome.global_step),
    }
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let report = EvalUseCase::new(args.into()).execute()?;

    println!(
        "Global step {} ({} weights): {} examples | loss={:.4} | accuracy={:.2}%",
        report.global_step,
        if report.averaged { "moving-average" } else { "raw" },
        report.num_examples,
        report.mean_loss,
        report.accuracy * 100.0,
    );
    Ok(())
}

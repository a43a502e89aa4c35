// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `eval`, and all
// their flags.
//
// Scope lists accept either repeated flags or one
// comma-separated value:
//
//   --trainable-scopes logits,aux_logits
//   --trainable-scopes logits --trainable-scopes aux_logits
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{eval_use_case::EvalRequest, train_use_case::TrainRequest};
use crate::domain::config::TrainOverrides;
use crate::ml::{evaluator::EvalJob, trainer::TrainJob};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train an image classifier
    Train(TrainArgs),

    /// Evaluate the latest checkpoint of a training run
    Eval(EvalArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Data manifests: one `image_path,label` per line
    #[arg(long, required = true, num_args = 1..)]
    pub manifests: Vec<PathBuf>,

    /// Directory for checkpoints and summaries
    #[arg(long)]
    pub logdir: PathBuf,

    /// YAML training configuration
    #[arg(long)]
    pub config: PathBuf,

    /// Checkpoint file or directory to fine-tune from
    #[arg(long)]
    pub pretrained_model: Option<PathBuf>,

    /// Only variables under these scopes are trained
    #[arg(long, value_delimiter = ',')]
    pub trainable_scopes: Vec<String>,

    /// Variables under these scopes are not restored from --pretrained-model
    #[arg(long, value_delimiter = ',')]
    pub checkpoint_exclude_scopes: Vec<String>,

    /// Overrides NUM_TRAIN_ITERATIONS
    #[arg(long)]
    pub max_number_of_steps: Option<u64>,

    /// Overrides LEARNING_RATE_DECAY_TYPE (exponential, fixed, polynomial)
    #[arg(long)]
    pub learning_rate_decay_type: Option<String>,

    /// Overrides INITIAL_LEARNING_RATE
    #[arg(long)]
    pub lr: Option<f64>,

    /// Overrides BATCH_SIZE
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Overrides MODEL_NAME
    #[arg(long)]
    pub model_name: Option<String>,
}

/// An empty list means the flag was not given.
fn non_empty(scopes: Vec<String>) -> Option<Vec<String>> {
    (!scopes.is_empty()).then_some(scopes)
}

/// Convert CLI TrainArgs into the application-layer request.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainRequest {
    fn from(a: TrainArgs) -> Self {
        TrainRequest {
            config_path: a.config,
            overrides: TrainOverrides {
                max_number_of_steps:      a.max_number_of_steps,
                learning_rate_decay_type: a.learning_rate_decay_type,
                learning_rate:            a.lr,
                batch_size:               a.batch_size,
                model_name:               a.model_name,
            },
            job: TrainJob {
                manifests:                 a.manifests,
                logdir:                    a.logdir,
                pretrained_model:          a.pretrained_model,
                trainable_scopes:          non_empty(a.trainable_scopes),
                checkpoint_exclude_scopes: non_empty(a.checkpoint_exclude_scopes),
            },
        }
    }
}

/// All arguments for the `eval` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Data manifests to evaluate on
    #[arg(long, required = true, num_args = 1..)]
    pub manifests: Vec<PathBuf>,

    /// Log directory of the training run
    #[arg(long)]
    pub logdir: PathBuf,

    /// YAML configuration (defaults to the one saved in --logdir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Evaluate the raw weights instead of their moving averages
    #[arg(long)]
    pub no_moving_averages: bool,

    /// Overrides BATCH_SIZE
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl From<EvalArgs> for EvalRequest {
    fn from(a: EvalArgs) -> Self {
        EvalRequest {
            config_path: a.config,
            batch_size:  a.batch_size,
            job: EvalJob {
                manifests:           a.manifests,
                logdir:              a.logdir,
                use_moving_averages: !a.no_moving_averages,
            },
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_request(args: &[&str]) -> TrainRequest {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Train(args) => args.into(),
            other                 => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_train_flags_map_to_overrides() {
        let req = train_request(&[
            "slim-train", "train",
            "--manifests", "a.csv", "b.csv",
            "--logdir", "logs",
            "--config", "cfg.yaml",
            "--lr", "0.5",
            "--max-number-of-steps", "20",
        ]);

        assert_eq!(req.job.manifests, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(req.overrides.learning_rate, Some(0.5));
        assert_eq!(req.overrides.max_number_of_steps, Some(20));
        assert_eq!(req.overrides.batch_size, None);
        assert_eq!(req.overrides.model_name, None);
        assert_eq!(req.job.trainable_scopes, None);
    }

    #[test]
    fn test_scope_lists_split_on_commas() {
        let req = train_request(&[
            "slim-train", "train",
            "--manifests", "a.csv",
            "--logdir", "logs",
            "--config", "cfg.yaml",
            "--trainable-scopes", "logits,aux_logits",
            "--checkpoint-exclude-scopes", "logits",
        ]);

        assert_eq!(req.job.trainable_scopes, Some(vec!["logits".to_string(), "aux_logits".to_string()]));
        assert_eq!(req.job.checkpoint_exclude_scopes, Some(vec!["logits".to_string()]));
    }

    #[test]
    fn test_eval_defaults_to_moving_averages() {
        let cli = Cli::try_parse_from(["slim-train", "eval", "--manifests", "v.csv", "--logdir", "logs"]).unwrap();
        let Commands::Eval(args) = cli.command else { panic!("expected eval") };
        let req: EvalRequest = args.into();

        assert!(req.job.use_moving_averages);
        assert_eq!(req.config_path, None);
    }

    #[test]
    fn test_train_requires_config() {
        assert!(Cli::try_parse_from(["slim-train", "train", "--manifests", "a.csv", "--logdir", "l"]).is_err());
    }
}

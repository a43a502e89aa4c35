// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed errors for everything the domain layer can reject.
// Each variant names the offending value so the message
// printed by anyhow at the top level is enough to fix the
// config file without reading the source.
//
// The application layer wraps these in anyhow::Error, so
// callers can still downcast when they need the variant
// (the unit tests do exactly that).
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Recoverable Errors)

use std::path::PathBuf;
use thiserror::Error;

/// Rejections raised while turning configuration strings and
/// numbers into typed training components.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("learning_rate_decay_type [{0}] was not recognized")]
    UnknownDecayType(String),

    #[error("Optimizer [{0}] was not recognized")]
    UnknownOptimizer(String),

    #[error("model_name [{0}] was not recognized (available: {1})")]
    UnknownModel(String, String),

    #[error("resize_filter [{0}] was not recognized")]
    UnknownResizeFilter(String),

    #[error("device [{0}] was not recognized (expected `gpu` or `cpu`)")]
    UnknownDevice(String),

    /// NUM_TRAIN_EXAMPLES / BATCH_SIZE * NUM_EPOCHS_PER_DECAY rounded down to 0
    #[error("decay_steps computed as 0 for decay type [{0}]; check NUM_TRAIN_EXAMPLES, BATCH_SIZE and NUM_EPOCHS_PER_DECAY")]
    ZeroDecaySteps(String),

    #[error("BATCH_SIZE must be at least 1")]
    ZeroBatchSize,

    #[error("label {label} in '{file}' is out of range for NUM_CLASSES={num_classes}")]
    LabelOutOfRange {
        file:        String,
        label:       usize,
        num_classes: usize,
    },
}

/// Failures locating checkpoints on disk.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("No model checkpoint file found in directory {}", .0.display())]
    NoCheckpointInDirectory(PathBuf),

    #[error("checkpoint index '{}' is corrupt: {reason}", .path.display())]
    CorruptIndex {
        path:   PathBuf,
        reason: String,
    },
}

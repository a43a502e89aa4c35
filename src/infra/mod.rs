// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the log directory or the config
// file on disk:
//
//   checkpoint.rs  — Saving and restoring training state
//                    Burn records for model, moving averages
//                    and optimizer, a JSON index with the
//                    retention policy, the resolved config,
//                    and the resume / fine-tune decision.
//
//   summary.rs     — Scalar summaries
//                    Appends loss and learning rate to a CSV
//                    file at a fixed wall-clock interval.
//
//   config_file.rs — Reads the YAML training configuration.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Checkpoint records, index, retention and start-point lookup
pub mod checkpoint;

/// Scalar summary CSV writer
pub mod summary;

/// YAML config file reader
pub mod config_file;

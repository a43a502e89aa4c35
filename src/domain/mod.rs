// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types and decisions — the "what" of a training
// run, with no Burn types, no file I/O and no tensors.
//
//   config.rs        — TrainConfig record + command-line overrides
//   learning_rate.rs — decay type → LearningRateSchedule
//   optimizer.rs     — optimizer name → OptimizerSpec
//   scopes.rs        — prefix filtering of variable names
//   example.rs       — one labelled image reference
//   traits.rs        — ExampleSource abstraction
//   errors.rs        — typed configuration / checkpoint errors
//
// Everything here is unit-testable without a device.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod config;
pub mod errors;
pub mod example;
pub mod learning_rate;
pub mod optimizer;
pub mod scopes;
pub mod traits;

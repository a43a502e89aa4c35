// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// All Burn model and optimization code lives here.
//
//   backend.rs   — SESSION_CONFIG.DEVICE → Wgpu or NdArray
//
//   nets.rs      — The network zoo (lenet, cifarnet,
//                  inception_mini) behind the Classifier trait
//
//   variables.rs — Named access to parameters: listing,
//                  snapshots, restore-by-name, gradient
//                  filtering and the L2 penalty
//
//   optim.rs     — Burn's Adam / RMSProp / SGD plus Adadelta,
//                  Adagrad and FTRL as SimpleOptimizers
//
//   ema.rs       — Exponential moving average of parameters
//
//   trainer.rs   — The step loop: loss, update, averaging,
//                  summaries and checkpoints
//
//   evaluator.rs — Loss / accuracy of a saved checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Backend selection
pub mod backend;

/// Classification networks
pub mod nets;

/// Parameter naming and visitors
pub mod variables;

/// Optimizer construction and custom optimizers
pub mod optim;

/// Parameter moving averages
pub mod ema;

/// Training loop with checkpointing
pub mod trainer;

/// Checkpoint evaluation
pub mod evaluator;

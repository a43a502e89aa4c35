// ============================================================
// Layer 5 — Exponential Moving Average of Parameters
// ============================================================
// Keeps a "shadow" copy of every model variable:
//
//   shadow ← shadow − (1 − decay_t) · (shadow − variable)
//
// with a warm-up on the decay so early, noisy steps do not
// dominate the average:
//
//   decay_t = min(decay, (1 + step) / (10 + step))
//
// The shadow values are what evaluation uses. They are saved
// next to every checkpoint as a full model record (ema-<step>),
// so an evaluator can load them exactly like raw weights.
//
// Shadows live on the inner (non-autodiff) backend: averaging
// is bookkeeping, not something to differentiate through.

use std::collections::{hash_map::Entry, HashMap};

use burn::prelude::*;

use crate::ml::variables::{assign_values, collect_values};

pub struct ExponentialMovingAverage<B: Backend> {
    decay:  f64,
    shadow: HashMap<String, Tensor<B, 1>>,
}

impl<B: Backend> ExponentialMovingAverage<B> {
    pub fn new(decay: f64) -> Self {
        Self { decay, shadow: HashMap::new() }
    }

    /// Decay actually used after `num_updates` steps
    pub fn effective_decay(&self, num_updates: u64) -> f64 {
        let n = num_updates as f64;
        self.decay.min((1.0 + n) / (10.0 + n))
    }

    /// Fold the current variable values into the shadows.
    /// A variable seen for the first time starts its shadow at its value.
    pub fn apply<M: Module<B>>(&mut self, module: &M, num_updates: u64) {
        let keep = 1.0 - self.effective_decay(num_updates);

        for (name, value) in collect_values::<B, M>(module) {
            match self.shadow.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    let shadow = slot.get().clone();
                    slot.insert(shadow.clone() - (shadow - value).mul_scalar(keep));
                }
            }
        }
    }

    /// `module` with every tracked variable replaced by its shadow
    pub fn averaged<M: Module<B>>(&self, module: M) -> M {
        let (module, replaced) = assign_values(module, &self.shadow);
        tracing::trace!("Swapped in {} moving averages", replaced);
        module
    }

    /// Seed the shadows from a module that already holds averages
    /// (used when resuming from a checkpoint).
    pub fn load_from<M: Module<B>>(&mut self, averaged: &M) {
        self.shadow = collect_values::<B, M>(averaged);
    }

    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::nets::{LeNet, NetConfig};
    use burn::backend::NdArray;

    type TB = NdArray;

    fn sum_of(module: &LeNet<TB>, name: &str) -> f32 {
        collect_values::<TB, _>(module)[name].clone().sum().into_scalar().elem()
    }

    #[test]
    fn test_effective_decay_warms_up() {
        let ema = ExponentialMovingAverage::<TB>::new(0.9999);
        assert!((ema.effective_decay(0) - 0.1).abs() < 1e-12);
        assert!((ema.effective_decay(90) - 0.91).abs() < 1e-12);
        // long after warm-up the configured decay wins
        assert!((ema.effective_decay(10_000_000) - 0.9999).abs() < 1e-12);
    }

    #[test]
    fn test_first_apply_copies_values() {
        let net = NetConfig::new(2, 8).init_lenet::<TB>(&Default::default());
        let mut ema = ExponentialMovingAverage::new(0.99);
        assert!(ema.is_empty());

        ema.apply(&net, 0);
        let averaged = ema.averaged(net.clone());
        assert!((sum_of(&averaged, "fc3.weight") - sum_of(&net, "fc3.weight")).abs() < 1e-4);
    }

    #[test]
    fn test_update_moves_toward_new_value() {
        let device = Default::default();
        let a = NetConfig::new(2, 8).init_lenet::<TB>(&device);
        let b = NetConfig::new(2, 8).init_lenet::<TB>(&device);

        // decay 0.5 at step 100 (0.5 < 101/110)
        let mut ema = ExponentialMovingAverage::new(0.5);
        ema.apply(&a, 100);
        ema.apply(&b, 100);

        let expected = 0.5 * sum_of(&a, "conv1.bias") + 0.5 * sum_of(&b, "conv1.bias");
        let averaged = ema.averaged(a.clone());
        assert!((sum_of(&averaged, "conv1.bias") - expected).abs() < 1e-4);
    }
}

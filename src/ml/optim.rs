// ============================================================
// Layer 5 — Optimizers
// ============================================================
// Burn ships Adam and SGD (with optional momentum). Adadelta,
// Adagrad-with-initial-accumulator and FTRL are not in
// burn::optim, and Burn's RMSProp keeps ε outside the square
// root with the mean square starting at zero, so these four
// are written here as SimpleOptimizers
// and wrapped in Burn's OptimizerAdaptor — from the trainer's
// point of view every optimizer is just `impl Optimizer<M, B>`.
//
// Update rules (g = gradient, lr = learning rate):
//
//   Adadelta   a  ← ρ·a + (1−ρ)·g²
//              Δ  = √(u + ε) / √(a + ε) · g
//              u  ← ρ·u + (1−ρ)·Δ²
//              θ  ← θ − lr·Δ
//
//   Adagrad    a  ← a + g²                (a starts at a₀)
//              θ  ← θ − lr·g / √a
//
//   RMSProp    s  ← ρ·s + (1−ρ)·g²        (s starts at 1)
//              m  ← μ·m + lr·g / √(s + ε)
//              θ  ← θ − m
//
//   FTRL       n' = n + g²
//              σ  = (n'^(−p) − n^(−p)) / lr
//              z  ← z + g − σ·θ
//              q  = n'^(−p) / lr + 2·l2
//              θ  ← (clip(z, −l1, l1) − z) / q
//              (p = learning_rate_power, n starts at n₀)
//
// Reference: Zeiler (2012) ADADELTA
//            Duchi et al. (2011) Adagrad
//            Tieleman & Hinton (2012) Lecture 6.5, RMSProp
//            McMahan et al. (2013) Ad Click Prediction (FTRL-Proximal)

use burn::{
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor, momentum::MomentumConfig, AdamConfig, LearningRate, Optimizer,
        SgdConfig, SimpleOptimizer,
    },
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
};

// ─── Adadelta ─────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Adadelta {
    pub rho:     f64,
    pub epsilon: f64,
}

#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub accum:        Tensor<B, D>,
    pub accum_update: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (accum, accum_update) = match state {
            Some(s) => (s.accum, s.accum_update),
            None    => (grad.zeros_like(), grad.zeros_like()),
        };

        let accum = accum.mul_scalar(self.rho) + grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho);
        let update = accum_update.clone().add_scalar(self.epsilon).sqrt()
            / accum.clone().add_scalar(self.epsilon).sqrt()
            * grad;
        let accum_update =
            accum_update.mul_scalar(self.rho) + update.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho);

        let tensor = tensor - update.mul_scalar(lr);
        (tensor, Some(AdadeltaState { accum, accum_update }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        AdadeltaState {
            accum:        state.accum.to_device(device),
            accum_update: state.accum_update.to_device(device),
        }
    }
}

// ─── Adagrad ──────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Adagrad {
    pub initial_accumulator_value: f64,
}

#[derive(Record, Clone)]
pub struct AdagradState<B: Backend, const D: usize> {
    pub accum: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adagrad {
    type State<const D: usize> = AdagradState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let accum = match state {
            Some(s) => s.accum,
            None    => grad.zeros_like().add_scalar(self.initial_accumulator_value),
        };

        let accum  = accum + grad.clone().powf_scalar(2.0);
        let tensor = tensor - (grad / accum.clone().sqrt()).mul_scalar(lr);
        (tensor, Some(AdagradState { accum }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        AdagradState { accum: state.accum.to_device(device) }
    }
}

// ─── RMSProp ──────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct RmsProp {
    pub decay:    f64,
    pub momentum: f64,
    pub epsilon:  f64,
}

#[derive(Record, Clone)]
pub struct RmsPropState<B: Backend, const D: usize> {
    pub mean_square: Tensor<B, D>,
    pub moment:      Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for RmsProp {
    type State<const D: usize> = RmsPropState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (mean_square, moment) = match state {
            Some(s) => (s.mean_square, s.moment),
            None    => (grad.ones_like(), grad.zeros_like()),
        };

        let mean_square = mean_square.mul_scalar(self.decay)
            + grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.decay);
        let moment = moment.mul_scalar(self.momentum)
            + (grad / mean_square.clone().add_scalar(self.epsilon).sqrt()).mul_scalar(lr);

        let tensor = tensor - moment.clone();
        (tensor, Some(RmsPropState { mean_square, moment }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        RmsPropState {
            mean_square: state.mean_square.to_device(device),
            moment:      state.moment.to_device(device),
        }
    }
}

// ─── FTRL-Proximal ────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Ftrl {
    pub learning_rate_power:       f64,
    pub initial_accumulator_value: f64,
    pub l1:                        f64,
    pub l2:                        f64,
}

#[derive(Record, Clone)]
pub struct FtrlState<B: Backend, const D: usize> {
    pub accum:  Tensor<B, D>,
    pub linear: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Ftrl {
    type State<const D: usize> = FtrlState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (accum, linear) = match state {
            Some(s) => (s.accum, s.linear),
            None    => (
                grad.zeros_like().add_scalar(self.initial_accumulator_value),
                grad.zeros_like(),
            ),
        };

        let power     = -self.learning_rate_power;
        let new_accum = accum.clone() + grad.clone().powf_scalar(2.0);
        let sigma     = (new_accum.clone().powf_scalar(power) - accum.powf_scalar(power)).div_scalar(lr);
        let linear    = linear + grad - sigma * tensor;
        let quadratic = new_accum.clone().powf_scalar(power).div_scalar(lr).add_scalar(2.0 * self.l2);

        let shrunk = linear.clone().clamp(-self.l1, self.l1) - linear.clone();
        let tensor = shrunk / quadratic;

        (tensor, Some(FtrlState { accum: new_accum, linear }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        FtrlState {
            accum:  state.accum.to_device(device),
            linear: state.linear.to_device(device),
        }
    }
}

// ─── Constructors ─────────────────────────────────────────────────────────────
// One function per optimizer so the trainer's dispatch stays a flat
// match; each returns a ready-to-step Burn optimizer.

pub fn adadelta<B: AutodiffBackend, M: AutodiffModule<B>>(rho: f64, epsilon: f64) -> impl Optimizer<M, B> {
    OptimizerAdaptor::from(Adadelta { rho, epsilon })
}

pub fn adagrad<B: AutodiffBackend, M: AutodiffModule<B>>(initial_accumulator_value: f64) -> impl Optimizer<M, B> {
    OptimizerAdaptor::from(Adagrad { initial_accumulator_value })
}

pub fn adam<B: AutodiffBackend, M: AutodiffModule<B>>(beta1: f64, beta2: f64, epsilon: f64) -> impl Optimizer<M, B> {
    AdamConfig::new()
        .with_beta_1(beta1 as f32)
        .with_beta_2(beta2 as f32)
        .with_epsilon(epsilon as f32)
        .init()
}

pub fn ftrl<B: AutodiffBackend, M: AutodiffModule<B>>(
    learning_rate_power:       f64,
    initial_accumulator_value: f64,
    l1:                        f64,
    l2:                        f64,
) -> impl Optimizer<M, B> {
    OptimizerAdaptor::from(Ftrl { learning_rate_power, initial_accumulator_value, l1, l2 })
}

/// Heavy-ball momentum: v ← m·v + g, θ ← θ − lr·v
pub fn momentum<B: AutodiffBackend, M: AutodiffModule<B>>(momentum: f64) -> impl Optimizer<M, B> {
    SgdConfig::new()
        .with_momentum(Some(
            MomentumConfig::new()
                .with_momentum(momentum)
                .with_dampening(0.0)
                .with_nesterov(false),
        ))
        .init()
}

pub fn rmsprop<B: AutodiffBackend, M: AutodiffModule<B>>(decay: f64, momentum: f64, epsilon: f64) -> impl Optimizer<M, B> {
    OptimizerAdaptor::from(RmsProp { decay, momentum, epsilon })
}

pub fn sgd<B: AutodiffBackend, M: AutodiffModule<B>>() -> impl Optimizer<M, B> {
    SgdConfig::new().init()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TB = NdArray;

    fn t(values: &[f32]) -> Tensor<TB, 1> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), &Default::default())
    }

    fn to_vec(t: Tensor<TB, 1>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn assert_close(got: &[f32], want: &[f32]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-5, "got {got:?}, want {want:?}");
        }
    }

    #[test]
    fn test_adagrad_first_step() {
        let opt = Adagrad { initial_accumulator_value: 0.1 };
        let (theta, state) = SimpleOptimizer::<TB>::step(&opt, 0.5, t(&[1.0, -2.0]), t(&[0.3, -0.4]), None);

        // a = 0.1 + g²; θ − 0.5·g/√a
        let a0 = 0.1f32 + 0.09;
        let a1 = 0.1f32 + 0.16;
        assert_close(&to_vec(theta), &[1.0 - 0.5 * 0.3 / a0.sqrt(), -2.0 + 0.5 * 0.4 / a1.sqrt()]);
        assert_close(&to_vec(state.unwrap().accum), &[a0, a1]);
    }

    #[test]
    fn test_adagrad_accumulates_across_steps() {
        let opt = Adagrad { initial_accumulator_value: 0.0 };
        let (theta, state) = SimpleOptimizer::<TB>::step(&opt, 1.0, t(&[0.0]), t(&[1.0]), None);
        let (theta, _)     = SimpleOptimizer::<TB>::step(&opt, 1.0, theta, t(&[1.0]), state);
        // −1/√1 − 1/√2
        assert_close(&to_vec(theta), &[-1.0 - 1.0 / 2f32.sqrt()]);
    }

    #[test]
    fn test_adadelta_first_step() {
        let opt = Adadelta { rho: 0.9, epsilon: 1e-6 };
        let (theta, state) = SimpleOptimizer::<TB>::step(&opt, 1.0, t(&[1.0]), t(&[2.0]), None);

        let accum  = 0.1f32 * 4.0;
        let update = (1e-6f32).sqrt() / (accum + 1e-6).sqrt() * 2.0;
        assert_close(&to_vec(theta), &[1.0 - update]);

        let state = state.unwrap();
        assert_close(&to_vec(state.accum), &[accum]);
        assert_close(&to_vec(state.accum_update), &[0.1 * update * update]);
    }

    #[test]
    fn test_rmsprop_epsilon_inside_root_and_unit_start() {
        let opt = RmsProp { decay: 0.9, momentum: 0.0, epsilon: 1.0 };
        let (theta, state) = SimpleOptimizer::<TB>::step(&opt, 0.1, t(&[1.0]), t(&[2.0]), None);

        // s = 0.9·1 + 0.1·4 = 1.3; Δ = 0.1·2 / √(1.3 + 1)
        let step = 0.1f32 * 2.0 / 2.3f32.sqrt();
        assert_close(&to_vec(theta), &[1.0 - step]);

        let state = state.unwrap();
        assert_close(&to_vec(state.mean_square), &[1.3]);
        assert_close(&to_vec(state.moment), &[step]);
    }

    #[test]
    fn test_rmsprop_momentum_carries_previous_step() {
        let opt = RmsProp { decay: 0.5, momentum: 0.9, epsilon: 0.0 };
        let (theta, state) = SimpleOptimizer::<TB>::step(&opt, 1.0, t(&[0.0]), t(&[1.0]), None);
        let (theta, _)     = SimpleOptimizer::<TB>::step(&opt, 1.0, theta, t(&[1.0]), state);

        // s stays 1, so each raw step is 1; m₂ = 0.9·1 + 1
        assert_close(&to_vec(theta), &[-1.0 - 1.9]);
    }

    #[test]
    fn test_ftrl_without_regularisation() {
        let opt = Ftrl {
            learning_rate_power:       -0.5,
            initial_accumulator_value: 0.1,
            l1:                        0.0,
            l2:                        0.0,
        };
        let (theta, state) = SimpleOptimizer::<TB>::step(&opt, 0.5, t(&[0.0]), t(&[1.0]), None);

        // n' = 1.1, z = 1, q = √1.1 / 0.5, θ = −z / q
        let q = 1.1f32.sqrt() / 0.5;
        assert_close(&to_vec(theta), &[-1.0 / q]);
        let state = state.unwrap();
        assert_close(&to_vec(state.accum), &[1.1]);
        assert_close(&to_vec(state.linear), &[1.0]);
    }

    #[test]
    fn test_ftrl_l1_zeroes_small_weights() {
        let opt = Ftrl {
            learning_rate_power:       -0.5,
            initial_accumulator_value: 0.1,
            l1:                        2.0,
            l2:                        0.0,
        };
        // |z| = 1 < l1 → weight snaps to 0
        let (theta, _) = SimpleOptimizer::<TB>::step(&opt, 0.5, t(&[0.0]), t(&[1.0]), None);
        assert_close(&to_vec(theta), &[0.0]);
    }
}

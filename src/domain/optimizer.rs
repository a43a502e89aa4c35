// ============================================================
// Layer 3 — Optimizer Selection
// ============================================================
// Turns the OPTIMIZER string plus its hyperparameters into a
// typed OptimizerSpec. No Burn types here — Layer 5 turns the
// spec into a real optimizer (ml/optim.rs).
//
// Supported names and the config keys each one reads:
//
//   adadelta  ADADELTA_RHO, OPTIMIZER_EPSILON
//   adagrad   ADAGRAD_INITIAL_ACCUMULATOR_VALUE
//   adam      ADAM_BETA1, ADAM_BETA2, OPTIMIZER_EPSILON
//   ftrl      FTRL_LEARNING_RATE_POWER, FTRL_INITIAL_ACCUMULATOR_VALUE,
//             FTRL_L1, FTRL_L2
//   momentum  MOMENTUM
//   rmsprop   RMSPROP_DECAY, MOMENTUM, OPTIMIZER_EPSILON
//   sgd       (none)

use crate::domain::config::TrainConfig;
use crate::domain::errors::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerSpec {
    Adadelta {
        rho:     f64,
        epsilon: f64,
    },
    Adagrad {
        initial_accumulator_value: f64,
    },
    Adam {
        beta1:   f64,
        beta2:   f64,
        epsilon: f64,
    },
    Ftrl {
        learning_rate_power:       f64,
        initial_accumulator_value: f64,
        l1:                        f64,
        l2:                        f64,
    },
    Momentum {
        momentum: f64,
    },
    RmsProp {
        decay:    f64,
        momentum: f64,
        epsilon:  f64,
    },
    Sgd,
}

impl OptimizerSpec {
    /// Short lowercase name, as written in the config file
    pub fn name(&self) -> &'static str {
        match self {
            Self::Adadelta { .. } => "adadelta",
            Self::Adagrad { .. }  => "adagrad",
            Self::Adam { .. }     => "adam",
            Self::Ftrl { .. }     => "ftrl",
            Self::Momentum { .. } => "momentum",
            Self::RmsProp { .. }  => "rmsprop",
            Self::Sgd             => "sgd",
        }
    }
}

/// Pick the optimizer named by `OPTIMIZER` and collect its hyperparameters.
pub fn configure_optimizer(cfg: &TrainConfig) -> Result<OptimizerSpec, ConfigError> {
    let spec = match cfg.optimizer.as_str() {
        "adadelta" => OptimizerSpec::Adadelta {
            rho:     cfg.adadelta_rho,
            epsilon: cfg.optimizer_epsilon,
        },
        "adagrad" => OptimizerSpec::Adagrad {
            initial_accumulator_value: cfg.adagrad_initial_accumulator_value,
        },
        "adam" => OptimizerSpec::Adam {
            beta1:   cfg.adam_beta1,
            beta2:   cfg.adam_beta2,
            epsilon: cfg.optimizer_epsilon,
        },
        "ftrl" => OptimizerSpec::Ftrl {
            learning_rate_power:       cfg.ftrl_learning_rate_power,
            initial_accumulator_value: cfg.ftrl_initial_accumulator_value,
            l1:                        cfg.ftrl_l1,
            l2:                        cfg.ftrl_l2,
        },
        "momentum" => OptimizerSpec::Momentum {
            momentum: cfg.momentum,
        },
        "rmsprop" => OptimizerSpec::RmsProp {
            decay:    cfg.rmsprop_decay,
            momentum: cfg.momentum,
            epsilon:  cfg.optimizer_epsilon,
        },
        "sgd" => OptimizerSpec::Sgd,
        other => return Err(ConfigError::UnknownOptimizer(other.to_string())),
    };
    Ok(spec)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg_for(name: &str) -> TrainConfig {
        TrainConfig {
            optimizer:                         name.to_string(),
            optimizer_epsilon:                 1e-3,
            adadelta_rho:                      0.9,
            adagrad_initial_accumulator_value: 0.2,
            adam_beta1:                        0.8,
            adam_beta2:                        0.99,
            ftrl_learning_rate_power:          -0.5,
            ftrl_initial_accumulator_value:    0.3,
            ftrl_l1:                           0.01,
            ftrl_l2:                           0.02,
            momentum:                          0.7,
            rmsprop_decay:                     0.95,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_each_name_maps_to_its_variant() {
        let cases = vec![
            ("adadelta", OptimizerSpec::Adadelta { rho: 0.9, epsilon: 1e-3 }),
            ("adagrad",  OptimizerSpec::Adagrad { initial_accumulator_value: 0.2 }),
            ("adam",     OptimizerSpec::Adam { beta1: 0.8, beta2: 0.99, epsilon: 1e-3 }),
            ("ftrl",     OptimizerSpec::Ftrl {
                learning_rate_power:       -0.5,
                initial_accumulator_value: 0.3,
                l1:                        0.01,
                l2:                        0.02,
            }),
            ("momentum", OptimizerSpec::Momentum { momentum: 0.7 }),
            ("rmsprop",  OptimizerSpec::RmsProp { decay: 0.95, momentum: 0.7, epsilon: 1e-3 }),
            ("sgd",      OptimizerSpec::Sgd),
        ];

        for (name, expected) in cases {
            let spec = configure_optimizer(&cfg_for(name)).unwrap();
            assert_eq!(spec, expected);
            assert_eq!(spec.name(), name);
        }
    }

    #[test]
    fn test_unknown_optimizer_names_value() {
        let err = configure_optimizer(&cfg_for("lamb")).unwrap_err();
        assert_eq!(err, ConfigError::UnknownOptimizer("lamb".to_string()));
        assert_eq!(err.to_string(), "Optimizer [lamb] was not recognized");
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(configure_optimizer(&cfg_for("Adam")).is_err());
    }
}

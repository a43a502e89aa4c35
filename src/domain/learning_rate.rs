// ============================================================
// Layer 3 — Learning-Rate Schedules
// ============================================================
// A schedule maps the global step to a scalar learning rate.
// Three decay types are supported:
//
//   exponential  lr = initial * factor ^ (step / decay_steps)
//                (exponent floored when staircase = true)
//
//   fixed        lr = initial
//
//   polynomial   s  = min(step, decay_steps)
//                lr = (initial - end) * (1 - s / decay_steps) ^ power + end
//
// decay_steps is derived from the dataset size:
//   floor(NUM_TRAIN_EXAMPLES / BATCH_SIZE * NUM_EPOCHS_PER_DECAY)
//
// The schedule is a plain value — the training loop asks it
// for the rate of every step and passes that to the optimizer.
//
// Reference: Goodfellow et al. (2016) §8.3 (learning-rate decay)

use std::str::FromStr;

use crate::domain::config::TrainConfig;
use crate::domain::errors::ConfigError;

// ─── DecayType ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayType {
    Exponential,
    Fixed,
    Polynomial,
}

impl FromStr for DecayType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exponential" => Ok(Self::Exponential),
            "fixed"       => Ok(Self::Fixed),
            "polynomial"  => Ok(Self::Polynomial),
            other         => Err(ConfigError::UnknownDecayType(other.to_string())),
        }
    }
}

// ─── LearningRateSchedule ─────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub enum LearningRateSchedule {
    Exponential {
        initial:      f64,
        decay_steps:  u64,
        decay_factor: f64,
        staircase:    bool,
    },
    Fixed(f64),
    Polynomial {
        initial:     f64,
        decay_steps: u64,
        end:         f64,
        power:       f64,
    },
}

impl LearningRateSchedule {
    /// Learning rate for the given global step
    pub fn at(&self, step: u64) -> f64 {
        match *self {
            Self::Exponential { initial, decay_steps, decay_factor, staircase } => {
                let mut p = step as f64 / decay_steps as f64;
                if staircase {
                    p = p.floor();
                }
                initial * decay_factor.powf(p)
            }
            Self::Fixed(lr) => lr,
            Self::Polynomial { initial, decay_steps, end, power } => {
                let s = step.min(decay_steps) as f64;
                (initial - end) * (1.0 - s / decay_steps as f64).powf(power) + end
            }
        }
    }
}

/// Number of steps in one decay period.
pub fn decay_steps(cfg: &TrainConfig) -> Result<u64, ConfigError> {
    if cfg.batch_size == 0 {
        return Err(ConfigError::ZeroBatchSize);
    }
    let steps = cfg.num_train_examples as f64 / cfg.batch_size as f64 * cfg.num_epochs_per_decay;
    Ok(steps.floor().max(0.0) as u64)
}

/// Build the schedule named by `LEARNING_RATE_DECAY_TYPE`.
pub fn configure_learning_rate(cfg: &TrainConfig) -> Result<LearningRateSchedule, ConfigError> {
    let decay_type: DecayType = cfg.learning_rate_decay_type.parse()?;

    let schedule = match decay_type {
        DecayType::Fixed => LearningRateSchedule::Fixed(cfg.initial_learning_rate),
        DecayType::Exponential | DecayType::Polynomial => {
            let decay_steps = decay_steps(cfg)?;
            if decay_steps == 0 {
                return Err(ConfigError::ZeroDecaySteps(cfg.learning_rate_decay_type.clone()));
            }
            if decay_type == DecayType::Exponential {
                LearningRateSchedule::Exponential {
                    initial:      cfg.initial_learning_rate,
                    decay_steps,
                    decay_factor: cfg.learning_rate_decay_factor,
                    staircase:    cfg.learning_rate_staircase,
                }
            } else {
                LearningRateSchedule::Polynomial {
                    initial:     cfg.initial_learning_rate,
                    decay_steps,
                    end:         cfg.end_learning_rate,
                    power:       1.0,
                }
            }
        }
    };

    tracing::debug!("Learning-rate schedule: {:?}", schedule);
    Ok(schedule)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn base_cfg(decay_type: &str) -> TrainConfig {
        TrainConfig {
            learning_rate_decay_type:   decay_type.to_string(),
            initial_learning_rate:      0.1,
            num_train_examples:         1000,
            batch_size:                 10,
            num_epochs_per_decay:       2.0,
            learning_rate_decay_factor: 0.5,
            learning_rate_staircase:    true,
            end_learning_rate:          0.01,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_decay_steps_from_dataset_size() {
        // 1000 / 10 * 2 = 200
        assert_eq!(decay_steps(&base_cfg("fixed")).unwrap(), 200);
    }

    #[test]
    fn test_decay_steps_truncates() {
        let cfg = TrainConfig {
            num_train_examples:   100,
            batch_size:           3,
            num_epochs_per_decay: 1.0,
            ..TrainConfig::default()
        };
        assert_eq!(decay_steps(&cfg).unwrap(), 33);
    }

    #[test]
    fn test_exponential_maps_config() {
        let schedule = configure_learning_rate(&base_cfg("exponential")).unwrap();
        assert_eq!(
            schedule,
            LearningRateSchedule::Exponential {
                initial:      0.1,
                decay_steps:  200,
                decay_factor: 0.5,
                staircase:    true,
            }
        );
    }

    #[test]
    fn test_exponential_staircase_values() {
        let schedule = configure_learning_rate(&base_cfg("exponential")).unwrap();
        assert!(approx(schedule.at(0),   0.1));
        assert!(approx(schedule.at(199), 0.1));
        assert!(approx(schedule.at(200), 0.05));
        assert!(approx(schedule.at(450), 0.025));
    }

    #[test]
    fn test_exponential_continuous_values() {
        let mut cfg = base_cfg("exponential");
        cfg.learning_rate_staircase = false;
        let schedule = configure_learning_rate(&cfg).unwrap();
        // half a decay period → factor^0.5
        assert!(approx(schedule.at(100), 0.1 * 0.5f64.sqrt()));
    }

    #[test]
    fn test_fixed_is_constant() {
        let schedule = configure_learning_rate(&base_cfg("fixed")).unwrap();
        assert_eq!(schedule, LearningRateSchedule::Fixed(0.1));
        assert!(approx(schedule.at(0), 0.1));
        assert!(approx(schedule.at(1_000_000), 0.1));
    }

    #[test]
    fn test_polynomial_linear_decay_then_floor() {
        let schedule = configure_learning_rate(&base_cfg("polynomial")).unwrap();
        assert!(approx(schedule.at(0),   0.1));
        assert!(approx(schedule.at(100), 0.055));
        assert!(approx(schedule.at(200), 0.01));
        // No cycling: stays at the end rate
        assert!(approx(schedule.at(5000), 0.01));
    }

    #[test]
    fn test_unknown_decay_type_names_value() {
        let err = configure_learning_rate(&base_cfg("cosine")).unwrap_err();
        assert_eq!(err, ConfigError::UnknownDecayType("cosine".to_string()));
        assert!(err.to_string().contains("[cosine]"));
    }

    #[test]
    fn test_zero_decay_steps_rejected() {
        let mut cfg = base_cfg("exponential");
        cfg.num_train_examples = 5;
        assert_eq!(
            configure_learning_rate(&cfg).unwrap_err(),
            ConfigError::ZeroDecaySteps("exponential".to_string())
        );
        // fixed does not need decay steps
        cfg.learning_rate_decay_type = "fixed".to_string();
        assert!(configure_learning_rate(&cfg).is_ok());
    }
}

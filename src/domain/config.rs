// ============================================================
// Layer 3 — Training Configuration Record
// ============================================================
// The single record that drives a training run.
//
// It is read from a YAML file whose keys are written in
// UPPER_SNAKE_CASE (e.g. BATCH_SIZE, OPTIMIZER), then a few
// fields may be replaced by command-line overrides.
//
// Every field has a default, so a config file only needs
// the keys it wants to change:
//
//   MODEL_NAME: lenet
//   NUM_CLASSES: 10
//   OPTIMIZER: momentum
//   LEARNING_RATE_DECAY_TYPE: polynomial
//
// String-valued choices (decay type, optimizer, model name)
// stay as plain strings here. They are validated when the
// component is built, so the error names the exact value
// that came from the file or the command line.
//
// Reference: serde documentation (container attributes)
//            Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

// ─── TrainConfig ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TrainConfig {
    // ── Model ────────────────────────────────────────────────────────────────
    pub model_name:        String,
    pub num_classes:       usize,
    pub weight_decay:      f64,
    pub dropout_keep_prob: f64,
    pub label_smoothing:   f32,

    // ── Input pipeline ───────────────────────────────────────────────────────
    pub batch_size:         usize,
    pub num_train_examples: usize,
    pub num_input_threads:  usize,
    pub shuffle_queue:      bool,
    pub random_seed:        u64,
    pub queue_capacity:     usize,
    pub queue_min:          usize,
    pub image_processing:   ImageProcessingConfig,

    // ── Learning rate ────────────────────────────────────────────────────────
    pub learning_rate_decay_type:   String,
    pub initial_learning_rate:      f64,
    #[serde(alias = "NUM_EPOCHS_PER_DELAY")]
    pub num_epochs_per_decay:       f64,
    pub learning_rate_decay_factor: f64,
    pub learning_rate_staircase:    bool,
    pub end_learning_rate:          f64,

    // ── Optimizer ────────────────────────────────────────────────────────────
    pub optimizer:                         String,
    pub optimizer_epsilon:                 f64,
    pub adadelta_rho:                      f64,
    pub adagrad_initial_accumulator_value: f64,
    pub adam_beta1:                        f64,
    pub adam_beta2:                        f64,
    pub ftrl_learning_rate_power:          f64,
    pub ftrl_initial_accumulator_value:    f64,
    pub ftrl_l1:                           f64,
    pub ftrl_l2:                           f64,
    pub momentum:                          f64,
    pub rmsprop_decay:                     f64,

    // ── Moving averages ──────────────────────────────────────────────────────
    /// `None` (YAML `null`) turns parameter averaging off
    pub moving_average_decay: Option<f64>,

    // ── Loop and checkpoint policy ───────────────────────────────────────────
    pub num_train_iterations:          u64,
    pub log_every_n_steps:             u64,
    pub save_summary_secs:             u64,
    pub save_interval_secs:            u64,
    pub max_to_keep:                   usize,
    pub keep_checkpoint_every_n_hours: f64,

    pub session_config: SessionConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_name:        "cifarnet".to_string(),
            num_classes:       10,
            weight_decay:      0.00004,
            dropout_keep_prob: 0.8,
            label_smoothing:   0.0,

            batch_size:         32,
            num_train_examples: 50_000,
            num_input_threads:  4,
            shuffle_queue:      true,
            random_seed:        1,
            queue_capacity:     1000,
            queue_min:          200,
            image_processing:   ImageProcessingConfig::default(),

            learning_rate_decay_type:   "exponential".to_string(),
            initial_learning_rate:      0.01,
            num_epochs_per_decay:       2.0,
            learning_rate_decay_factor: 0.94,
            learning_rate_staircase:    true,
            end_learning_rate:          0.0001,

            optimizer:                         "rmsprop".to_string(),
            optimizer_epsilon:                 1.0,
            adadelta_rho:                      0.95,
            adagrad_initial_accumulator_value: 0.1,
            adam_beta1:                        0.9,
            adam_beta2:                        0.999,
            ftrl_learning_rate_power:          -0.5,
            ftrl_initial_accumulator_value:    0.1,
            ftrl_l1:                           0.0,
            ftrl_l2:                           0.0,
            momentum:                          0.9,
            rmsprop_decay:                     0.9,

            moving_average_decay: Some(0.9999),

            num_train_iterations:          100_000,
            log_every_n_steps:             10,
            save_summary_secs:             30,
            save_interval_secs:            600,
            max_to_keep:                   5,
            keep_checkpoint_every_n_hours: 5.0,

            session_config: SessionConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserialises to `null`, which serde rejects
        // for a struct, so treat it as "all defaults".
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}

// ─── ImageProcessingConfig ────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ImageProcessingConfig {
    /// Images are resized to INPUT_SIZE × INPUT_SIZE
    pub input_size:    u32,
    /// Random left/right flip (training only)
    pub random_flip:   bool,
    /// Name of the resampling filter used by the resize step
    pub resize_filter: String,
}

impl Default for ImageProcessingConfig {
    fn default() -> Self {
        Self {
            input_size:    32,
            random_flip:   true,
            resize_filter: "triangle".to_string(),
        }
    }
}

// ─── SessionConfig ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SessionConfig {
    pub log_device_placement:            bool,
    pub per_process_gpu_memory_fraction: f64,
    /// `gpu` (wgpu backend) or `cpu` (ndarray backend)
    pub device:                          String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_device_placement:            false,
            per_process_gpu_memory_fraction: 1.0,
            device:                          "gpu".to_string(),
        }
    }
}

// ─── Command-line overrides ───────────────────────────────────────────────────
/// Values given on the command line that replace config-file fields.
/// `None` means "keep what the file says".
#[derive(Debug, Clone, Default)]
pub struct TrainOverrides {
    pub max_number_of_steps:      Option<u64>,
    pub learning_rate_decay_type: Option<String>,
    pub learning_rate:            Option<f64>,
    pub batch_size:               Option<usize>,
    pub model_name:               Option<String>,
}

impl TrainOverrides {
    /// Replace exactly the fields that were given.
    pub fn apply(&self, cfg: &mut TrainConfig) {
        if let Some(steps) = self.max_number_of_steps {
            cfg.num_train_iterations = steps;
        }
        if let Some(decay_type) = &self.learning_rate_decay_type {
            cfg.learning_rate_decay_type = decay_type.clone();
        }
        if let Some(lr) = self.learning_rate {
            cfg.initial_learning_rate = lr;
        }
        if let Some(batch_size) = self.batch_size {
            cfg.batch_size = batch_size;
        }
        if let Some(model_name) = &self.model_name {
            cfg.model_name = model_name.clone();
        }
    }
}

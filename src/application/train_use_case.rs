// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Read the YAML config          (Layer 6 - infra)
//   Step 2: Apply command-line overrides  (Layer 3 - domain)
//   Step 3: Validate the named components (Layer 3 / 5)
//   Step 4: Report the session config
//   Step 5: Save the resolved config      (Layer 6 - infra)
//   Step 6: Run the training loop         (Layer 5 - ml)
//
// Step 3 resolves every string-valued choice once, so a typo
// in OPTIMIZER or MODEL_NAME fails before any image is read
// or any device is initialised.

use anyhow::Result;
use std::path::PathBuf;

use crate::domain::{
    config::{TrainConfig, TrainOverrides},
    learning_rate::configure_learning_rate,
    optimizer::configure_optimizer,
};
use crate::infra::{checkpoint::save_config, config_file::parse_config_file};
use crate::ml::{
    backend::DeviceKind,
    nets::ModelKind,
    trainer::{run_training, TrainJob, TrainOutcome},
};

/// Everything the `train` command collected from the user.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub config_path: PathBuf,
    pub overrides:   TrainOverrides,
    pub job:         TrainJob,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    request: TrainRequest,
}

impl TrainUseCase {
    pub fn new(request: TrainRequest) -> Self {
        Self { request }
    }

    /// Config file + overrides → the configuration the run will use.
    pub fn resolve_config(&self) -> Result<TrainConfig> {
        let mut cfg = parse_config_file(&self.request.config_path)?;
        self.request.overrides.apply(&mut cfg);
        validate(&cfg)?;
        Ok(cfg)
    }

    pub fn execute(&self) -> Result<TrainOutcome> {
        let job = &self.request.job;

        // ── Steps 1-3: config ─────────────────────────────────────────────────
        tracing::info!("Reading config from '{}'", self.request.config_path.display());
        let cfg = self.resolve_config()?;

        // ── Step 4: session ───────────────────────────────────────────────────
        log_session(&cfg);

        // ── Step 5: save config next to the checkpoints ───────────────────────
        save_config(&job.logdir, &cfg)?;

        // ── Step 6: train ─────────────────────────────────────────────────────
        tracing::info!(
            "Training {} on {} manifest(s) for {} steps, logging to '{}'",
            cfg.model_name,
            job.manifests.len(),
            cfg.num_train_iterations,
            job.logdir.display()
        );
        run_training(&cfg, job)
    }
}

fn validate(cfg: &TrainConfig) -> Result<()> {
    configure_learning_rate(cfg)?;
    configure_optimizer(cfg)?;
    cfg.model_name.parse::<ModelKind>()?;
    cfg.session_config.device.parse::<DeviceKind>()?;
    Ok(())
}

fn log_session(cfg: &TrainConfig) {
    let session = &cfg.session_config;
    tracing::info!(
        "Session: device={}, log_device_placement={}",
        session.device,
        session.log_device_placement
    );

    if session.per_process_gpu_memory_fraction < 1.0 {
        tracing::warn!(
            "PER_PROCESS_GPU_MEMORY_FRACTION={} is not enforced by the backend",
            session.per_process_gpu_memory_fraction
        );
    }
    tracing::debug!(
        "QUEUE_CAPACITY={} and QUEUE_MIN={} are not used by the data loader",
        cfg.queue_capacity,
        cfg.queue_min
    );
}

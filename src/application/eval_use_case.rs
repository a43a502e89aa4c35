// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Evaluates the latest checkpoint of a training run.
//
// The network must be rebuilt exactly as it was trained, so
// the configuration comes from train_config.json in the log
// directory unless a config file is given explicitly.

use anyhow::Result;
use std::path::PathBuf;

use crate::infra::{checkpoint::load_config, config_file::parse_config_file};
use crate::ml::evaluator::{run_evaluation, EvalJob, EvalReport};

#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub config_path: Option<PathBuf>,
    pub batch_size:  Option<usize>,
    pub job:         EvalJob,
}

pub struct EvalUseCase {
    request: EvalRequest,
}

impl EvalUseCase {
    pub fn new(request: EvalRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let mut cfg = match &self.request.config_path {
            Some(path) => parse_config_file(path)?,
            None       => load_config(&self.request.job.logdir)?,
        };
        if let Some(batch_size) = self.request.batch_size {
            cfg.batch_size = batch_size;
        }

        tracing::info!(
            "Evaluating {} from '{}' on {} manifest(s)",
            cfg.model_name,
            self.request.job.logdir.display(),
            self.request.job.manifests.len()
        );
        run_evaluation(&cfg, &self.request.job)
    }
}

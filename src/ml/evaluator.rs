// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Loads the latest checkpoint of a log directory and measures
// mean cross-entropy and top-1 accuracy over a set of
// manifests.
//
// By default the moving-average weights (ema-N) are evaluated,
// since those are what the averaging exists for; the raw
// weights (model-N) are used when averages are turned off or
// the run did not keep any.
//
// Evaluation runs on the plain backend (no Autodiff), which
// also disables dropout. Images are resized but never flipped.

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
};
use std::path::PathBuf;

use crate::data::{
    batcher::ImageBatcher,
    dataset::ImageDataset,
    loader::ManifestLoader,
    preprocessor::ImagePreprocessor,
};
use crate::domain::{
    config::TrainConfig,
    errors::{CheckpointError, ConfigError},
    traits::ExampleSource,
};
use crate::infra::checkpoint::{self, latest_checkpoint, RecordKind};
use crate::ml::{
    backend::{CpuBackend, DeviceKind, GpuBackend},
    nets::{Classifier, ModelKind, NetConfig},
};

#[derive(Debug, Clone)]
pub struct EvalJob {
    pub manifests:           Vec<PathBuf>,
    pub logdir:              PathBuf,
    pub use_moving_averages: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub global_step:  u64,
    pub num_examples: usize,
    pub mean_loss:    f64,
    pub accuracy:     f64,
    /// Whether the moving-average weights were evaluated
    pub averaged:     bool,
}

pub fn run_evaluation(cfg: &TrainConfig, job: &EvalJob) -> Result<EvalReport> {
    match cfg.session_config.device.parse::<DeviceKind>()? {
        DeviceKind::Gpu => evaluate_on::<GpuBackend>(cfg, job, &burn::backend::wgpu::WgpuDevice::default()),
        DeviceKind::Cpu => evaluate_on::<CpuBackend>(cfg, job, &burn::backend::ndarray::NdArrayDevice::Cpu),
    }
}

fn evaluate_on<B: Backend>(cfg: &TrainConfig, job: &EvalJob, device: &B::Device) -> Result<EvalReport> {
    let net = NetConfig::new(cfg.num_classes, cfg.image_processing.input_size as usize)
        .with_dropout_keep_prob(cfg.dropout_keep_prob);

    match cfg.model_name.parse::<ModelKind>()? {
        ModelKind::LeNet         => evaluate(cfg, job, net.init_lenet::<B>(device), device),
        ModelKind::CifarNet      => evaluate(cfg, job, net.init_cifarnet::<B>(device), device),
        ModelKind::InceptionMini => evaluate(cfg, job, net.init_inception_mini::<B>(device), device),
    }
}

fn evaluate<B: Backend, M: Classifier<B>>(
    cfg:    &TrainConfig,
    job:    &EvalJob,
    model:  M,
    device: &B::Device,
) -> Result<EvalReport> {
    if cfg.batch_size == 0 {
        return Err(ConfigError::ZeroBatchSize.into());
    }

    // ── Weights ───────────────────────────────────────────────────────────────
    let ckpt = latest_checkpoint(&job.logdir)?
        .ok_or_else(|| CheckpointError::NoCheckpointInDirectory(job.logdir.clone()))?;

    let averaged = job.use_moving_averages && ckpt.has(RecordKind::Ema);
    if job.use_moving_averages && !averaged {
        tracing::warn!("Checkpoint {} has no moving averages; evaluating raw weights", ckpt.step());
    }
    let kind   = if averaged { RecordKind::Ema } else { RecordKind::Model };
    let record = checkpoint::load_record::<B, <M as Module<B>>::Record>(&ckpt.record_path(kind), device)?;
    let model  = model.load_record(record);
    tracing::info!("Evaluating {:?} weights from global step {}", kind, ckpt.step());

    // ── Data ──────────────────────────────────────────────────────────────────
    let examples     = ManifestLoader::new(job.manifests.clone(), cfg.num_classes).load_all()?;
    let preprocessor = ImagePreprocessor::new(&cfg.image_processing, false)?;
    let dataset      = ImageDataset::new(examples, preprocessor)?;
    let loader       = DataLoaderBuilder::<B, _, _>::new(ImageBatcher::new(dataset.input_size()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_input_threads.max(1))
        .build(dataset);

    // ── Metrics ───────────────────────────────────────────────────────────────
    let ce = CrossEntropyLossConfig::new().init(device);

    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut total    = 0usize;

    for batch in loader.iter() {
        batch.ensure_decoded()?;
        let n      = batch.labels.dims()[0];
        let logits = model.forward(batch.images).logits;

        let batch_loss: f64 = ce.forward(logits.clone(), batch.labels.clone()).into_scalar().elem::<f64>();
        loss_sum += batch_loss * n as f64;

        // argmax(1) returns [batch, 1]; flatten to [batch] before comparing
        let predicted = logits.argmax(1).flatten::<1>(0, 1);
        let hits: i64 = predicted.equal(batch.labels).int().sum().into_scalar().elem::<i64>();

        correct += hits as usize;
        total   += n;
    }

    let mean_loss = if total > 0 { loss_sum / total as f64 } else { f64::NAN };
    let accuracy  = if total > 0 { correct as f64 / total as f64 } else { 0.0 };

    Ok(EvalReport {
        global_step:  ckpt.step(),
        num_examples: total,
        mean_loss,
        accuracy,
        averaged,
    })
}

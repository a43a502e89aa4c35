// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives the step loop with Burn's DataLoader, autodiff and
// optimizers.
//
// Everything configurable is resolved to concrete types before
// the loop starts, by three nested matches:
//
//   SESSION_CONFIG.DEVICE → backend  (Autodiff<Wgpu> / Autodiff<NdArray>)
//   MODEL_NAME            → network  (LeNet / CifarNet / InceptionMini)
//   OPTIMIZER             → optimizer
//
// so `train_loop` is one generic function, monomorphised per
// combination; nothing in the hot loop is boxed.
//
// One step:
//   lr    = schedule(global_step)
//   loss  = CE(logits) + 0.4 · CE(aux_logits) + wd/2 · Σ w²
//   grads = ∂loss, minus the gradients of frozen variables
//   ema.apply(model, global_step)
//   model = optimizer.step(lr, model, grads)
//
// Key Burn 0.20 insight:
//   - model.valid() returns the model on the inner backend;
//     moving averages are kept there (no autodiff graph)
//   - GradientsParams is keyed by ParamId, so freezing a
//     variable = removing its entry before optimizer.step
//   - Param ids come from the record on load_record, so
//     anything keyed by id is computed after restoring
//
// Reference: Burn Book §5 (Training)

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::{AutodiffModule, ParamId},
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::ImageDataset,
    loader::ManifestLoader,
    preprocessor::ImagePreprocessor,
};
use crate::domain::{
    config::TrainConfig,
    errors::ConfigError,
    learning_rate::configure_learning_rate,
    optimizer::{configure_optimizer, OptimizerSpec},
    scopes::{select_restorable, select_trainable},
    traits::ExampleSource,
};
use crate::infra::{
    checkpoint::{self, resolve_start_point, Checkpoint, CheckpointSaver, RecordKind, StartPoint},
    summary::{StepSummary, SummaryWriter},
};
use crate::ml::{
    backend::{CpuTrainBackend, DeviceKind, GpuTrainBackend},
    ema::ExponentialMovingAverage,
    nets::{Classifier, ModelKind, NetConfig},
    optim,
    variables::{assign_values, collect_values, l2_penalty, list_variables, retain_gradients, variable_names},
};

/// Weight of the auxiliary classifier's loss
const AUX_LOSS_WEIGHT: f64 = 0.4;

/// Run-specific inputs that do not belong in the config file.
#[derive(Debug, Clone, Default)]
pub struct TrainJob {
    pub manifests:                 Vec<PathBuf>,
    pub logdir:                    PathBuf,
    pub pretrained_model:          Option<PathBuf>,
    pub trainable_scopes:          Option<Vec<String>>,
    pub checkpoint_exclude_scopes: Option<Vec<String>>,
}

/// What a finished run reports back.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub global_step:     u64,
    pub final_loss:      Option<f64>,
    pub last_checkpoint: Option<Checkpoint>,
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────
pub fn run_training(cfg: &TrainConfig, job: &TrainJob) -> Result<TrainOutcome> {
    let log_device = cfg.session_config.log_device_placement;

    match cfg.session_config.device.parse::<DeviceKind>()? {
        DeviceKind::Gpu => {
            let device = burn::backend::wgpu::WgpuDevice::default();
            if log_device {
                tracing::info!("Using WGPU device: {:?}", device);
            }
            train_on::<GpuTrainBackend>(cfg, job, &device)
        }
        DeviceKind::Cpu => {
            let device = burn::backend::ndarray::NdArrayDevice::Cpu;
            if log_device {
                tracing::info!("Using NdArray device: {:?}", device);
            }
            train_on::<CpuTrainBackend>(cfg, job, &device)
        }
    }
}

fn train_on<B: AutodiffBackend>(cfg: &TrainConfig, job: &TrainJob, device: &B::Device) -> Result<TrainOutcome> {
    let net = NetConfig::new(cfg.num_classes, cfg.image_processing.input_size as usize)
        .with_dropout_keep_prob(cfg.dropout_keep_prob);

    match cfg.model_name.parse::<ModelKind>()? {
        ModelKind::LeNet         => with_optimizer::<B, _>(cfg, job, net.init_lenet::<B>(device), device),
        ModelKind::CifarNet      => with_optimizer::<B, _>(cfg, job, net.init_cifarnet::<B>(device), device),
        ModelKind::InceptionMini => with_optimizer::<B, _>(cfg, job, net.init_inception_mini::<B>(device), device),
    }
}

fn with_optimizer<B, M>(cfg: &TrainConfig, job: &TrainJob, model: M, device: &B::Device) -> Result<TrainOutcome>
where
    B: AutodiffBackend,
    M: Classifier<B> + AutodiffModule<B>,
{
    let spec = configure_optimizer(cfg)?;
    tracing::info!("Optimizer: {:?}", spec);

    match spec {
        OptimizerSpec::Adadelta { rho, epsilon } => {
            train_loop(cfg, job, model, optim::adadelta::<B, M>(rho, epsilon), device)
        }
        OptimizerSpec::Adagrad { initial_accumulator_value } => {
            train_loop(cfg, job, model, optim::adagrad::<B, M>(initial_accumulator_value), device)
        }
        OptimizerSpec::Adam { beta1, beta2, epsilon } => {
            train_loop(cfg, job, model, optim::adam::<B, M>(beta1, beta2, epsilon), device)
        }
        OptimizerSpec::Ftrl { learning_rate_power, initial_accumulator_value, l1, l2 } => train_loop(
            cfg,
            job,
            model,
            optim::ftrl::<B, M>(learning_rate_power, initial_accumulator_value, l1, l2),
            device,
        ),
        OptimizerSpec::Momentum { momentum } => {
            train_loop(cfg, job, model, optim::momentum::<B, M>(momentum), device)
        }
        OptimizerSpec::RmsProp { decay, momentum, epsilon } => {
            train_loop(cfg, job, model, optim::rmsprop::<B, M>(decay, momentum, epsilon), device)
        }
        OptimizerSpec::Sgd => train_loop(cfg, job, model, optim::sgd::<B, M>(), device),
    }
}

// ─── Input pipeline ───────────────────────────────────────────────────────────
fn build_train_loader<B: Backend>(
    cfg: &TrainConfig,
    job: &TrainJob,
) -> Result<(Arc<dyn DataLoader<B, ImageBatch<B>>>, usize)> {
    if cfg.batch_size == 0 {
        return Err(ConfigError::ZeroBatchSize.into());
    }

    let examples = ManifestLoader::new(job.manifests.clone(), cfg.num_classes).load_all()?;
    if examples.is_empty() {
        bail!("No training examples found in {:?}", job.manifests);
    }

    let preprocessor = ImagePreprocessor::new(&cfg.image_processing, true)?;
    let dataset      = ImageDataset::new(examples, preprocessor)?.with_seed(cfg.random_seed);
    let num_examples = dataset.sample_count();

    let mut builder = DataLoaderBuilder::<B, _, _>::new(ImageBatcher::new(dataset.input_size()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_input_threads.max(1));
    if cfg.shuffle_queue {
        builder = builder.shuffle(cfg.random_seed);
    }

    Ok((builder.build(dataset), num_examples))
}

// ─── Initialisation ───────────────────────────────────────────────────────────
/// Copy every variable not under an exclusion scope from the model
/// record at `path` into `model`. Returns the model and the number
/// of variables restored.
pub fn restore_from_pretrained<B: Backend, M: Module<B>>(
    model:      M,
    path:       &Path,
    exclusions: Option<&[String]>,
    device:     &B::Device,
) -> Result<(M, usize)> {
    let names      = variable_names::<B, M>(&model);
    let restorable = select_restorable(&names, exclusions);

    let record     = checkpoint::load_record::<B, <M as Module<B>>::Record>(path, device)?;
    let pretrained = model.clone().load_record(record);

    let mut values = collect_values::<B, M>(&pretrained);
    values.retain(|name, _| restorable.contains(&name.as_str()));

    let missing: Vec<&str> = restorable
        .iter()
        .copied()
        .filter(|name| !values.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        bail!("Variables missing from checkpoint '{}': {}", path.display(), missing.join(", "));
    }

    let (model, restored) = assign_values(model, &values);
    Ok((model, restored))
}

fn ensure_finite(loss: f64, step: u64) -> Result<f64> {
    if !loss.is_finite() {
        bail!("Loss is {loss} at global step {step}; training diverged");
    }
    Ok(loss)
}

// ─── Checkpointing ────────────────────────────────────────────────────────────
fn save_checkpoint<B, M, O>(
    saver: &mut CheckpointSaver,
    step:  u64,
    model: &M,
    optim: &O,
    ema:   Option<&ExponentialMovingAverage<B::InnerBackend>>,
) -> Result<Checkpoint>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    saver.write::<B, _>(RecordKind::Model, step, model.clone().into_record())?;
    saver.write::<B, _>(RecordKind::Optimizer, step, optim.to_record())?;

    if let Some(ema) = ema.filter(|ema| !ema.is_empty()) {
        let averaged = ema.averaged(model.valid());
        saver.write::<B::InnerBackend, _>(RecordKind::Ema, step, averaged.into_record())?;
    }

    let ckpt = saver.commit(step)?;
    tracing::info!("Saved checkpoint for global step {} to '{}'", step, saver.dir().display());
    Ok(ckpt)
}

// ─── Step loop ────────────────────────────────────────────────────────────────
fn train_loop<B, M, O>(
    cfg:       &TrainConfig,
    job:       &TrainJob,
    mut model: M,
    mut optim: O,
    device:    &B::Device,
) -> Result<TrainOutcome>
where
    B: AutodiffBackend,
    M: Classifier<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    // ── Learning rate ─────────────────────────────────────────────────────────
    let schedule = configure_learning_rate(cfg)?;
    tracing::info!("Learning rate schedule: {:?}", schedule);

    // ── Input pipeline ────────────────────────────────────────────────────────
    let (loader, num_examples) = build_train_loader::<B>(cfg, job)?;
    tracing::info!(
        "Input pipeline: {} examples, batch size {}, {} worker(s)",
        num_examples,
        cfg.batch_size,
        cfg.num_input_threads.max(1)
    );

    // ── Initial weights / global step ─────────────────────────────────────────
    let mut ema   = cfg.moving_average_decay.map(ExponentialMovingAverage::<B::InnerBackend>::new);
    let mut saver = CheckpointSaver::open(&job.logdir, cfg.max_to_keep, cfg.keep_checkpoint_every_n_hours)?;
    let mut global_step = 0u64;

    match resolve_start_point(&job.logdir, job.pretrained_model.as_deref())? {
        StartPoint::Fresh => {
            tracing::info!("Initialising {} from scratch", cfg.model_name);
        }
        StartPoint::Resume(ckpt) => {
            let record = checkpoint::load_record::<B, <M as Module<B>>::Record>(&ckpt.record_path(RecordKind::Model), device)?;
            model = model.load_record(record);

            if ckpt.has(RecordKind::Optimizer) {
                let record = checkpoint::load_record::<B, O::Record>(&ckpt.record_path(RecordKind::Optimizer), device)?;
                optim = optim.load_record(record);
            }
            if let Some(ema) = ema.as_mut().filter(|_| ckpt.has(RecordKind::Ema)) {
                let record = checkpoint::load_record::<B::InnerBackend, <M::InnerModule as Module<B::InnerBackend>>::Record>(
                    &ckpt.record_path(RecordKind::Ema),
                    device,
                )?;
                ema.load_from(&model.valid().load_record(record));
            }

            global_step = ckpt.step();
            tracing::info!("Resuming from global step {} in '{}'", global_step, job.logdir.display());
        }
        StartPoint::FineTune(path) => {
            let total = list_variables::<B, M>(&model).len();
            let (restored_model, restored) =
                restore_from_pretrained::<B, M>(model, &path, job.checkpoint_exclude_scopes.as_deref(), device)?;
            model = restored_model;
            tracing::info!("Restored {} of {} variables", restored, total);
        }
    }

    // ── Trainable variables ───────────────────────────────────────────────────
    let variables = list_variables::<B, M>(&model);
    let names: Vec<String> = variables.iter().map(|v| v.name.clone()).collect();
    let selected = select_trainable(&names, job.trainable_scopes.as_deref());
    let trainable: HashSet<ParamId> = variables
        .iter()
        .filter(|v| selected.contains(&v.name.as_str()))
        .map(|v| v.id)
        .collect();

    if trainable.is_empty() {
        bail!("--trainable_scopes {:?} matched no variables", job.trainable_scopes);
    }
    tracing::info!("Training {} of {} variables", trainable.len(), variables.len());

    // ── Loss ──────────────────────────────────────────────────────────────────
    let smoothing = (cfg.label_smoothing > 0.0).then_some(cfg.label_smoothing);
    let ce = CrossEntropyLossConfig::new().with_smoothing(smoothing).init(device);

    // ── Summaries / checkpoint timers ─────────────────────────────────────────
    let summaries      = SummaryWriter::new(&job.logdir)?;
    let summary_every  = Duration::from_secs(cfg.save_summary_secs);
    let save_every     = Duration::from_secs(cfg.save_interval_secs);
    let mut last_summary = Instant::now();
    let mut last_save    = Instant::now();

    let start_step      = global_step;
    let mut final_loss  = None;
    let mut last_ckpt   = None;

    // ── Step loop (endless epochs) ────────────────────────────────────────────
    'training: while global_step < cfg.num_train_iterations {
        let mut batches_this_epoch = 0usize;

        for batch in loader.iter() {
            if global_step >= cfg.num_train_iterations {
                break 'training;
            }
            batches_this_epoch += 1;
            batch.ensure_decoded()?;
            let step_started = Instant::now();
            let lr = schedule.at(global_step);

            // ── Forward ───────────────────────────────────────────────────────
            let output   = model.forward(batch.images);
            let mut loss = ce.forward(output.logits, batch.labels.clone());
            if let Some(aux) = output.aux_logits {
                loss = loss + ce.forward(aux, batch.labels).mul_scalar(AUX_LOSS_WEIGHT);
            }
            if let Some(regularization) = l2_penalty::<B, M>(&model, cfg.weight_decay) {
                loss = loss + regularization;
            }
            let loss_value = ensure_finite(loss.clone().into_scalar().elem::<f64>(), global_step)?;

            // ── Backward + update ─────────────────────────────────────────────
            let grads     = loss.backward();
            let mut grads = GradientsParams::from_grads(grads, &model);
            retain_gradients(&model, &mut grads, &trainable);

            // Averages see the weights this step started from
            if let Some(ema) = ema.as_mut() {
                ema.apply(&model.valid(), global_step);
            }
            model = optim.step(lr, model, grads);
            global_step += 1;
            final_loss = Some(loss_value);

            // ── Bookkeeping ───────────────────────────────────────────────────
            if cfg.log_every_n_steps > 0 && global_step % cfg.log_every_n_steps == 0 {
                tracing::info!(
                    "global step {}: loss = {:.4} ({:.3} sec/step)",
                    global_step,
                    loss_value,
                    step_started.elapsed().as_secs_f64()
                );
            }
            if last_summary.elapsed() >= summary_every {
                summaries.write(&StepSummary::now(global_step, loss_value, lr))?;
                last_summary = Instant::now();
            }
            if last_save.elapsed() >= save_every {
                last_ckpt = Some(save_checkpoint::<B, M, O>(&mut saver, global_step, &model, &optim, ema.as_ref())?);
                last_save = Instant::now();
            }
        }

        if batches_this_epoch == 0 {
            bail!("The input pipeline produced no batches; check the manifests and images");
        }
    }

    // ── Final checkpoint ──────────────────────────────────────────────────────
    if global_step > start_step {
        if let Some(loss) = final_loss {
            summaries.write(&StepSummary::now(global_step, loss, schedule.at(global_step)))?;
        }
        let already_saved = last_ckpt.as_ref().map(Checkpoint::step) == Some(global_step);
        if !already_saved {
            last_ckpt = Some(save_checkpoint::<B, M, O>(&mut saver, global_step, &model, &optim, ema.as_ref())?);
        }
    } else {
        tracing::info!(
            "Global step {} already reached NUM_TRAIN_ITERATIONS={}; nothing to do",
            global_step,
            cfg.num_train_iterations
        );
    }

    tracing::info!("Training complete at global step {}", global_step);
    Ok(TrainOutcome { global_step, final_loss, last_checkpoint: last_ckpt })
}

// ============================================================
// Layer 6 — Checkpoint Saver
// ============================================================
// Saves and restores training state using Burn's
// NamedMpkFileRecorder at full precision.
//
// What gets saved per checkpoint step N:
//   1. model-N.mpk — raw model parameters
//   2. ema-N.mpk   — moving-average parameters (when enabled),
//                    same record type as the model
//   3. optim-N.mpk — optimizer state (accumulators, moments)
//
// plus two small JSON files shared by every step:
//   checkpoint.json   — index: latest step, retained steps,
//                       permanently kept steps
//   train_config.json — the resolved training configuration
//
// Retention:
//   Only the newest MAX_TO_KEEP steps are retained (0 keeps
//   everything). When a step falls out of that window it is
//   deleted, unless KEEP_CHECKPOINT_EVERY_N_HOURS has elapsed
//   since the last step that was kept that way; then it is
//   moved to `preserved` and never deleted.
//
//   logdir/
//     model-1200.mpk   ema-1200.mpk   optim-1200.mpk
//     model-1800.mpk   ema-1800.mpk   optim-1800.mpk
//     checkpoint.json
//     train_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::config::TrainConfig;
use crate::domain::errors::CheckpointError;

const INDEX_FILE:       &str = "checkpoint.json";
const CONFIG_FILE:      &str = "train_config.json";
const RECORD_EXTENSION: &str = "mpk";

type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

// ─── Record kinds ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Model,
    Ema,
    Optimizer,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Model, RecordKind::Ema, RecordKind::Optimizer];

    fn prefix(self) -> &'static str {
        match self {
            RecordKind::Model     => "model",
            RecordKind::Ema       => "ema",
            RecordKind::Optimizer => "optim",
        }
    }
}

// ─── Checkpoint ───────────────────────────────────────────────────────────────
/// The files written for one step. Record paths carry no
/// extension because the recorder appends `.mpk` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    dir:  PathBuf,
    step: u64,
}

impl Checkpoint {
    pub fn new(dir: impl Into<PathBuf>, step: u64) -> Self {
        Self { dir: dir.into(), step }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn record_path(&self, kind: RecordKind) -> PathBuf {
        self.dir.join(format!("{}-{}", kind.prefix(), self.step))
    }

    /// Whether `kind` was written for this step
    pub fn has(&self, kind: RecordKind) -> bool {
        self.record_path(kind).with_extension(RECORD_EXTENSION).is_file()
    }
}

// ─── Index ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCheckpoint {
    pub step:     u64,
    pub saved_at: DateTime<Utc>,
}

/// Contents of checkpoint.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointIndex {
    pub latest:             Option<u64>,
    /// Oldest first
    pub retained:           Vec<SavedCheckpoint>,
    pub preserved:          Vec<u64>,
    pub next_preserve_time: Option<DateTime<Utc>>,
}

fn read_index(dir: &Path) -> Result<Option<CheckpointIndex>> {
    let path = dir.join(INDEX_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read checkpoint index '{}'", path.display()))?;

    let index = serde_json::from_str(&json).map_err(|e| CheckpointError::CorruptIndex {
        path:   path.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some(index))
}

// ─── CheckpointSaver ──────────────────────────────────────────────────────────
/// Writes checkpoint records into one directory and maintains
/// its index and retention policy.
pub struct CheckpointSaver {
    dir:         PathBuf,
    max_to_keep: usize,
    keep_every:  Option<Duration>,
    index:       CheckpointIndex,
    recorder:    CheckpointRecorder,
}

impl CheckpointSaver {
    /// Open (and create if needed) a checkpoint directory,
    /// picking up an existing index so retention continues
    /// across restarts.
    pub fn open(dir: &Path, max_to_keep: usize, keep_checkpoint_every_n_hours: f64) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;

        let keep_every = (keep_checkpoint_every_n_hours > 0.0)
            .then(|| Duration::milliseconds((keep_checkpoint_every_n_hours * 3_600_000.0) as i64));

        let mut index = read_index(dir)?.unwrap_or_default();
        if index.next_preserve_time.is_none() {
            index.next_preserve_time = keep_every.map(|period| Utc::now() + period);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            max_to_keep,
            keep_every,
            index,
            recorder: CheckpointRecorder::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &CheckpointIndex {
        &self.index
    }

    /// Write one record of the checkpoint for `step`.
    /// The step only becomes visible to readers after `commit`.
    pub fn write<B: Backend, R: Record<B>>(&self, kind: RecordKind, step: u64, record: R) -> Result<()> {
        let path = Checkpoint::new(&self.dir, step).record_path(kind);

        Recorder::<B>::record(&self.recorder, record, path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Record `step` as the latest checkpoint, apply the
    /// retention policy and rewrite the index.
    pub fn commit(&mut self, step: u64) -> Result<Checkpoint> {
        for doomed in self.register(step, Utc::now()) {
            self.remove_files(doomed);
        }
        self.write_index()?;
        Ok(Checkpoint::new(&self.dir, step))
    }

    /// Update the index for a new step saved at `now`.
    /// Returns the steps whose files should be deleted.
    fn register(&mut self, step: u64, now: DateTime<Utc>) -> Vec<u64> {
        self.index.retained.retain(|saved| saved.step != step);
        self.index.retained.push(SavedCheckpoint { step, saved_at: now });
        self.index.latest = Some(step);

        let mut doomed = Vec::new();
        if self.max_to_keep == 0 {
            return doomed;
        }

        while self.index.retained.len() > self.max_to_keep {
            let oldest = self.index.retained.remove(0);

            if let (Some(period), Some(next)) = (self.keep_every, self.index.next_preserve_time) {
                if oldest.saved_at > next {
                    self.index.preserved.push(oldest.step);
                    self.index.next_preserve_time = Some(next + period);
                    continue;
                }
            }
            doomed.push(oldest.step);
        }
        doomed
    }

    fn remove_files(&self, step: u64) {
        let ckpt = Checkpoint::new(&self.dir, step);
        for kind in RecordKind::ALL {
            let path = ckpt.record_path(kind).with_extension(RECORD_EXTENSION);
            if path.is_file() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!("Cannot delete old checkpoint '{}': {}", path.display(), e);
                }
            }
        }
        tracing::debug!("Deleted checkpoint for step {}", step);
    }

    fn write_index(&self) -> Result<()> {
        let path = self.dir.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(&self.index)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write checkpoint index '{}'", path.display()))
    }
}

// ─── Lookup ───────────────────────────────────────────────────────────────────
/// Newest checkpoint in `dir`, or `None` if there is none.
///
/// The index is authoritative when present. A directory without
/// one (e.g. pretrained weights copied by hand) is scanned for
/// `model-<step>.mpk` files instead.
pub fn latest_checkpoint(dir: &Path) -> Result<Option<Checkpoint>> {
    if let Some(index) = read_index(dir)? {
        let latest = index
            .latest
            .map(|step| Checkpoint::new(dir, step))
            .filter(|ckpt| ckpt.has(RecordKind::Model));
        return Ok(latest);
    }

    if !dir.is_dir() {
        return Ok(None);
    }

    let prefix = format!("{}-", RecordKind::Model.prefix());
    let mut newest = None;

    for entry in fs::read_dir(dir).with_context(|| format!("Cannot list '{}'", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        let step = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(&prefix))
            .and_then(|s| s.parse::<u64>().ok());

        if let Some(step) = step {
            newest = newest.max(Some(step));
        }
    }

    Ok(newest.map(|step| Checkpoint::new(dir, step)))
}

/// Where a training run takes its initial weights from.
#[derive(Debug, Clone, PartialEq)]
pub enum StartPoint {
    /// Freshly initialised parameters
    Fresh,
    /// Continue a previous run in the same log directory
    Resume(Checkpoint),
    /// Restore (a subset of) model parameters from this record
    FineTune(PathBuf),
}

/// Decide how to initialise a run:
///
///   checkpoint in logdir      → Resume (pretrained path ignored)
///   no pretrained path        → Fresh
///   pretrained is a directory → FineTune from its latest model record
///   pretrained is a file      → FineTune from that record
pub fn resolve_start_point(logdir: &Path, pretrained: Option<&Path>) -> Result<StartPoint> {
    if let Some(ckpt) = latest_checkpoint(logdir)? {
        if pretrained.is_some() {
            tracing::info!(
                "Ignoring --pretrained_model_path because a checkpoint already exists in {}",
                logdir.display()
            );
        }
        return Ok(StartPoint::Resume(ckpt));
    }

    let Some(path) = pretrained else {
        return Ok(StartPoint::Fresh);
    };

    let record = if path.is_dir() {
        latest_checkpoint(path)?
            .ok_or_else(|| CheckpointError::NoCheckpointInDirectory(path.to_path_buf()))?
            .record_path(RecordKind::Model)
    } else {
        strip_record_extension(path)
    };

    tracing::info!("Fine-tuning from {}", record.display());
    Ok(StartPoint::FineTune(record))
}

/// Accept `model-100.mpk` as well as `model-100`
fn strip_record_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(RECORD_EXTENSION) => path.with_extension(""),
        _                      => path.to_path_buf(),
    }
}

/// Load a record written by `CheckpointSaver::write`.
pub fn load_record<B: Backend, R: Record<B>>(path: &Path, device: &B::Device) -> Result<R> {
    Recorder::<B>::load(&CheckpointRecorder::new(), path.to_path_buf(), device)
        .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))
}

// ─── Config ───────────────────────────────────────────────────────────────────
/// Save the resolved configuration next to the checkpoints so
/// `eval` can rebuild the same network.
pub fn save_config(dir: &Path, cfg: &TrainConfig) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

    let path = dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(cfg)?;

    fs::write(&path, json)
        .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

    tracing::debug!("Saved training config to '{}'", path.display());
    Ok(())
}

pub fn load_config(dir: &Path) -> Result<TrainConfig> {
    let path = dir.join(CONFIG_FILE);

    let json = fs::read_to_string(&path).with_context(|| {
        format!(
            "Cannot read config from '{}'. Make sure you have run 'train' with this --logdir.",
            path.display()
        )
    })?;

    Ok(serde_json::from_str(&json)?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at_hours(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn saver(dir: &Path, max_to_keep: usize, hours: f64) -> CheckpointSaver {
        let mut saver = CheckpointSaver::open(dir, max_to_keep, hours).unwrap();
        saver.index.next_preserve_time = saver.keep_every.map(|p| at_hours(0) + p);
        saver
    }

    #[test]
    fn test_keeps_only_newest_max_to_keep() {
        let tmp = TempDir::new().unwrap();
        let mut s = saver(tmp.path(), 2, 0.0);

        assert!(s.register(10, at_hours(0)).is_empty());
        assert!(s.register(20, at_hours(0)).is_empty());
        assert_eq!(s.register(30, at_hours(0)), vec![10]);
        assert_eq!(s.register(40, at_hours(0)), vec![20]);

        let steps: Vec<u64> = s.index.retained.iter().map(|c| c.step).collect();
        assert_eq!(steps, vec![30, 40]);
        assert_eq!(s.index.latest, Some(40));
    }

    #[test]
    fn test_max_to_keep_zero_keeps_everything() {
        let tmp = TempDir::new().unwrap();
        let mut s = saver(tmp.path(), 0, 0.0);
        for step in 1..=10 {
            assert!(s.register(step, at_hours(0)).is_empty());
        }
        assert_eq!(s.index.retained.len(), 10);
    }

    #[test]
    fn test_keep_every_n_hours_preserves_old_steps() {
        let tmp = TempDir::new().unwrap();
        // next preserve time starts at hour 2
        let mut s = saver(tmp.path(), 1, 2.0);

        s.register(1, at_hours(1));
        // step 1 (saved at 1h) is not past 2h → deleted
        assert_eq!(s.register(2, at_hours(3)), vec![1]);
        // step 2 (saved at 3h) is past 2h → preserved, next = 4h
        assert!(s.register(3, at_hours(4)).is_empty());
        // step 3 (saved at 4h) is not past 4h → deleted
        assert_eq!(s.register(4, at_hours(5)), vec![3]);

        assert_eq!(s.index.preserved, vec![2]);
        assert_eq!(s.index.next_preserve_time, Some(at_hours(4)));
    }

    #[test]
    fn test_commit_deletes_files_and_writes_index() {
        let tmp = TempDir::new().unwrap();
        let mut s = saver(tmp.path(), 1, 0.0);

        for name in ["model-1.mpk", "ema-1.mpk", "optim-1.mpk", "model-2.mpk"] {
            touch(tmp.path(), name);
        }
        s.commit(1).unwrap();
        s.commit(2).unwrap();

        assert!(!tmp.path().join("model-1.mpk").exists());
        assert!(!tmp.path().join("ema-1.mpk").exists());
        assert!(!tmp.path().join("optim-1.mpk").exists());

        let latest = latest_checkpoint(tmp.path()).unwrap().unwrap();
        assert_eq!(latest.step(), 2);

        // a reopened saver continues from the same index
        let reopened = CheckpointSaver::open(tmp.path(), 1, 0.0).unwrap();
        assert_eq!(reopened.index().latest, Some(2));
    }

    #[test]
    fn test_latest_checkpoint_scans_without_index() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(latest_checkpoint(tmp.path()).unwrap(), None);

        for name in ["model-5.mpk", "model-40.mpk", "ema-90.mpk", "notes.txt"] {
            touch(tmp.path(), name);
        }
        let latest = latest_checkpoint(tmp.path()).unwrap().unwrap();
        assert_eq!(latest.step(), 40);
        assert_eq!(latest.record_path(RecordKind::Ema), tmp.path().join("ema-40"));
    }

    #[test]
    fn test_corrupt_index_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(INDEX_FILE), "{ not json").unwrap();

        let err = latest_checkpoint(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_start_point_fresh_without_pretrained() {
        let logdir = TempDir::new().unwrap();
        assert_eq!(resolve_start_point(logdir.path(), None).unwrap(), StartPoint::Fresh);
    }

    #[test]
    fn test_start_point_resume_ignores_pretrained() {
        let logdir     = TempDir::new().unwrap();
        let pretrained = TempDir::new().unwrap();
        touch(logdir.path(), "model-7.mpk");
        touch(pretrained.path(), "model-100.mpk");

        let start = resolve_start_point(logdir.path(), Some(pretrained.path())).unwrap();
        assert_eq!(start, StartPoint::Resume(Checkpoint::new(logdir.path(), 7)));
    }

    #[test]
    fn test_start_point_pretrained_directory() {
        let logdir     = TempDir::new().unwrap();
        let pretrained = TempDir::new().unwrap();
        touch(pretrained.path(), "model-100.mpk");

        let start = resolve_start_point(logdir.path(), Some(pretrained.path())).unwrap();
        assert_eq!(start, StartPoint::FineTune(pretrained.path().join("model-100")));
    }

    #[test]
    fn test_start_point_empty_pretrained_directory_fails() {
        let logdir     = TempDir::new().unwrap();
        let pretrained = TempDir::new().unwrap();

        let err = resolve_start_point(logdir.path(), Some(pretrained.path())).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("No model checkpoint file found in directory"), "{msg}");
    }

    #[test]
    fn test_start_point_pretrained_file() {
        let logdir = TempDir::new().unwrap();
        let file   = logdir.path().join("weights").join("model-3.mpk");

        let start = resolve_start_point(logdir.path(), Some(&file)).unwrap();
        assert_eq!(start, StartPoint::FineTune(logdir.path().join("weights").join("model-3")));
    }

    #[test]
    fn test_config_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = TrainConfig::default();
        cfg.model_name = "lenet".to_string();
        cfg.moving_average_decay = None;

        save_config(tmp.path(), &cfg).unwrap();
        assert_eq!(load_config(tmp.path()).unwrap(), cfg);
    }
}

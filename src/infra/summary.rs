// ============================================================
// Layer 6 — Summary Writer
// ============================================================
// Appends scalar training summaries to a CSV file in the log
// directory, so a run can be plotted while it is still going.
//
// Output file: <logdir>/summaries.csv
//
//   step,wall_time,total_loss,learning_rate
//   100,2024-05-01T12:00:30.120Z,2.301245,0.010000
//   250,2024-05-01T12:01:00.480Z,1.987310,0.010000
//
// A resumed run keeps appending to the same file; the header
// is only written when the file is first created.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const SUMMARY_FILE: &str = "summaries.csv";
const HEADER:       &str = "step,wall_time,total_loss,learning_rate";

/// One row of the summary file
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    pub step:          u64,
    pub wall_time:     DateTime<Utc>,
    pub total_loss:    f64,
    pub learning_rate: f64,
}

impl StepSummary {
    pub fn now(step: u64, total_loss: f64, learning_rate: f64) -> Self {
        Self { step, wall_time: Utc::now(), total_loss, learning_rate }
    }

    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{:.6},{:.6}",
            self.step,
            self.wall_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.total_loss,
            self.learning_rate,
        )
    }
}

pub struct SummaryWriter {
    csv_path: PathBuf,
}

impl SummaryWriter {
    /// Create the log directory and the CSV header if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let csv_path = dir.join(SUMMARY_FILE);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created summary CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn write(&self, summary: &StepSummary) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{}", summary.to_csv_row())?;

        tracing::debug!(
            "Summary at step {}: total_loss={:.4}, learning_rate={:.6}",
            summary.step,
            summary.total_loss,
            summary.learning_rate,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ============================================================
// Layer 3 — Labelled Example
// ============================================================
// One entry of a data manifest: where the image lives and
// which class it belongs to. Pixels are only decoded later,
// by the dataset, when a batch asks for them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledExample {
    /// Absolute (or manifest-relative, already resolved) image path
    pub image_path: PathBuf,

    /// Class index in [0, NUM_CLASSES)
    pub label: usize,
}

impl LabeledExample {
    pub fn new(image_path: impl Into<PathBuf>, label: usize) -> Self {
        Self {
            image_path: image_path.into(),
            label,
        }
    }
}

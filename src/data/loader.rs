// ============================================================
// Layer 4 — Manifest Loader
// ============================================================
// Reads one or more data manifests and returns the labelled
// examples they list.
//
// Manifest format (one example per line):
//
//   # comment lines and blank lines are ignored
//   images/cat_001.png,3
//   images/dog_042.jpg,5
//   /abs/path/to/bird.png	7      ← a tab works as separator too
//
// Relative image paths are resolved against the directory the
// manifest lives in, so a dataset folder can be moved as a
// whole without rewriting its manifest.
//
// Every label is checked against NUM_CLASSES here, before any
// tensor is built, so a bad manifest fails at startup instead
// of hours into training.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (Reading a File)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::errors::ConfigError;
use crate::domain::example::LabeledExample;
use crate::domain::traits::ExampleSource;

/// Loads labelled examples from manifest files.
/// Implements the ExampleSource trait from Layer 3.
pub struct ManifestLoader {
    manifests:   Vec<PathBuf>,
    num_classes: usize,
}

impl ManifestLoader {
    pub fn new(manifests: Vec<PathBuf>, num_classes: usize) -> Self {
        Self { manifests, num_classes }
    }
}

impl ExampleSource for ManifestLoader {
    fn load_all(&self) -> Result<Vec<LabeledExample>> {
        let mut examples = Vec::new();

        for manifest in &self.manifests {
            let text = fs::read_to_string(manifest)
                .with_context(|| format!("Cannot read manifest '{}'", manifest.display()))?;

            let base   = manifest.parent().unwrap_or_else(|| Path::new("."));
            let before = examples.len();

            for (line_no, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                let example = parse_line(line, base).with_context(|| {
                    format!("{}:{}: malformed manifest line", manifest.display(), line_no + 1)
                })?;

                if example.label >= self.num_classes {
                    return Err(ConfigError::LabelOutOfRange {
                        file:        format!("{}:{}", manifest.display(), line_no + 1),
                        label:       example.label,
                        num_classes: self.num_classes,
                    }
                    .into());
                }

                examples.push(example);
            }

            tracing::debug!(
                "Manifest '{}' contributed {} examples",
                manifest.display(),
                examples.len() - before
            );
        }

        tracing::info!(
            "Loaded {} examples from {} manifest(s)",
            examples.len(),
            self.manifests.len()
        );
        Ok(examples)
    }
}

/// Split `path,label` (or `path<TAB>label`) on the LAST separator,
/// so image paths containing commas still parse.
fn parse_line(line: &str, base: &Path) -> Result<LabeledExample> {
    let Some(split_at) = line.rfind([',', '\t']) else {
        bail!("expected `image_path,label`, got '{line}'");
    };

    let path  = line[..split_at].trim();
    let label = line[split_at + 1..].trim();

    if path.is_empty() {
        bail!("empty image path in '{line}'");
    }

    let label: usize = label
        .parse()
        .with_context(|| format!("label '{label}' is not a non-negative integer"))?;

    let path = Path::new(path);
    let image_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    Ok(LabeledExample::new(image_path, label))
}

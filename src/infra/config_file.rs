// ============================================================
// Layer 6 — Config File Reader
// ============================================================
// Reads the YAML training configuration from disk. Parsing
// and defaults live in domain::config; this module only adds
// the file handling and error context.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::config::TrainConfig;

pub fn parse_config_file(path: &Path) -> Result<TrainConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file '{}'", path.display()))?;

    TrainConfig::from_yaml_str(&text)
        .with_context(|| format!("Invalid config file '{}'", path.display()))
}

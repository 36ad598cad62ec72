//! Experiment configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists. Command-line flags override individual fields afterwards.

use crate::source::TokenMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::LevelConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Pre-built layout (representations per level). Empty = grow lazily.
    pub layout: Vec<usize>,
    /// Predictor settings, shared by every level of the tower.
    pub level: LevelConfig,
    pub input: InputConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub tokens: TokenMode,
    /// File-name glob applied when the input is a directory.
    pub glob: String,
    pub lowercase: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Write one JSON line per step, not just header and summary.
    pub trajectory: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            tokens: TokenMode::Chars,
            glob: "*.txt".into(),
            lowercase: false,
        }
    }
}

impl ExperimentConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> strata_core::Result<()> {
        self.level.validate()?;
        if self.layout.iter().any(|&n| n == 0) {
            return Err(strata_core::Error::invalid_layout(
                "every pre-built level needs at least one representation",
            ));
        }
        Ok(())
    }
}

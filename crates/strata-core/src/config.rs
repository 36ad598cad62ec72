//! Level configuration
//!
//! One struct carries every knob a [`Level`](crate::Level) reads. Parent levels
//! are created with a copy of their child's config, so a single value describes
//! the whole tower. Loaded from TOML or built in code; missing fields fall back
//! to defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a level picks its next representation after a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStrategy {
    /// Consult the parent's single best expectation, then fall back to the
    /// best-fitting representation in the pool.
    #[default]
    Expected,
    /// Score every (previous, current) pair with the parent's transition
    /// statistics and both representations' fits, Viterbi style.
    Joint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Breakdown threshold in [0, 1]. Also used for the expectation and
    /// best-of-pool checks unless those are overridden below.
    pub threshold: f64,
    /// Never mint new representations.
    pub frozen: bool,
    /// Treat an unknown cause as "no information" (neutral) instead of a miss.
    pub open_world: bool,
    pub strategy: SwitchStrategy,
    /// Override for the check against the parent's expected representation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_threshold: Option<f64>,
    /// Override for the strict-fit check that decides whether to mint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_threshold: Option<f64>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            frozen: false,
            open_world: true,
            strategy: SwitchStrategy::Expected,
            expected_threshold: None,
            mint_threshold: None,
        }
    }
}

impl LevelConfig {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn open_world(mut self, open_world: bool) -> Self {
        self.open_world = open_world;
        self
    }

    pub fn strategy(mut self, strategy: SwitchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn expected_threshold(&self) -> f64 {
        self.expected_threshold.unwrap_or(self.threshold)
    }

    pub fn mint_threshold(&self) -> f64 {
        self.mint_threshold.unwrap_or(self.threshold)
    }

    /// Map a raw fit score onto [0, 1]. An unknown cause (`-1.0`) counts as a
    /// full match in an open world and as a miss in a closed one.
    pub fn normalize(&self, fit: f64) -> f64 {
        if fit < 0.0 {
            if self.open_world {
                1.0
            } else {
                0.0
            }
        } else {
            fit
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("threshold", self.threshold)?;
        if let Some(t) = self.expected_threshold {
            check_unit("expected_threshold", t)?;
        }
        if let Some(t) = self.mint_threshold {
            check_unit("mint_threshold", t)?;
        }
        Ok(())
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. Unlike the harness loader this does not fall back to
    /// defaults: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded level config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_threshold(name, value))
    }
}

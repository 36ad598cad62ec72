//! Error types for Strata

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid duration: {0} (durations must be at least 1)")]
    InvalidDuration(u64),

    #[error("invalid threshold: {name} = {value} (expected a value in [0, 1])")]
    InvalidThreshold { name: String, value: f64 },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("toml error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_threshold(name: impl Into<String>, value: f64) -> Self {
        Self::InvalidThreshold {
            name: name.into(),
            value,
        }
    }

    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout(reason.into())
    }
}

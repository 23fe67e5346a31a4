//! Error types for initialization and configuration.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum InitError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("unparsable config file: {0}")]
    UnparsableConfig(#[from] toml::de::Error),

    #[error("config: {0}")]
    MalformedConfig(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// Tried to traverse into a primitive.
    #[error("can't traverse into non-table key '{key}' in override '{path}'")]
    TraverseNonTableAt { key: String, path: String },

    /// Invalid override string.
    #[error("invalid override: '{override_str}'")]
    InvalidOverride { override_str: String },
}

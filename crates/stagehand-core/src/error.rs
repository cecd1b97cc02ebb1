//! Error types for Stagehand Core.

use thiserror::Error;

/// Result type alias for Stagehand operations.
pub type Result<T> = std::result::Result<T, StagehandError>;

/// Main error type for the Stagehand loader bridge.
#[derive(Debug, Error)]
pub enum StagehandError {
    /// The client runtime could not be located or loaded. Fatal for startup.
    #[error("Setup error: {0}")]
    Setup(String),

    /// A mutation was attempted after the configuration was frozen.
    #[error("Configuration is frozen, rejected {0}")]
    ConfigurationFrozen(String),

    /// A configuration source was not a mapping, or could not be read.
    #[error("Invalid configuration source: {0}")]
    InvalidSource(String),

    /// No preset with this name exists.
    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    /// The script namespace is not a dotted identifier path.
    #[error("Invalid script namespace '{0}'")]
    InvalidNamespace(String),

    /// A module name is not usable in a seed URL.
    #[error("Invalid module name '{0}'")]
    InvalidModule(String),

    /// A snapshot contributor failed while handling a request.
    #[error("Contributor '{name}' failed: {message}")]
    Contributor { name: String, message: String },

    /// IO operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML deserialization failed.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),
}

impl StagehandError {
    /// Whether this error is the post-freeze mutation rejection.
    pub fn is_frozen(&self) -> bool {
        matches!(self, StagehandError::ConfigurationFrozen(_))
    }
}

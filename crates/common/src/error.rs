//! Error types for the scenario model

use thiserror::Error;

/// Result type alias using the model Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or loading scenarios
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Unknown variable '${{{name}}}' referenced in {source_name}")]
    UnknownVariable { name: String, source_name: String },

    #[error("Invalid locator '{0}'")]
    InvalidLocator(String),

    #[error("Failed to load {path}: {reason}")]
    Load { path: String, reason: String },
}

impl Error {
    pub fn invalid(scenario: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidScenario {
            scenario: scenario.into(),
            reason: reason.into(),
        }
    }
}

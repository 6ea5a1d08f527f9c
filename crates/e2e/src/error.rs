//! Error types for scenario execution

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Locator {locator} did not resolve within {timeout_ms} ms")]
    LocatorTimeout { locator: String, timeout_ms: u64 },

    #[error("Element {locator} is not interactable: {reason}")]
    ElementNotInteractable { locator: String, reason: String },

    #[error("Navigation to {target} did not reach {state} within {timeout_ms} ms")]
    NavigationTimeout {
        target: String,
        state: String,
        timeout_ms: u64,
    },

    #[error("Scenario '{0}' is already registered")]
    DuplicateScenario(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("scenario exceeded its {timeout_ms} ms deadline")]
    ScenarioDeadline { timeout_ms: u64 },

    #[error("Target application failed to start: {0}")]
    TargetStartup(String),

    #[error("Target {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error(transparent)]
    Scenario(#[from] dashcheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Classification of a step failure, as recorded in results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    LocatorTimeout,
    ElementNotInteractable,
    NavigationTimeout,
    Driver,
    Other,
}

/// A captured step error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: StepErrorKind,
    pub message: String,
}

impl From<&E2eError> for StepFailure {
    fn from(err: &E2eError) -> Self {
        let kind = match err {
            E2eError::LocatorTimeout { .. } => StepErrorKind::LocatorTimeout,
            E2eError::ElementNotInteractable { .. } => StepErrorKind::ElementNotInteractable,
            E2eError::NavigationTimeout { .. } => StepErrorKind::NavigationTimeout,
            E2eError::Driver(_) => StepErrorKind::Driver,
            _ => StepErrorKind::Other,
        };
        StepFailure {
            kind,
            message: err.to_string(),
        }
    }
}

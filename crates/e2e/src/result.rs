//! Scenario and suite results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::assertions::{AssertionFailure, AssertionReport};
use crate::error::E2eResult;
use crate::executor::StepOutcome;

/// Final verdict for one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    /// Steps completed but an assertion did not hold
    Failed,
    /// The browser failed to launch, a step aborted the run, or the run
    /// was cancelled
    Errored,
}

impl Outcome {
    /// `Errored` beats `Failed` beats `Passed`
    pub fn decide(errored: bool, any_assertion_failed: bool) -> Self {
        if errored {
            Outcome::Errored
        } else if any_assertion_failed {
            Outcome::Failed
        } else {
            Outcome::Passed
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Everything recorded about one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub scenario: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Steps declared by the scenario
    pub steps_total: usize,
    /// Steps that ran, in order
    pub steps: Vec<StepOutcome>,
    pub assertions: AssertionReport,
    /// Launch, abort or cancellation cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl ExecutionResult {
    /// Result for a scenario that never got a browser
    pub fn not_started(
        scenario: &str,
        steps_total: usize,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            scenario: scenario.to_string(),
            outcome: Outcome::Errored,
            session: None,
            started_at,
            duration_ms: 0,
            steps_total,
            steps: Vec::new(),
            assertions: AssertionReport::default(),
            error: Some(error.into()),
            screenshot: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn assertion_failures(&self) -> impl Iterator<Item = &AssertionFailure> {
        self.assertions.failures()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.success)
    }
}

/// Results of one `run_all`, in registration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub driver: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub results: Vec<ExecutionResult>,
}

impl SuiteReport {
    pub fn new(driver: impl Into<String>, started_at: DateTime<Utc>, results: Vec<ExecutionResult>) -> Self {
        let count = |o: Outcome| results.iter().filter(|r| r.outcome == o).count();
        Self {
            driver: driver.into(),
            started_at,
            finished_at: Utc::now(),
            total: results.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            errored: count(Outcome::Errored),
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Write `results.json` into `dir`, creating it if needed
    pub fn write_json(&self, dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("results.json");
        std::fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        info!(path = %path.display(), "wrote suite results");
        Ok(path)
    }
}

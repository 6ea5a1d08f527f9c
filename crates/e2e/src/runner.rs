//! Scenario runner: acquire a session, run steps, evaluate assertions,
//! release the session

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dashcheck_common::Scenario;

use crate::assertions::{AssertionEvaluator, AssertionReport};
use crate::error::E2eError;
use crate::executor::{StepExecutor, StepOutcome, StepRun};
use crate::result::{ExecutionResult, Outcome};
use crate::session::{Session, SessionManager};

/// Runs one scenario end to end
#[derive(Clone)]
pub struct ScenarioRunner {
    sessions: Arc<SessionManager>,
    executor: StepExecutor,
    evaluator: AssertionEvaluator,
    /// Where failure screenshots go; none are taken when unset
    artifacts_dir: Option<PathBuf>,
    cancel: CancellationToken,
}

impl ScenarioRunner {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            executor: StepExecutor::new(),
            evaluator: AssertionEvaluator::new(),
            artifacts_dir: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Save a screenshot for every scenario that does not pass
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    /// Tie every run to `token`; cancelling it interrupts running scenarios
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `scenario` in a fresh session
    pub async fn run(&self, scenario: &Scenario) -> ExecutionResult {
        self.run_with_cancel(scenario, self.cancel.child_token()).await
    }

    /// Run `scenario`, stopping early if `cancel` fires
    ///
    /// The session is released on every path, including cancellation and
    /// the scenario deadline.
    pub async fn run_with_cancel(&self, scenario: &Scenario, cancel: CancellationToken) -> ExecutionResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let name = scenario.name();
        info!(scenario = name, steps = scenario.steps().len(), "running scenario");

        if cancel.is_cancelled() {
            return ExecutionResult::not_started(
                name,
                scenario.steps().len(),
                started_at,
                E2eError::Cancelled.to_string(),
            );
        }

        let acquired = tokio::select! {
            acquired = self.sessions.acquire(name, scenario.config()) => acquired,
            _ = cancel.cancelled() => Err(E2eError::Cancelled),
        };
        let session = match acquired {
            Ok(session) => session,
            Err(e) => {
                error!(scenario = name, "✗ {} - {}", name, e);
                let mut result =
                    ExecutionResult::not_started(name, scenario.steps().len(), started_at, e.to_string());
                result.duration_ms = start.elapsed().as_millis() as u64;
                return result;
            }
        };

        let mut run = StepRun::default();
        let mut report = AssertionReport::default();

        let interrupted = {
            let body = self.drive(&session, scenario, &mut run, &mut report);
            let deadline = scenario.config().scenario_timeout();
            tokio::select! {
                _ = body => None,
                _ = cancel.cancelled() => Some(E2eError::Cancelled),
                _ = sleep_or_forever(deadline) => Some(E2eError::ScenarioDeadline {
                    timeout_ms: deadline.map(|d| d.as_millis() as u64).unwrap_or_default(),
                }),
            }
        };

        let error = match &interrupted {
            Some(e) => Some(e.to_string()),
            None => run
                .aborted_at
                .and_then(|step| abort_message(&run.outcomes, step)),
        };
        let errored = interrupted.is_some() || run.aborted();
        let outcome = Outcome::decide(errored, report.any_failed());

        let screenshot = if outcome == Outcome::Passed || interrupted.is_some() {
            None
        } else {
            self.capture_failure(&session, name).await
        };

        let session_id = session.id();
        self.sessions.release(session).await;

        let result = ExecutionResult {
            scenario: name.to_string(),
            outcome,
            session: Some(session_id),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps_total: scenario.steps().len(),
            steps: run.outcomes,
            assertions: report,
            error,
            screenshot,
        };
        log_result(&result);
        result
    }

    /// Steps, then assertions; both records are filled in place so they
    /// survive the body being cut short
    async fn drive(
        &self,
        session: &Session,
        scenario: &Scenario,
        run: &mut StepRun,
        report: &mut AssertionReport,
    ) {
        let policy = scenario.config().failure_policy;
        self.executor
            .run(session, scenario.steps(), policy, run)
            .await;

        self.evaluator
            .evaluate(session, scenario.assertions(), run.aborted(), report)
            .await;
    }

    async fn capture_failure(&self, session: &Session, scenario: &str) -> Option<PathBuf> {
        let dir = self.artifacts_dir.as_ref()?;
        let png = match session.browser().screenshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!(scenario, "failure screenshot unavailable: {e}");
                return None;
            }
        };
        let path = dir.join(screenshot_name(scenario, session.id()));
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, png).await
        }
        .await;
        match written {
            Ok(()) => {
                debug!(scenario, path = %path.display(), "saved failure screenshot");
                Some(path)
            }
            Err(e) => {
                warn!(scenario, "could not save failure screenshot: {e}");
                None
            }
        }
    }
}

async fn sleep_or_forever(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

fn abort_message(steps: &[StepOutcome], index: usize) -> Option<String> {
    let step = steps.iter().find(|s| s.index == index)?;
    let cause = step
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("failed");
    Some(format!("step {} ({}) aborted the run: {}", index + 1, step.label, cause))
}

/// Scenario name made safe for a file name
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Screenshot file for one session of `scenario`
///
/// Distinct names can share a stem, and the same scenario can run more
/// than once per output directory, so the session id is part of the name.
fn screenshot_name(scenario: &str, session: Uuid) -> String {
    format!("{}-{}.png", file_stem(scenario), session.simple())
}

fn log_result(result: &ExecutionResult) {
    match result.outcome {
        Outcome::Passed => info!("✓ {} ({} ms)", result.scenario, result.duration_ms),
        Outcome::Failed => {
            for failure in result.assertion_failures() {
                error!(scenario = %result.scenario, "{failure}");
            }
            error!("✗ {} - {} assertion(s) failed", result.scenario, result.assertion_failures().count());
        }
        Outcome::Errored => error!(
            "✗ {} - {}",
            result.scenario,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

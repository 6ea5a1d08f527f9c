//! Step execution
//!
//! Steps run strictly in order against the session's page. Every step is
//! bounded by its own timeout (or the session default) and a failing step
//! is never retried here; retries are expanded into explicit steps when the
//! scenario is authored.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use dashcheck_common::{
    Action, Attempt, ElementState, FailurePolicy, LoadState, Locator, Step, WaitUntil,
};

use crate::driver::ElementProbe;
use crate::error::{E2eError, E2eResult, StepFailure};
use crate::locate::{poll_until, resolve, wait_for_load_state};
use crate::session::Session;

/// Headroom given to a driver call beyond the step's own timeout before
/// the executor gives up on it
const DRIVER_GRACE: Duration = Duration::from_secs(2);

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub label: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepFailure>,
    /// Policy in force when the step ran
    pub policy: FailurePolicy,
}

/// Record of running a step list, filled in as each step finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepRun {
    pub outcomes: Vec<StepOutcome>,
    /// Index of the step whose failure stopped the run
    pub aborted_at: Option<usize>,
}

impl StepRun {
    pub fn aborted(&self) -> bool {
        self.aborted_at.is_some()
    }
}

/// Executes UI steps against a session
///
/// Steps belonging to a retry expansion are skipped once an earlier attempt
/// of the same expansion has succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepExecutor;

impl StepExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `steps` in order under `policy`, recording into `run`
    ///
    /// Each outcome is pushed as soon as its step finishes, so `run` holds
    /// every completed step even if this future is dropped part way.
    pub async fn run(&self, session: &Session, steps: &[Step], policy: FailurePolicy, run: &mut StepRun) {
        let mut succeeded: Option<Attempt> = None;
        for (index, step) in steps.iter().enumerate() {
            if let (Some(done), Some(attempt)) = (succeeded, step.attempt) {
                if done.continued_by(&attempt) {
                    trace!(scenario = session.scenario(), index, "skipping remaining retry attempt");
                    continue;
                }
            }
            succeeded = None;

            let label = step.display_label();
            let step_policy = step.policy(policy);
            let start = Instant::now();
            let result = self.execute(session, step).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    debug!(scenario = session.scenario(), index, step = %label, duration_ms, "step passed");
                    succeeded = step.attempt;
                    run.outcomes.push(StepOutcome {
                        index,
                        label,
                        success: true,
                        duration_ms,
                        error: None,
                        policy: step_policy,
                    });
                }
                Err(e) => {
                    run.outcomes.push(StepOutcome {
                        index,
                        label: label.clone(),
                        success: false,
                        duration_ms,
                        error: Some(StepFailure::from(&e)),
                        policy: step_policy,
                    });
                    match step_policy {
                        FailurePolicy::FailFast => {
                            warn!(scenario = session.scenario(), index, step = %label, "step failed, aborting: {e}");
                            run.aborted_at = Some(index);
                            return;
                        }
                        FailurePolicy::BestEffort => {
                            info!(scenario = session.scenario(), index, step = %label, "step failed, continuing: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Execute a single step
    pub async fn execute(&self, session: &Session, step: &Step) -> E2eResult<()> {
        let timeout = match &step.action {
            Action::Navigate { .. } | Action::WaitForLoadState { .. } => {
                step.timeout(session.navigation_timeout())
            }
            _ => step.timeout(session.default_timeout()),
        };

        let bound = match &step.action {
            Action::Sleep { ms } => Duration::from_millis(*ms) + DRIVER_GRACE,
            _ => timeout + DRIVER_GRACE,
        };

        match tokio::time::timeout(bound, self.perform(session, &step.action, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(overrun(&step.action, timeout)),
        }
    }

    async fn perform(&self, session: &Session, action: &Action, timeout: Duration) -> E2eResult<()> {
        let browser = session.browser();
        match action {
            Action::Navigate { url, wait_until } => {
                navigate(session, url, *wait_until, timeout).await
            }
            Action::Fill { locator, value } => {
                let frame = resolve(session, locator, timeout).await?;
                ensure_editable(session, &frame, locator).await?;
                browser.fill(&frame, locator, value).await
            }
            Action::Clear { locator } => {
                let frame = resolve(session, locator, timeout).await?;
                ensure_editable(session, &frame, locator).await?;
                browser.clear(&frame, locator).await
            }
            Action::Click { locator } => {
                let deadline = Instant::now() + timeout;
                let frame = resolve(session, locator, timeout).await?;
                ensure_clickable(session, &frame, locator, deadline).await?;
                browser.click(&frame, locator).await
            }
            Action::WaitForLoadState { state } => {
                let target = browser.current_url().await.unwrap_or_default();
                wait_for_load_state(session, *state, timeout)
                    .await
                    .map(|_| ())
                    .ok_or_else(|| E2eError::NavigationTimeout {
                        target,
                        state: state.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
            }
            Action::WaitFor { locator, state } => {
                let deadline = Instant::now() + timeout;
                let frame = resolve(session, locator, timeout).await?;
                if *state == ElementState::Visible {
                    let frame = frame.as_str();
                    let visible = poll_until(deadline, session.poll_interval(), || async move {
                        match browser.probe(frame, locator).await {
                            Ok(Some(probe)) if probe.visible => Some(()),
                            _ => None,
                        }
                    })
                    .await;
                    if visible.is_none() {
                        return Err(E2eError::LocatorTimeout {
                            locator: locator.to_string(),
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                }
                Ok(())
            }
            Action::Scroll { dx, dy } => browser.scroll_by(*dx, *dy).await,
            Action::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
        }
    }
}

async fn navigate(
    session: &Session,
    url: &str,
    wait_until: WaitUntil,
    timeout: Duration,
) -> E2eResult<()> {
    let target = session.resolve_url(url)?;
    let start = Instant::now();
    let timed_out = |state: &str| E2eError::NavigationTimeout {
        target: target.clone(),
        state: state.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    };

    match tokio::time::timeout(timeout, session.browser().goto(&target)).await {
        Ok(result) => result?,
        Err(_) => return Err(timed_out("commit")),
    }

    let state = LoadState::from(wait_until);
    if wait_until != WaitUntil::Commit {
        let remaining = timeout.saturating_sub(start.elapsed());
        if wait_for_load_state(session, state, remaining).await.is_none() {
            return Err(timed_out(&state.to_string()));
        }
    }
    debug!(scenario = session.scenario(), %target, ?wait_until, "navigated");
    Ok(())
}

fn not_interactable(locator: &Locator, reason: impl Into<String>) -> E2eError {
    E2eError::ElementNotInteractable {
        locator: locator.to_string(),
        reason: reason.into(),
    }
}

async fn ensure_editable(session: &Session, frame: &str, locator: &Locator) -> E2eResult<()> {
    match session.browser().probe(frame, locator).await? {
        Some(probe) if probe.editable => Ok(()),
        Some(_) => Err(not_interactable(locator, "not editable")),
        None => Err(not_interactable(locator, "detached")),
    }
}

/// Why a probed element cannot take a click yet
fn click_blocker(probe: Option<&ElementProbe>) -> Option<&'static str> {
    match probe {
        None => Some("detached"),
        Some(p) if !p.attached => Some("detached"),
        Some(p) if !p.visible => Some("hidden"),
        Some(p) if !p.in_viewport => Some("outside the viewport after scroll"),
        Some(_) => None,
    }
}

/// Wait until the element is attached, visible and in the viewport,
/// scrolling it into view once it is visible
async fn ensure_clickable(
    session: &Session,
    frame: &str,
    locator: &Locator,
    deadline: Instant,
) -> E2eResult<()> {
    let browser = session.browser();
    loop {
        let mut probe = browser.probe(frame, locator).await.ok().flatten();
        if let Some(p) = &probe {
            if p.attached && p.visible && !p.in_viewport
                && browser.scroll_into_view(frame, locator).await.is_ok()
            {
                probe = browser.probe(frame, locator).await.ok().flatten();
            }
        }
        let Some(reason) = click_blocker(probe.as_ref()) else {
            return Ok(());
        };
        let now = Instant::now();
        if now >= deadline {
            return Err(not_interactable(locator, reason));
        }
        tokio::time::sleep(session.poll_interval().min(deadline - now)).await;
    }
}

/// Error reported when a driver call overruns the step bound
fn overrun(action: &Action, timeout: Duration) -> E2eError {
    let timeout_ms = timeout.as_millis() as u64;
    match action {
        Action::Navigate { url, wait_until } => E2eError::NavigationTimeout {
            target: url.clone(),
            state: LoadState::from(*wait_until).to_string(),
            timeout_ms,
        },
        Action::WaitForLoadState { state } => E2eError::NavigationTimeout {
            target: String::new(),
            state: state.to_string(),
            timeout_ms,
        },
        other => match other.locator() {
            Some(locator) => E2eError::LocatorTimeout {
                locator: locator.to_string(),
                timeout_ms,
            },
            None => E2eError::Driver(format!(
                "{} did not finish within {} ms",
                other.label(),
                timeout_ms
            )),
        },
    }
}

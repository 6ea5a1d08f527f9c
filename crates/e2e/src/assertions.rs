//! Assertion evaluation
//!
//! Assertions are checked after the steps, in declaration order, and every
//! one of them is evaluated: a failure is recorded with what the page
//! actually showed and evaluation moves on to the next assertion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use dashcheck_common::{Assertion, Check, Locator};

use crate::driver::ElementProbe;
use crate::locate::resolve;
use crate::session::Session;

/// What the page showed when an assertion gave up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Observed {
    /// No matching element ever appeared
    Absent,
    /// Element present but not rendered
    Hidden { text: String },
    /// Rendered text of the element
    Text(String),
    /// Current value of a form control
    Value(Option<String>),
    Url(String),
    /// The page could not be queried
    Unavailable(String),
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Absent => write!(f, "absent"),
            Observed::Hidden { text } if text.is_empty() => write!(f, "hidden"),
            Observed::Hidden { text } => write!(f, "hidden (text {:?})", text),
            Observed::Text(text) => write!(f, "text {:?}", text),
            Observed::Value(Some(value)) => write!(f, "value {:?}", value),
            Observed::Value(None) => write!(f, "no value"),
            Observed::Url(url) => write!(f, "url {}", url),
            Observed::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}

/// Why an assertion did not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The element never appeared within the timeout
    NeverAppeared,
    /// The element appeared but was never visible
    NotVisible,
    /// The element or URL was there with the wrong content
    ContentMismatch,
    /// The browser could not be queried
    Unavailable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::NeverAppeared => "never appeared",
            FailureReason::NotVisible => "not visible",
            FailureReason::ContentMismatch => "content mismatch",
            FailureReason::Unavailable => "page unavailable",
        };
        f.write_str(s)
    }
}

/// A failed assertion and the state observed when it timed out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub assertion: String,
    pub reason: FailureReason,
    pub observed: Observed,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (observed {})",
            self.assertion, self.reason, self.observed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionStatus {
    Held,
    Failed,
    /// Not evaluated because the steps were aborted
    Skipped,
}

/// Result of one assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub index: usize,
    pub assertion: String,
    pub status: AssertionStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<AssertionFailure>,
}

impl AssertionResult {
    pub fn held(&self) -> bool {
        self.status == AssertionStatus::Held
    }

    pub fn failed(&self) -> bool {
        self.status == AssertionStatus::Failed
    }
}

/// Results for a scenario's assertion list, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssertionReport {
    results: Vec<AssertionResult>,
}

impl AssertionReport {
    pub fn failures(&self) -> impl Iterator<Item = &AssertionFailure> {
        self.results.iter().filter_map(|r| r.failure.as_ref())
    }

    pub fn any_failed(&self) -> bool {
        self.results.iter().any(AssertionResult::failed)
    }

    pub fn count(&self, status: AssertionStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

impl Deref for AssertionReport {
    type Target = [AssertionResult];

    fn deref(&self) -> &Self::Target {
        &self.results
    }
}

/// Evaluates assertions against the page
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionEvaluator;

impl AssertionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every assertion, appending each result to `report` as it
    /// is produced
    ///
    /// With `steps_aborted` set only assertions marked `run_regardless` are
    /// checked; the rest are recorded as skipped.
    pub async fn evaluate(
        &self,
        session: &Session,
        assertions: &[Assertion],
        steps_aborted: bool,
        report: &mut AssertionReport,
    ) {
        for (index, assertion) in assertions.iter().enumerate() {
            let description = assertion.to_string();
            if steps_aborted && !assertion.run_regardless {
                debug!(scenario = session.scenario(), index, %description, "assertion skipped");
                report.results.push(AssertionResult {
                    index,
                    assertion: description,
                    status: AssertionStatus::Skipped,
                    duration_ms: 0,
                    failure: None,
                });
                continue;
            }

            let start = Instant::now();
            let outcome = self.check(session, assertion).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (status, failure) = match outcome {
                Ok(()) => {
                    debug!(scenario = session.scenario(), index, %description, "assertion held");
                    (AssertionStatus::Held, None)
                }
                Err(failure) => {
                    info!(scenario = session.scenario(), index, "assertion failed: {failure}");
                    (AssertionStatus::Failed, Some(failure))
                }
            };
            report.results.push(AssertionResult {
                index,
                assertion: description,
                status,
                duration_ms,
                failure,
            });
        }
    }

    /// Check one assertion, waiting up to its timeout for it to hold
    pub async fn check(&self, session: &Session, assertion: &Assertion) -> Result<(), AssertionFailure> {
        let timeout = assertion.timeout(session.default_timeout());
        let fail = |reason, observed| AssertionFailure {
            assertion: assertion.to_string(),
            reason,
            observed,
        };

        match &assertion.check {
            Check::UrlContains { expected } => {
                match watch_url(session, expected, timeout).await {
                    Ok(()) => Ok(()),
                    Err(observed @ Observed::Unavailable(_)) => {
                        Err(fail(FailureReason::Unavailable, observed))
                    }
                    Err(observed) => Err(fail(FailureReason::ContentMismatch, observed)),
                }
            }
            Check::TextVisible { locator, expected } => {
                watch_element(session, locator, timeout, |p| {
                    if !p.visible {
                        Some((FailureReason::NotVisible, Observed::Hidden { text: p.text.clone() }))
                    } else if !p.text.contains(expected.as_str()) {
                        Some((FailureReason::ContentMismatch, Observed::Text(p.text.clone())))
                    } else {
                        None
                    }
                })
                .await
                .map_err(|(reason, observed)| fail(reason, observed))
            }
            Check::ElementVisible { locator } => watch_element(session, locator, timeout, |p| {
                (!p.visible).then(|| (FailureReason::NotVisible, Observed::Hidden { text: p.text.clone() }))
            })
            .await
            .map_err(|(reason, observed)| fail(reason, observed)),
            Check::ValueEquals { locator, expected } => {
                watch_element(session, locator, timeout, |p| {
                    (p.value.as_deref() != Some(expected.as_str()))
                        .then(|| (FailureReason::ContentMismatch, Observed::Value(p.value.clone())))
                })
                .await
                .map_err(|(reason, observed)| fail(reason, observed))
            }
        }
    }
}

/// Poll the page URL until it contains `expected`
async fn watch_url(session: &Session, expected: &str, timeout: Duration) -> Result<(), Observed> {
    let deadline = Instant::now() + timeout;
    let browser = session.browser();
    loop {
        let observed = match browser.current_url().await {
            Ok(url) if url.contains(expected) => return Ok(()),
            Ok(url) => Observed::Url(url),
            Err(e) => Observed::Unavailable(e.to_string()),
        };
        let now = Instant::now();
        if now >= deadline {
            return Err(observed);
        }
        tokio::time::sleep(session.poll_interval().min(deadline - now)).await;
    }
}

/// Resolve `locator` and poll it until `mismatch` returns `None`
///
/// An element that never resolves is `NeverAppeared`; otherwise the last
/// mismatch seen before the deadline is reported.
async fn watch_element<F>(
    session: &Session,
    locator: &Locator,
    timeout: Duration,
    mismatch: F,
) -> Result<(), (FailureReason, Observed)>
where
    F: Fn(&ElementProbe) -> Option<(FailureReason, Observed)>,
{
    let deadline = Instant::now() + timeout;
    let frame = resolve(session, locator, timeout)
        .await
        .map_err(|_| (FailureReason::NeverAppeared, Observed::Absent))?;

    let browser = session.browser();
    loop {
        let last = match browser.probe(&frame, locator).await {
            Ok(Some(probe)) => match mismatch(&probe) {
                None => return Ok(()),
                Some(found) => found,
            },
            // Resolved earlier, gone now
            Ok(None) => (FailureReason::NeverAppeared, Observed::Absent),
            Err(e) => (FailureReason::Unavailable, Observed::Unavailable(e.to_string())),
        };
        let now = Instant::now();
        if now >= deadline {
            return Err(last);
        }
        tokio::time::sleep(session.poll_interval().min(deadline - now)).await;
    }
}

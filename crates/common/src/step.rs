//! Declarative UI actions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::types::{FailurePolicy, LoadState, WaitUntil};

/// Element state a `wait_for` step waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    Attached,
    #[default]
    Visible,
}

/// One UI action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Navigate to a URL, absolute or relative to the base URL
    Navigate {
        url: String,
        #[serde(default)]
        wait_until: WaitUntil,
    },

    /// Set an input's value directly (no implicit clear)
    Fill { locator: Locator, value: String },

    /// Empty an input's value
    Clear { locator: Locator },

    /// Click an element
    Click { locator: Locator },

    /// Wait until the page reaches a load state
    WaitForLoadState {
        #[serde(default = "default_load_state")]
        state: LoadState,
    },

    /// Wait until an element is attached or visible
    WaitFor {
        locator: Locator,
        #[serde(default)]
        state: ElementState,
    },

    /// Scroll the viewport by a delta
    Scroll {
        #[serde(default)]
        dx: i64,
        #[serde(default)]
        dy: i64,
    },

    /// Fixed pause
    Sleep { ms: u64 },
}

fn default_load_state() -> LoadState {
    LoadState::DomContentLoaded
}

impl Action {
    /// Short label used in logs and reports
    pub fn label(&self) -> String {
        match self {
            Action::Navigate { url, .. } => format!("navigate:{}", url),
            Action::Fill { locator, .. } => format!("fill:{}", locator),
            Action::Clear { locator } => format!("clear:{}", locator),
            Action::Click { locator } => format!("click:{}", locator),
            Action::WaitForLoadState { state } => format!("wait_for_load_state:{}", state),
            Action::WaitFor { locator, .. } => format!("wait_for:{}", locator),
            Action::Scroll { dx, dy } => format!("scroll:{},{}", dx, dy),
            Action::Sleep { ms } => format!("sleep:{}ms", ms),
        }
    }

    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Action::Fill { locator, .. }
            | Action::Clear { locator }
            | Action::Click { locator }
            | Action::WaitFor { locator, .. } => Some(locator),
            _ => None,
        }
    }
}

/// An action plus its per-step overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,

    /// Replaces the scenario's default timeout for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Replaces the scenario's failure policy for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicy>,

    /// Human-readable description shown in reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Position within a retry expansion; set by [`retry`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<Attempt>,
}

/// Marks a step as attempt `number` of `of` in a retry expansion
///
/// Backoff sleeps carry the number of the attempt they precede.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub number: u32,
    pub of: u32,
}

impl Attempt {
    /// Whether `next` is a later part of the same expansion
    pub fn continued_by(&self, next: &Attempt) -> bool {
        next.of == self.of && next.number > self.number
    }
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            timeout_ms: None,
            on_failure: None,
            label: None,
            attempt: None,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(Action::Navigate {
            url: url.into(),
            wait_until: WaitUntil::Commit,
        })
    }

    pub fn fill(locator: Locator, value: impl Into<String>) -> Self {
        Self::new(Action::Fill {
            locator,
            value: value.into(),
        })
    }

    pub fn clear(locator: Locator) -> Self {
        Self::new(Action::Clear { locator })
    }

    pub fn click(locator: Locator) -> Self {
        Self::new(Action::Click { locator })
    }

    pub fn wait_for(locator: Locator) -> Self {
        Self::new(Action::WaitFor {
            locator,
            state: ElementState::Visible,
        })
    }

    pub fn wait_for_load_state(state: LoadState) -> Self {
        Self::new(Action::WaitForLoadState { state })
    }

    pub fn scroll(dx: i64, dy: i64) -> Self {
        Self::new(Action::Scroll { dx, dy })
    }

    pub fn sleep(ms: u64) -> Self {
        Self::new(Action::Sleep { ms })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = Some(policy);
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }

    pub fn policy(&self, default: FailurePolicy) -> FailurePolicy {
        self.on_failure.unwrap_or(default)
    }

    /// Label shown in reports
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.action.label())
    }
}

impl From<Action> for Step {
    fn from(action: Action) -> Self {
        Step::new(action)
    }
}

/// Delay between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "ms")]
pub enum Backoff {
    None,
    Fixed(u64),
    /// `ms * attempt`
    Linear(u64),
    /// `ms * 2^(attempt - 1)`
    Exponential(u64),
}

impl Backoff {
    /// Delay after the given 1-based attempt
    pub fn delay_after(&self, attempt: u32) -> u64 {
        match *self {
            Backoff::None => 0,
            Backoff::Fixed(ms) => ms,
            Backoff::Linear(ms) => ms.saturating_mul(attempt as u64),
            Backoff::Exponential(ms) => {
                ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16))
            }
        }
    }
}

/// Expand a step into explicit, bounded attempts
///
/// Every attempt but the last is best-effort so a failed attempt falls
/// through to the next one; the last keeps the step's own policy. Attempts
/// are separated by `Sleep` steps carrying the backoff delay. The result is
/// plain steps: the executor never retries on its own. Once an attempt
/// succeeds the executor skips the rest of its expansion.
pub fn retry(step: Step, max_attempts: u32, backoff: Backoff) -> Result<Vec<Step>> {
    if max_attempts == 0 {
        return Err(Error::invalid(
            step.display_label(),
            "retry needs at least one attempt",
        ));
    }

    let base_label = step.display_label();
    let mut steps = Vec::with_capacity(max_attempts as usize * 2);
    for attempt in 1..=max_attempts {
        let mut copy = step.clone();
        copy.label = Some(format!("{} (attempt {}/{})", base_label, attempt, max_attempts));
        copy.attempt = Some(Attempt {
            number: attempt,
            of: max_attempts,
        });
        if attempt < max_attempts {
            copy.on_failure = Some(FailurePolicy::BestEffort);
            steps.push(copy);
            let delay = backoff.delay_after(attempt);
            if delay > 0 {
                let mut sleep = Step::sleep(delay).labelled(format!("backoff {}ms", delay));
                sleep.attempt = Some(Attempt {
                    number: attempt + 1,
                    of: max_attempts,
                });
                steps.push(sleep);
            }
        } else {
            steps.push(copy);
        }
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Selector;

    #[test]
    fn parses_tagged_steps_with_overrides() {
        let yaml = r#"
- action: navigate
  url: /login
  wait_until: dom_content_loaded
- action: fill
  locator: label=Email
  value: user@example.com
  timeout_ms: 8000
- action: click
  locator: role=button[name=Sign in]
  on_failure: best_effort
- action: scroll
  dy: 600
- action: wait_for_load_state
"#;
        let steps: Vec<Step> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(steps.len(), 5);
        assert_eq!(
            steps[0].action,
            Action::Navigate {
                url: "/login".into(),
                wait_until: WaitUntil::DomContentLoaded
            }
        );
        assert_eq!(steps[1].timeout_ms, Some(8000));
        assert_eq!(steps[2].on_failure, Some(FailurePolicy::BestEffort));
        assert_eq!(steps[3].action, Action::Scroll { dx: 0, dy: 600 });
        assert_eq!(
            steps[4].action,
            Action::WaitForLoadState {
                state: LoadState::DomContentLoaded
            }
        );
        match &steps[1].action {
            Action::Fill { locator, .. } => {
                assert_eq!(locator.selector, Selector::Label("Email".into()))
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn retry_expands_into_bounded_attempts() {
        let fill = Step::fill(Locator::css("#password"), "secret");
        let steps = retry(fill, 3, Backoff::Linear(500)).unwrap();

        // attempt, sleep, attempt, sleep, attempt
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0].on_failure, Some(FailurePolicy::BestEffort));
        assert_eq!(steps[1].action, Action::Sleep { ms: 500 });
        assert_eq!(steps[3].action, Action::Sleep { ms: 1000 });
        assert_eq!(steps[4].on_failure, None);
        assert!(steps[4].display_label().ends_with("(attempt 3/3)"));
        assert_eq!(steps[1].attempt, Some(Attempt { number: 2, of: 3 }));
        assert!(steps[0].attempt.unwrap().continued_by(&steps[1].attempt.unwrap()));
        assert!(!steps[4].attempt.unwrap().continued_by(&steps[0].attempt.unwrap()));
    }

    #[test]
    fn retry_rejects_zero_attempts() {
        assert!(retry(Step::sleep(1), 0, Backoff::None).is_err());
    }

    #[test]
    fn exponential_backoff_doubles() {
        let b = Backoff::Exponential(100);
        assert_eq!(b.delay_after(1), 100);
        assert_eq!(b.delay_after(2), 200);
        assert_eq!(b.delay_after(4), 800);
    }
}

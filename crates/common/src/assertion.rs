//! Post-condition checks evaluated after the steps of a scenario

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::locator::Locator;

/// What an assertion checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Check {
    /// Element is visible and its text contains `expected`
    TextVisible { locator: Locator, expected: String },

    /// Element is visible
    ElementVisible { locator: Locator },

    /// Current URL contains `expected`
    UrlContains { expected: String },

    /// Form control value equals `expected`
    ValueEquals { locator: Locator, expected: String },
}

impl Check {
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Check::TextVisible { locator, .. }
            | Check::ElementVisible { locator }
            | Check::ValueEquals { locator, .. } => Some(locator),
            Check::UrlContains { .. } => None,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::TextVisible { locator, expected } => {
                write!(f, "text \"{}\" visible in {}", expected, locator)
            }
            Check::ElementVisible { locator } => write!(f, "{} visible", locator),
            Check::UrlContains { expected } => write!(f, "url contains \"{}\"", expected),
            Check::ValueEquals { locator, expected } => {
                write!(f, "value of {} equals \"{}\"", locator, expected)
            }
        }
    }
}

/// A check plus its evaluation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(flatten)]
    pub check: Check,

    /// How long the check may take to hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Evaluate even when a fail-fast step aborted the scenario
    #[serde(default)]
    pub run_regardless: bool,
}

impl Assertion {
    pub fn new(check: Check) -> Self {
        Self {
            check,
            timeout_ms: None,
            run_regardless: false,
        }
    }

    pub fn text_visible(locator: Locator, expected: impl Into<String>) -> Self {
        Self::new(Check::TextVisible {
            locator,
            expected: expected.into(),
        })
    }

    pub fn element_visible(locator: Locator) -> Self {
        Self::new(Check::ElementVisible { locator })
    }

    pub fn url_contains(expected: impl Into<String>) -> Self {
        Self::new(Check::UrlContains {
            expected: expected.into(),
        })
    }

    pub fn value_equals(locator: Locator, expected: impl Into<String>) -> Self {
        Self::new(Check::ValueEquals {
            locator,
            expected: expected.into(),
        })
    }

    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn regardless(mut self) -> Self {
        self.run_regardless = true;
        self
    }

    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.check.fmt(f)
    }
}

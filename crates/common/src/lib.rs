//! dashcheck common library
//!
//! The scenario data model: scenarios, steps, locators, assertions and
//! their configuration. Nothing here talks to a browser; locators are
//! resolved later, against the live page, by `dashcheck-e2e`.

pub mod assertion;
pub mod error;
pub mod interpolate;
pub mod locator;
pub mod scenario;
pub mod step;
pub mod types;

pub use assertion::{Assertion, Check};
pub use error::{Error, Result};
pub use locator::{FrameScope, Locator, Selector};
pub use scenario::{Scenario, ScenarioBuilder};
pub use step::{retry, Action, Attempt, Backoff, ElementState, Step};
pub use types::*;

/// dashcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! dashcheck scenario execution engine
//!
//! Runs declarative UI scenarios against a live web application in
//! isolated browser sessions and classifies each run as passed, failed
//! (an assertion did not hold) or errored (the run itself broke).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ScenarioRegistry::run_all(filter)                          │
//! │    └── one task per scenario, bounded by a semaphore        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner::run(scenario) -> ExecutionResult           │
//! │    ├── SessionManager::acquire  -> Session                  │
//! │    ├── StepExecutor::run        -> StepRun                  │
//! │    ├── AssertionEvaluator::evaluate -> AssertionReport      │
//! │    └── SessionManager::release  (also on cancel / drop)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserDriver / BrowserSession                             │
//! │    ├── ChromiumDriver  (DevTools protocol)                  │
//! │    └── ScriptedDriver  (in-memory page models)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertions;
pub mod chromium;
pub mod dom_scripts;
pub mod driver;
pub mod error;
pub mod executor;
pub mod locate;
pub mod registry;
pub mod result;
pub mod runner;
pub mod scripted;
pub mod server;
pub mod session;

pub use assertions::{
    AssertionEvaluator, AssertionFailure, AssertionReport, AssertionResult, AssertionStatus,
    FailureReason, Observed,
};
pub use chromium::ChromiumDriver;
pub use driver::{BrowserDriver, BrowserSession, ElementProbe, FrameInfo, LaunchOptions};
pub use error::{E2eError, E2eResult, StepErrorKind, StepFailure};
pub use executor::{StepExecutor, StepOutcome, StepRun};
pub use registry::{ScenarioFilter, ScenarioRegistry};
pub use result::{ExecutionResult, Outcome, SuiteReport};
pub use runner::ScenarioRunner;
pub use scripted::{
    ClickEffect, Readiness, ScriptedDriver, ScriptedElement, ScriptedFrame, ScriptedPage,
    ScriptedSite,
};
pub use server::{wait_until_reachable, TargetApp, TargetConfig};
pub use session::{Session, SessionManager, SessionStats};
pub use tokio_util::sync::CancellationToken;

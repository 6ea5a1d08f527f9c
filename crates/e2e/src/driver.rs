//! Browser engine boundary
//!
//! Everything above this module (timeouts, polling, frame traversal,
//! assertion semantics) is engine-agnostic. A driver only answers
//! single-shot questions about the current page and performs single
//! actions; it never waits for an element on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use dashcheck_common::{LoadState, Locator, ScenarioConfig, Viewport};

use crate::error::E2eResult;

/// Launch parameters derived from a scenario's configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub viewport: Viewport,
    pub headless: bool,
    pub args: Vec<String>,
    pub chrome_executable: Option<PathBuf>,
    /// Upper bound for a single protocol round-trip
    pub request_timeout: Duration,
}

impl From<&ScenarioConfig> for LaunchOptions {
    fn from(config: &ScenarioConfig) -> Self {
        let mut args = config.launch_args.clone();
        if !args.iter().any(|a| a.starts_with("--window-size")) {
            args.push(format!(
                "--window-size={},{}",
                config.viewport.width, config.viewport.height
            ));
        }
        Self {
            viewport: config.viewport,
            headless: config.headless,
            args,
            chrome_executable: config.chrome_executable.clone(),
            request_timeout: config.navigation_timeout(),
        }
    }
}

/// A frame in the page's frame tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub id: String,
    /// `None` for the top-level document
    pub parent: Option<String>,
    pub url: String,
    pub name: Option<String>,
}

impl FrameInfo {
    pub fn is_main(&self) -> bool {
        self.parent.is_none()
    }
}

/// Snapshot of one element's interactability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementProbe {
    pub attached: bool,
    pub visible: bool,
    pub in_viewport: bool,
    pub editable: bool,
    /// Normalised rendered text
    pub text: String,
    /// Form control value, if the element has one
    pub value: Option<String>,
}

/// Launches isolated browser sessions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Driver name for logs
    fn name(&self) -> &'static str;

    /// Start a fresh browser with a single open page
    async fn launch(&self, options: &LaunchOptions) -> E2eResult<Box<dyn BrowserSession>>;
}

/// A live browser with one page
///
/// `frame` arguments are ids returned by [`BrowserSession::frame_tree`].
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Start navigation and return once it has committed
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Current frames; the main frame has no parent
    async fn frame_tree(&self) -> E2eResult<Vec<FrameInfo>>;

    async fn ready_state(&self, frame: &str) -> E2eResult<LoadState>;

    /// Number of elements matching the locator's selector in `frame`
    async fn count(&self, frame: &str, locator: &Locator) -> E2eResult<usize>;

    /// Inspect the `locator.nth` match; `None` if there is no such element
    async fn probe(&self, frame: &str, locator: &Locator) -> E2eResult<Option<ElementProbe>>;

    async fn scroll_into_view(&self, frame: &str, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, frame: &str, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn clear(&self, frame: &str, locator: &Locator) -> E2eResult<()>;

    async fn click(&self, frame: &str, locator: &Locator) -> E2eResult<()>;

    async fn scroll_by(&self, dx: i64, dy: i64) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Full-page PNG
    async fn screenshot(&self) -> E2eResult<Vec<u8>>;

    /// Shut the browser down; must be safe to call more than once
    async fn close(&self) -> E2eResult<()>;
}

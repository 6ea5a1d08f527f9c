//! Browser session lifecycle
//!
//! A [`Session`] is one isolated browser plus the timing configuration every
//! step and assertion in the scenario inherits. [`SessionManager::release`]
//! is the normal teardown path; if a session is dropped without being
//! released (cancellation, panic) the drop handler closes it in the
//! background so no browser process outlives its scenario.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dashcheck_common::ScenarioConfig;

use crate::driver::{BrowserDriver, BrowserSession, LaunchOptions};
use crate::error::{E2eError, E2eResult};

/// Interval between locator and readiness probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on browser launch
pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on browser shutdown during release
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Session counters, shared by a manager and its sessions
#[derive(Debug, Default)]
pub struct SessionStats {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl SessionStats {
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Sessions acquired and not yet released
    pub fn active(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

/// One live, isolated browser bound to a scenario
pub struct Session {
    id: Uuid,
    scenario: String,
    browser: Arc<dyn BrowserSession>,
    config: ScenarioConfig,
    poll_interval: Duration,
    stats: Arc<SessionStats>,
    released: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("scenario", &self.scenario)
            .field("released", &self.released)
            .finish()
    }
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn browser(&self) -> &dyn BrowserSession {
        self.browser.as_ref()
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Timeout applied to every lookup and action without its own
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.config.navigation_timeout()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolve a navigation target against the scenario's base URL
    pub fn resolve_url(&self, target: &str) -> E2eResult<String> {
        if reqwest::Url::parse(target).is_ok() {
            return Ok(target.to_string());
        }
        let base = reqwest::Url::parse(&self.config.base_url).map_err(|e| {
            E2eError::Driver(format!("invalid base URL '{}': {e}", self.config.base_url))
        })?;
        base.join(target)
            .map(|u| u.to_string())
            .map_err(|e| E2eError::Driver(format!("invalid navigation target '{target}': {e}")))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        warn!(
            session = %self.id,
            scenario = %self.scenario,
            "session dropped without release; closing in background"
        );

        let browser = self.browser.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = browser.close().await {
                        warn!("background session close failed: {e}");
                    }
                });
            }
            Err(_) => warn!("no runtime available to close session; relying on driver drop"),
        }
    }
}

/// Acquires and releases isolated browser sessions
pub struct SessionManager {
    driver: Arc<dyn BrowserDriver>,
    stats: Arc<SessionStats>,
    poll_interval: Duration,
}

impl SessionManager {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            stats: Arc::new(SessionStats::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    /// Launch a fresh browser configured from `config`
    pub async fn acquire(&self, scenario: &str, config: &ScenarioConfig) -> E2eResult<Session> {
        let options = LaunchOptions::from(config);
        debug!(scenario, driver = self.driver.name(), ?options, "launching browser");

        let browser = match tokio::time::timeout(LAUNCH_TIMEOUT, self.driver.launch(&options)).await
        {
            Ok(Ok(browser)) => browser,
            Ok(Err(E2eError::Launch(reason))) => return Err(E2eError::Launch(reason)),
            Ok(Err(other)) => return Err(E2eError::Launch(other.to_string())),
            Err(_) => {
                return Err(E2eError::Launch(format!(
                    "browser did not start within {} s",
                    LAUNCH_TIMEOUT.as_secs()
                )))
            }
        };

        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            id: Uuid::new_v4(),
            scenario: scenario.to_string(),
            browser: Arc::from(browser),
            config: config.clone(),
            poll_interval: self.poll_interval,
            stats: self.stats.clone(),
            released: false,
        };
        info!(session = %session.id, scenario, "session acquired");
        Ok(session)
    }

    /// Close the session's browser
    ///
    /// Never fails: shutdown errors are logged and the session still counts
    /// as released.
    pub async fn release(&self, mut session: Session) {
        session.released = true;
        self.stats.released.fetch_add(1, Ordering::SeqCst);

        match tokio::time::timeout(CLOSE_TIMEOUT, session.browser.close()).await {
            Ok(Ok(())) => info!(session = %session.id, scenario = %session.scenario, "session released"),
            Ok(Err(e)) => warn!(session = %session.id, "error while closing browser: {e}"),
            Err(_) => warn!(
                session = %session.id,
                "browser did not close within {} s",
                CLOSE_TIMEOUT.as_secs()
            ),
        }
    }
}

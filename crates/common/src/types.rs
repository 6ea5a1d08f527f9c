//! Core configuration types shared by scenarios and the runner

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-action timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default navigation timeout in milliseconds
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 10_000;

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280,
            height: 720,
        }
    }
}

/// Readiness condition a navigation waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// Response received and the new document committed
    #[default]
    Commit,
    /// `DOMContentLoaded` fired
    DomContentLoaded,
    /// `load` fired
    Load,
}

/// Document load state, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    DomContentLoaded,
    Load,
}

impl LoadState {
    /// Map a `document.readyState` string
    pub fn from_ready_state(state: &str) -> Self {
        match state {
            "complete" => LoadState::Load,
            "interactive" => LoadState::DomContentLoaded,
            _ => LoadState::Loading,
        }
    }
}

impl From<WaitUntil> for LoadState {
    fn from(w: WaitUntil) -> Self {
        match w {
            WaitUntil::Commit => LoadState::Loading,
            WaitUntil::DomContentLoaded => LoadState::DomContentLoaded,
            WaitUntil::Load => LoadState::Load,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Loading => write!(f, "loading"),
            LoadState::DomContentLoaded => write!(f, "domcontentloaded"),
            LoadState::Load => write!(f, "load"),
        }
    }
}

/// What happens to the remaining steps when one fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the remaining steps
    #[default]
    FailFast,
    /// Record the failure and continue with the next step
    BestEffort,
}

/// Per-scenario browser and timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Base URL relative navigation targets are joined onto
    pub base_url: String,

    /// Default timeout for every locator resolution and action
    pub default_timeout_ms: u64,

    /// Timeout for navigations
    pub navigation_timeout_ms: u64,

    pub viewport: Viewport,

    pub headless: bool,

    /// Extra browser launch flags
    pub launch_args: Vec<String>,

    /// Browser executable, auto-detected when unset
    pub chrome_executable: Option<PathBuf>,

    pub failure_policy: FailurePolicy,

    /// Deadline for the whole run of one scenario
    pub scenario_timeout_ms: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            viewport: Viewport::default(),
            headless: true,
            launch_args: vec!["--disable-dev-shm-usage".to_string()],
            chrome_executable: None,
            failure_policy: FailurePolicy::FailFast,
            scenario_timeout_ms: None,
        }
    }
}

impl ScenarioConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn scenario_timeout(&self) -> Option<Duration> {
        self.scenario_timeout_ms.map(Duration::from_millis)
    }

    /// Return a copy with the overrides applied
    pub fn merged(&self, overrides: &ConfigOverrides) -> Self {
        let mut config = self.clone();
        overrides.apply(&mut config);
        config
    }
}

/// Partial configuration, as written in scenario files and config files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub default_timeout_ms: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
    pub viewport: Option<Viewport>,
    pub headless: Option<bool>,
    pub launch_args: Option<Vec<String>>,
    pub chrome_executable: Option<PathBuf>,
    pub failure_policy: Option<FailurePolicy>,
    pub scenario_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Overwrite every field that is set
    pub fn apply(&self, config: &mut ScenarioConfig) {
        if let Some(v) = &self.base_url {
            config.base_url = v.clone();
        }
        if let Some(v) = self.default_timeout_ms {
            config.default_timeout_ms = v;
        }
        if let Some(v) = self.navigation_timeout_ms {
            config.navigation_timeout_ms = v;
        }
        if let Some(v) = self.viewport {
            config.viewport = v;
        }
        if let Some(v) = self.headless {
            config.headless = v;
        }
        if let Some(v) = &self.launch_args {
            config.launch_args = v.clone();
        }
        if let Some(v) = &self.chrome_executable {
            config.chrome_executable = Some(v.clone());
        }
        if let Some(v) = self.failure_policy {
            config.failure_policy = v;
        }
        if let Some(v) = self.scenario_timeout_ms {
            config.scenario_timeout_ms = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_only_set_fields() {
        let base = ScenarioConfig::default();
        let overrides = ConfigOverrides {
            base_url: Some("http://127.0.0.1:3002".into()),
            viewport: Some(Viewport {
                width: 1920,
                height: 1080,
            }),
            ..Default::default()
        };

        let merged = base.merged(&overrides);
        assert_eq!(merged.base_url, "http://127.0.0.1:3002");
        assert_eq!(merged.viewport.width, 1920);
        assert_eq!(merged.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(merged.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn load_states_are_ordered() {
        assert!(LoadState::Loading < LoadState::DomContentLoaded);
        assert!(LoadState::DomContentLoaded < LoadState::Load);
        assert_eq!(LoadState::from_ready_state("interactive"), LoadState::DomContentLoaded);
        assert_eq!(LoadState::from(WaitUntil::Commit), LoadState::Loading);
    }
}
